//! The declarative ad strategy document.
//!
//! The backend ships the strategy as a JSON string inside the init response (and
//! possibly a replacement from the validation endpoint). Unknown keys are ignored
//! and every key has a default, so older and newer documents both parse.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("invalid ad strategy document: {0}")]
pub struct StrategyParseError(#[from] serde_json::Error);

/// How repeated interstitials on one page are paced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterstitialMode {
    /// Next display waits for the previous one to close, plus the cooldown.
    #[default]
    Cooldown,
    /// Displays are issued on a fixed cadence regardless of earlier ones.
    Concurrent,
}

impl InterstitialMode {
    /// Parse the wire spelling (case-insensitive).
    ///
    /// Returns `None` for unknown spellings; callers decide the fallback policy.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cooldown" => Some(Self::Cooldown),
            "concurrent" => Some(Self::Concurrent),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cooldown => "cooldown",
            Self::Concurrent => "concurrent",
        }
    }
}

fn default_interstitial_mode() -> String {
    InterstitialMode::Cooldown.as_str().to_string()
}

/// Ad configuration for one page (or the fallback for unmatched pages).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageConfig {
    /// `None` marks a config that is only meaningful as the fallback.
    #[serde(default)]
    pub page_name: Option<String>,
    #[serde(default)]
    pub page_remark: Option<String>,
    #[serde(default, rename = "clickAd")]
    pub click_ad_enabled: bool,
    #[serde(default, rename = "bannerAd")]
    pub banner_ad_enabled: bool,
    /// Raw mode spelling; see [`PageConfig::interstitial_mode`].
    #[serde(default = "default_interstitial_mode")]
    pub interstitial_mode: String,
    #[serde(default)]
    pub interstitial_count: i32,
    /// Reserved; concurrent scheduling is driven by `interstitial_count`.
    #[serde(default)]
    pub concurrent_interstitial_count: i32,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            page_name: None,
            page_remark: None,
            click_ad_enabled: false,
            banner_ad_enabled: false,
            interstitial_mode: default_interstitial_mode(),
            interstitial_count: 0,
            concurrent_interstitial_count: 0,
        }
    }
}

impl PageConfig {
    /// Parsed pacing mode, `None` when the spelling is unknown.
    #[must_use]
    pub fn interstitial_mode(&self) -> Option<InterstitialMode> {
        InterstitialMode::parse(&self.interstitial_mode)
    }

    /// Number of interstitials this page wants; negative counts mean none.
    #[must_use]
    pub fn interstitial_target(&self) -> u32 {
        u32::try_from(self.interstitial_count).unwrap_or(0)
    }
}

/// The parsed strategy document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Strategy {
    #[serde(default)]
    pub splash_count: i32,
    #[serde(default, rename = "detailConfigs")]
    pub page_configs: Vec<PageConfig>,
    #[serde(default)]
    pub fallback_config: Option<PageConfig>,
    #[serde(default, rename = "hotStartSplash")]
    pub hot_start_enabled: bool,
    #[serde(default)]
    pub global_banner_enabled: bool,
    #[serde(default)]
    pub global_splash_enabled: bool,
    #[serde(default, rename = "interstitialCooldown")]
    pub interstitial_cooldown_seconds: i32,
    #[serde(default)]
    pub global_interstitial_enabled: bool,
}

impl Strategy {
    /// Parse a raw strategy string.
    ///
    /// A blank document is not an error: it simply means "no strategy".
    pub fn parse(raw: &str) -> Result<Option<Self>, StrategyParseError> {
        if raw.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(raw)?))
    }

    /// Splash ads to show in a global splash sequence; never less than one.
    #[must_use]
    pub fn splash_count(&self) -> u32 {
        u32::try_from(self.splash_count).unwrap_or(0).max(1)
    }

    /// Delay between a cooldown-mode close and the next display.
    #[must_use]
    pub fn interstitial_cooldown(&self) -> Duration {
        let seconds = u64::try_from(self.interstitial_cooldown_seconds).unwrap_or(0);
        Duration::from_secs(seconds)
    }
}
