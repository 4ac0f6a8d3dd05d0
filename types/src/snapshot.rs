//! Remote configuration fetched during startup.

use std::fmt;

/// The server-side ad switch.
///
/// Only an explicit `1` turns ad features on; an absent field and every other
/// value keep them off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdEnabled {
    #[default]
    Unset,
    Value(i32),
}

impl AdEnabled {
    #[must_use]
    pub fn from_wire(value: Option<i32>) -> Self {
        value.map_or(Self::Unset, Self::Value)
    }

    #[must_use]
    pub const fn is_on(self) -> bool {
        matches!(self, Self::Value(1))
    }
}

/// Placement identifiers handed out by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AdSlots {
    pub splash: String,
    pub interstitial: String,
    pub banner: String,
    pub rewarded: String,
}

/// Opaque partner credentials.
///
/// Note: `Debug` is manually implemented to redact the values so they never end
/// up in logs.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct PartnerCredentials {
    pub id: String,
    pub key: String,
}

impl fmt::Debug for PartnerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn mask(value: &str) -> &'static str {
            if value.is_empty() { "<empty>" } else { "<redacted>" }
        }
        f.debug_struct("PartnerCredentials")
            .field("id", &mask(&self.id))
            .field("key", &mask(&self.key))
            .finish()
    }
}

/// Everything the init endpoint returned, plus the strategy text that the
/// validation step may swap in.
///
/// Created empty when a run starts, filled by the init call, and frozen once the
/// run completes (it is moved into the published session).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigSnapshot {
    pub ad_enabled: AdEnabled,
    pub raw_strategy: String,
    pub mediation_app_id: String,
    pub slots: AdSlots,
    pub download_url: String,
    pub analytics_key: String,
    pub partner: PartnerCredentials,
}

impl ConfigSnapshot {
    #[must_use]
    pub const fn ads_enabled(&self) -> bool {
        self.ad_enabled.is_on()
    }

    /// Replace the raw strategy if `candidate` carries anything.
    ///
    /// Returns whether the snapshot changed.
    pub fn replace_raw_strategy(&mut self, candidate: &str) -> bool {
        if candidate.trim().is_empty() {
            return false;
        }
        self.raw_strategy = candidate.to_string();
        true
    }

    /// Analytics key, or `None` when the backend sent nothing usable.
    #[must_use]
    pub fn analytics_key(&self) -> Option<&str> {
        let key = self.analytics_key.trim();
        (!key.is_empty()).then_some(key)
    }
}
