//! Request and response bodies exchanged with the backend.
//!
//! All bodies are camelCase JSON. Requests normalize their inputs at
//! construction so every caller sends the same spelling.

use serde::{Deserialize, Serialize};
use xuad_types::{
    AdEnabled, AdSlots, AdType, AppIdentity, ConfigSnapshot, Interaction, PartnerCredentials,
    sanitize_device_info,
};

/// The common response wrapper: `{code, message, success, data}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInitRequest {
    pub package_name: String,
    pub channel_name: String,
    pub version: String,
}

impl AppInitRequest {
    #[must_use]
    pub fn new(identity: &AppIdentity) -> Self {
        Self {
            package_name: identity.package_name().to_string(),
            channel_name: identity.channel().to_string(),
            version: identity.version().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyCheckRequest {
    pub package_name: String,
    pub channel_name: String,
    pub version: String,
    pub device_id: String,
    pub device_info: String,
}

impl StrategyCheckRequest {
    #[must_use]
    pub fn new(identity: &AppIdentity, device_id: &str, device_info: &str) -> Self {
        Self {
            package_name: identity.package_name().to_string(),
            channel_name: identity.channel().to_string(),
            version: identity.version().to_string(),
            device_id: device_id.trim().to_string(),
            device_info: sanitize_device_info(device_info),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordRequest {
    pub device_id: String,
    pub ecpm: f64,
    pub ad_type: String,
    pub interaction_type: String,
    pub device_info: String,
}

impl RecordRequest {
    /// Negative or non-finite eCPM values are sent as `0`.
    #[must_use]
    pub fn new(
        device_id: &str,
        ecpm: f64,
        ad_type: AdType,
        interaction: Interaction,
        device_info: &str,
    ) -> Self {
        let ecpm = if ecpm.is_finite() { ecpm.max(0.0) } else { 0.0 };
        Self {
            device_id: device_id.trim().to_string(),
            ecpm,
            ad_type: ad_type.as_str().to_string(),
            interaction_type: interaction.as_str().to_string(),
            device_info: sanitize_device_info(device_info),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    pub package_name: String,
    pub channel_name: String,
    pub version: String,
    pub subject: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
}

impl FeedbackRequest {
    #[must_use]
    pub fn new(identity: &AppIdentity, subject: &str, content: &str, contact: Option<&str>) -> Self {
        Self {
            package_name: identity.package_name().to_string(),
            channel_name: identity.channel().to_string(),
            version: identity.version().to_string(),
            subject: subject.trim().to_string(),
            content: content.trim().to_string(),
            contact: contact
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
        }
    }
}

// ============================================================================
// Responses
// ============================================================================

/// `data` of the init endpoint.
///
/// Older backends used vendor-specific key names; those are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppInitData {
    pub ad_enabled: Option<i32>,
    pub ad_strategy: String,
    #[serde(alias = "pangleAppId")]
    pub mediation_app_id: String,
    pub ad_splash_id: String,
    pub ad_interstitial_id: String,
    pub ad_banner_id: String,
    pub ad_rewarded_id: String,
    pub download_url: String,
    #[serde(alias = "umengKey")]
    pub analytics_key: String,
    #[serde(alias = "apihzId")]
    pub partner_id: String,
    #[serde(alias = "apihzKey")]
    pub partner_key: String,
}

impl From<AppInitData> for ConfigSnapshot {
    fn from(data: AppInitData) -> Self {
        Self {
            ad_enabled: AdEnabled::from_wire(data.ad_enabled),
            raw_strategy: data.ad_strategy,
            mediation_app_id: data.mediation_app_id,
            slots: AdSlots {
                splash: data.ad_splash_id,
                interstitial: data.ad_interstitial_id,
                banner: data.ad_banner_id,
                rewarded: data.ad_rewarded_id,
            },
            download_url: data.download_url,
            analytics_key: data.analytics_key,
            partner: PartnerCredentials {
                id: data.partner_id,
                key: data.partner_key,
            },
        }
    }
}
