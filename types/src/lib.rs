//! Core domain types for xuad.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application: the API client
//! deserializes into these types, the engine schedules against them.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod ad;
mod init;
mod snapshot;
mod strategy;

pub use ad::{AdType, DisplayError, Interaction, SdkError};
pub use init::InitStep;
pub use snapshot::{AdEnabled, AdSlots, ConfigSnapshot, PartnerCredentials};
pub use strategy::{InterstitialMode, PageConfig, Strategy, StrategyParseError};

use thiserror::Error;

/// Maximum length of the device description attached to outbound reports.
pub const MAX_DEVICE_INFO_CHARS: usize = 1024;

// ============================================================================
// Required text
// ============================================================================

/// User-supplied text that is non-empty after trimming. Holds the trimmed form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonEmptyString(String);

#[derive(Debug, Error)]
#[error("value must not be blank")]
pub struct EmptyStringError;

impl NonEmptyString {
    pub fn trimmed(value: &str) -> Result<Self, EmptyStringError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(EmptyStringError);
        }
        Ok(Self(value.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// App Identity
// ============================================================================

/// Who is asking: the host application's package, distribution channel and version.
///
/// The channel is normalized (trimmed, lower-cased) at construction so every
/// outbound request carries the same spelling.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppIdentity {
    package_name: String,
    channel: String,
    version: String,
}

impl AppIdentity {
    #[must_use]
    pub fn new(
        package_name: impl Into<String>,
        channel: impl AsRef<str>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            package_name: package_name.into(),
            channel: normalize_channel(channel.as_ref()),
            version: version.into(),
        }
    }

    #[must_use]
    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }
}

#[must_use]
pub fn normalize_channel(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Flatten a device description onto one line and cap it at
/// [`MAX_DEVICE_INFO_CHARS`] characters.
#[must_use]
pub fn sanitize_device_info(raw: &str) -> String {
    raw.replace(['\r', '\n'], " ")
        .chars()
        .take(MAX_DEVICE_INFO_CHARS)
        .collect()
}
