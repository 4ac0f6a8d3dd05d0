//! Startup pipeline stages.

use std::fmt;

/// One stage of the startup pipeline.
///
/// Declaration order is the historical enumeration order; execution order is
/// [`InitStep::PIPELINE`]. Every run visits each step exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InitStep {
    AppInit,
    ParseAdStrategy,
    AnalyticsPreInit,
    AnalyticsInit,
    ResolveDeviceId,
    UserValidate,
    AdSdkInit,
    Completed,
}

impl InitStep {
    /// Steps in the order a run executes them.
    pub const PIPELINE: [InitStep; 8] = [
        InitStep::AppInit,
        InitStep::AnalyticsPreInit,
        InitStep::AnalyticsInit,
        InitStep::ResolveDeviceId,
        InitStep::UserValidate,
        InitStep::ParseAdStrategy,
        InitStep::AdSdkInit,
        InitStep::Completed,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AppInit => "app_init",
            Self::ParseAdStrategy => "parse_ad_strategy",
            Self::AnalyticsPreInit => "analytics_pre_init",
            Self::AnalyticsInit => "analytics_init",
            Self::ResolveDeviceId => "resolve_device_id",
            Self::UserValidate => "user_validate",
            Self::AdSdkInit => "ad_sdk_init",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for InitStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
