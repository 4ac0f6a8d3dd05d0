//! Ad surfaces, interactions and the errors external SDKs report.

use std::fmt;

use thiserror::Error;

/// The ad surfaces the scheduler can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdType {
    Splash,
    Interstitial,
    Banner,
}

impl AdType {
    /// Wire spelling used by the interaction-record endpoint.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Splash => "splash",
            Self::Interstitial => "interstitial",
            Self::Banner => "banner",
        }
    }
}

impl fmt::Display for AdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user-visible interaction worth reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interaction {
    View,
    Click,
}

impl Interaction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Click => "click",
        }
    }
}

/// An ad failed to load or render.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisplayError {
    #[error("no {0} slot configured")]
    MissingSlot(AdType),
    #[error("ad load failed (code {code}): {message}")]
    Load { code: i32, message: String },
    #[error("ad render failed: {0}")]
    Render(String),
    #[error("ad not ready to show")]
    NotReady,
    #[error("display dropped the reply without closing")]
    Abandoned,
}

/// A mediation or analytics SDK refused to come up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SdkError {
    #[error("missing {0}")]
    MissingCredential(&'static str),
    #[error("sdk initialization failed (code {code}): {message}")]
    Init { code: i32, message: String },
    #[error("sdk call failed: {0}")]
    Other(String),
}
