//! Narrow interfaces to the SDKs and host UI the engine drives but does not own.

use std::fmt;
use std::sync::Arc;

use xuad_types::{AdType, DisplayError, SdkError};

use crate::session::AdSession;

/// Receives the resolved device id exactly once.
pub type DeviceIdCallback = Box<dyn FnOnce(String) + Send + 'static>;

/// Host callback that shows (`true`) a page's banner container.
pub type BannerCallback = Arc<dyn Fn(bool) + Send + Sync + 'static>;

/// Analytics SDK. `pre_init` and `init` are invoked on the main lane.
pub trait Analytics: Send + Sync {
    fn pre_init(&self, key: &str, channel: &str) -> Result<(), SdkError>;

    fn init(&self, key: &str, channel: &str) -> Result<(), SdkError>;

    /// Resolve a stable device id and hand it to `callback`.
    ///
    /// The callback may be invoked from any thread. Dropping it without
    /// invoking it is reported as a step failure.
    fn resolve_device_id(&self, callback: DeviceIdCallback);
}

/// Ad mediation SDK, initialized on the main lane at most once per process.
pub trait Mediation: Send + Sync {
    fn initialize(&self, app_id: &str) -> Result<(), SdkError>;
}

/// What to show and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayRequest {
    pub ad_type: AdType,
    pub slot_id: String,
    /// Page that asked for the ad; `None` for splash ads.
    pub page: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DisplayEvent {
    Shown { ecpm: f64 },
    Clicked { ecpm: f64 },
    Closed,
    Failed(DisplayError),
}

/// Completion channel for one display request.
///
/// Cheap to clone; every method may be called from any thread.
#[derive(Clone)]
pub struct DisplayReply {
    sink: Arc<dyn Fn(DisplayEvent) + Send + Sync + 'static>,
}

impl fmt::Debug for DisplayReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplayReply").finish_non_exhaustive()
    }
}

impl DisplayReply {
    pub fn new<F>(sink: F) -> Self
    where
        F: Fn(DisplayEvent) + Send + Sync + 'static,
    {
        Self {
            sink: Arc::new(sink),
        }
    }

    pub fn shown(&self, ecpm: f64) {
        (self.sink)(DisplayEvent::Shown { ecpm });
    }

    pub fn clicked(&self, ecpm: f64) {
        (self.sink)(DisplayEvent::Clicked { ecpm });
    }

    pub fn closed(&self) {
        (self.sink)(DisplayEvent::Closed);
    }

    pub fn failed(&self, error: DisplayError) {
        (self.sink)(DisplayEvent::Failed(error));
    }

    pub fn send(&self, event: DisplayEvent) {
        (self.sink)(event);
    }
}

/// Renders ads. Must not block; results arrive through `reply`.
pub trait AdDisplay: Send + Sync {
    fn show(&self, request: DisplayRequest, reply: DisplayReply);
}

/// Receives the session once startup completes (foreground tracking).
pub trait LifecycleHandoff: Send + Sync {
    fn attach(&self, session: Arc<AdSession>);
}
