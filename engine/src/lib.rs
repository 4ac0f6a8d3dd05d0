//! Ad-SDK startup sequencing and per-page ad scheduling for xuad.
//!
//! [`AdRuntime`] is the facade hosts talk to. It owns one [`InitSequencer`],
//! one [`AdScheduler`] and one [`HotStartMonitor`], all sharing the session
//! that the last startup run published.
//!
//! Host-owned pieces (analytics, mediation, ad rendering, thread placement)
//! come in through the traits in [`collaborators`] and [`dispatch`].

pub mod collaborators;
pub mod dispatch;
mod hot_start;
mod report;
mod resolver;
mod scheduler;
mod sequencer;
mod session;
mod splash;
mod timers;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::runtime::Handle;

pub use collaborators::{
    AdDisplay, Analytics, BannerCallback, DeviceIdCallback, DisplayEvent, DisplayReply,
    DisplayRequest, LifecycleHandoff, Mediation,
};
pub use dispatch::{DispatchError, Dispatcher, MainThreadDispatcher, Task};
pub use hot_start::HotStartMonitor;
pub use report::InteractionReporter;
pub use resolver::resolve_page_config;
pub use scheduler::{
    AdScheduler, DEFAULT_BANNER_DELAY, DEFAULT_CONCURRENT_INTERVAL, PageSnapshot, SchedulerOptions,
};
pub use sequencer::{
    DEFAULT_DEVICE_ID_TIMEOUT, DEFAULT_VALIDATE_TIMEOUT, InitObserver, InitOptions, InitSequencer,
    NoopObserver, StepError,
};
pub use session::{AdSession, SessionSlot};
pub use splash::{SplashOutcome, SplashSequence};
pub use timers::{TimerHandle, TimerRegistry};
pub use xuad_api::{ApiClient, ApiError};
pub use xuad_types::{AdType, AppIdentity, InitStep, Interaction};

use xuad_api::FeedbackRequest;
use xuad_config::XuadConfig;
use xuad_types::{NonEmptyString, sanitize_device_info};

pub const DEFAULT_HOT_START_DELAY: Duration = Duration::from_millis(300);
pub const DEFAULT_SPLASH_GAP: Duration = Duration::from_millis(50);

// ============================================================================
// Options
// ============================================================================

/// Every tunable of the runtime, usually read from `~/.xuad/config.toml`.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub init: InitOptions,
    pub scheduler: SchedulerOptions,
    /// Delay between returning to the foreground and the hot-start splash.
    pub hot_start_delay: Duration,
    /// Pause between consecutive splash ads.
    pub splash_gap: Duration,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            init: InitOptions::default(),
            scheduler: SchedulerOptions::default(),
            hot_start_delay: DEFAULT_HOT_START_DELAY,
            splash_gap: DEFAULT_SPLASH_GAP,
        }
    }
}

impl RuntimeOptions {
    #[must_use]
    pub fn from_config(config: &XuadConfig) -> Self {
        Self {
            init: InitOptions {
                validate_timeout: config.validate_timeout(),
                device_id_timeout: config.device_id_timeout(),
                device_info: String::new(),
            },
            scheduler: SchedulerOptions {
                concurrent_interval: config.concurrent_interval(),
                banner_delay: config.banner_delay(),
            },
            hot_start_delay: config.hot_start_delay(),
            splash_gap: config.splash_gap(),
        }
    }

    /// Attach a device description, sanitized for the wire.
    #[must_use]
    pub fn with_device_info(mut self, raw: &str) -> Self {
        self.init.device_info = sanitize_device_info(raw);
        self
    }
}

/// Host SDKs the runtime drives.
#[derive(Clone)]
pub struct Collaborators {
    pub analytics: Arc<dyn Analytics>,
    pub mediation: Arc<dyn Mediation>,
    pub display: Arc<dyn AdDisplay>,
}

#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("feedback {0} must not be blank")]
    Invalid(&'static str),
    #[error(transparent)]
    Api(#[from] ApiError),
}

// ============================================================================
// AdRuntime
// ============================================================================

pub struct AdRuntime {
    identity: AppIdentity,
    api: ApiClient,
    sessions: SessionSlot,
    timers: TimerRegistry,
    reporter: InteractionReporter,
    sequencer: InitSequencer,
    scheduler: AdScheduler,
    hot_start: Arc<HotStartMonitor>,
}

impl AdRuntime {
    /// Wire every component together. Spawns the timer driver on `runtime`.
    #[must_use]
    pub fn new(
        identity: AppIdentity,
        api: ApiClient,
        dispatcher: Arc<dyn Dispatcher>,
        collaborators: Collaborators,
        options: RuntimeOptions,
        runtime: Handle,
    ) -> Self {
        let sessions = SessionSlot::default();
        let timers = TimerRegistry::start_on(&runtime);
        let reporter = InteractionReporter::new(
            api.clone(),
            sessions.clone(),
            options.init.device_info.as_str(),
            runtime.clone(),
        );
        let splash = SplashSequence::new(
            Arc::clone(&collaborators.display),
            reporter.clone(),
            options.splash_gap,
            runtime.clone(),
        );
        let hot_start = Arc::new(HotStartMonitor::new(
            timers.clone(),
            splash.clone(),
            options.hot_start_delay,
        ));
        let scheduler = AdScheduler::new(
            timers.clone(),
            Arc::clone(&collaborators.display),
            reporter.clone(),
            sessions.clone(),
            options.scheduler,
        );
        let sequencer = InitSequencer::new(
            identity.clone(),
            api.clone(),
            dispatcher,
            collaborators.analytics,
            collaborators.mediation,
            Arc::clone(&hot_start) as Arc<dyn LifecycleHandoff>,
            splash,
            sessions.clone(),
            options.init,
            runtime,
        );

        Self {
            identity,
            api,
            sessions,
            timers,
            reporter,
            sequencer,
            scheduler,
            hot_start,
        }
    }

    /// Run the startup pipeline once. Safe to call again; the latest run wins.
    pub async fn init(&self, observer: &dyn InitObserver) -> Arc<AdSession> {
        self.sequencer.run(observer).await
    }

    /// The most recently published session, if startup has completed.
    #[must_use]
    pub fn session(&self) -> Option<Arc<AdSession>> {
        self.sessions.current()
    }

    #[must_use]
    pub fn identity(&self) -> &AppIdentity {
        &self.identity
    }

    #[must_use]
    pub fn scheduler(&self) -> &AdScheduler {
        &self.scheduler
    }

    pub fn track(&self, page: &str) {
        self.scheduler.track(page);
    }

    pub fn on_page_leave(&self, page: &str) {
        self.scheduler.on_page_leave(page);
    }

    pub fn register_banner_container<F>(&self, page: &str, callback: F)
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.scheduler.register_banner_container(page, callback);
    }

    pub fn unregister_banner_container(&self, page: &str) {
        self.scheduler.unregister_banner_container(page);
    }

    #[must_use]
    pub fn page_state(&self, page: &str) -> Option<PageSnapshot> {
        self.scheduler.page_state(page)
    }

    pub fn clear_all_states(&self) {
        self.scheduler.clear_all_states();
    }

    #[must_use]
    pub fn is_click_ad_enabled(&self, page: &str) -> bool {
        self.scheduler.is_click_ad_enabled(page)
    }

    /// Record a view or click on a banner rendered by the host's container.
    pub fn report_banner(&self, interaction: Interaction, ecpm: f64) {
        tracing::debug!(interaction = interaction.as_str(), "Banner interaction");
        self.reporter.report(AdType::Banner, interaction, ecpm);
    }

    /// Host came to the foreground. Returns whether a hot-start splash was scheduled.
    pub fn on_foreground(&self) -> bool {
        self.hot_start.on_foreground()
    }

    pub fn on_background(&self) {
        self.hot_start.on_background();
    }

    /// Send user feedback. `subject` and `content` must not be blank.
    pub async fn submit_feedback(
        &self,
        subject: &str,
        content: &str,
        contact: Option<&str>,
    ) -> Result<Option<String>, FeedbackError> {
        let subject =
            NonEmptyString::trimmed(subject).map_err(|_| FeedbackError::Invalid("subject"))?;
        let content =
            NonEmptyString::trimmed(content).map_err(|_| FeedbackError::Invalid("content"))?;
        let request =
            FeedbackRequest::new(&self.identity, subject.as_str(), content.as_str(), contact);
        let ticket = self.api.submit_feedback(&request).await?;
        tracing::info!(?ticket, "Feedback submitted");
        Ok(ticket)
    }

    /// Cancel all scheduling and stop the timer driver.
    pub fn shutdown(&self) {
        self.scheduler.clear_all_states();
        self.timers.shutdown();
        tracing::info!("Ad runtime shut down");
    }
}
