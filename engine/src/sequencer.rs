//! The startup pipeline.
//!
//! A run visits every [`InitStep`] in [`InitStep::PIPELINE`] order exactly once.
//! Each step reports start and then either completion or failure to the
//! [`InitObserver`], and the run always moves on: a failed step leaves the
//! defaults in place and never stops the steps after it.
//!
//! | Step | Lane | Notes |
//! |------|------|-------|
//! | AppInit | background | fills the snapshot |
//! | AnalyticsPreInit | main | skipped without an analytics key |
//! | AnalyticsInit | main | skipped without an analytics key |
//! | ResolveDeviceId | caller | guarded by `device_id_timeout` |
//! | UserValidate | background | guarded by `validate_timeout` |
//! | ParseAdStrategy | caller | only when ads are on |
//! | AdSdkInit | main | once per process; signals ad-disabled when ads are off |
//! | Completed | caller | publish, hot-start handoff, splash |

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use xuad_api::{ApiClient, ApiError};
use xuad_types::{AppIdentity, ConfigSnapshot, InitStep, SdkError, Strategy, StrategyParseError};

use crate::collaborators::{Analytics, LifecycleHandoff, Mediation};
use crate::dispatch::{DispatchError, Dispatcher, on_main, spawn_from_background};
use crate::session::{AdSession, SessionSlot};
use crate::splash::SplashSequence;

pub const DEFAULT_VALIDATE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_DEVICE_ID_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Sdk(#[from] SdkError),
    #[error(transparent)]
    Strategy(#[from] StrategyParseError),
    #[error("{step} timed out after {after:?}")]
    TimedOut { step: InitStep, after: Duration },
    #[error("device id resolver dropped its callback")]
    CallbackDropped,
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Progress callbacks for a startup run. Every method defaults to a no-op.
///
/// Callbacks are invoked from the task driving the run.
pub trait InitObserver: Send + Sync {
    fn on_step_start(&self, _step: InitStep) {}

    fn on_step_completed(&self, _step: InitStep) {}

    fn on_step_failed(&self, _step: InitStep, _error: &StepError) {}

    /// Emitted during `AdSdkInit` when the backend has ads switched off.
    fn on_ad_disabled(&self) {}

    fn on_init_completed(&self, _session: &AdSession) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl InitObserver for NoopObserver {}

#[derive(Debug, Clone)]
pub struct InitOptions {
    /// `None` waits for the strategy check as long as the HTTP client allows.
    pub validate_timeout: Option<Duration>,
    /// `None` waits for the device id forever.
    pub device_id_timeout: Option<Duration>,
    /// Free-form device description sent with the strategy check.
    pub device_info: String,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            validate_timeout: Some(DEFAULT_VALIDATE_TIMEOUT),
            device_id_timeout: Some(DEFAULT_DEVICE_ID_TIMEOUT),
            device_info: String::new(),
        }
    }
}

/// Mutable state of one run. Dropped when the run ends.
#[derive(Default)]
struct Run {
    snapshot: ConfigSnapshot,
    strategy: Option<Strategy>,
    device_id: String,
    published: Option<Arc<AdSession>>,
}

pub struct InitSequencer {
    identity: AppIdentity,
    api: ApiClient,
    dispatcher: Arc<dyn Dispatcher>,
    analytics: Arc<dyn Analytics>,
    mediation: Arc<dyn Mediation>,
    handoff: Arc<dyn LifecycleHandoff>,
    splash: SplashSequence,
    sessions: SessionSlot,
    mediation_ready: AtomicBool,
    options: InitOptions,
    runtime: Handle,
}

impl InitSequencer {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        identity: AppIdentity,
        api: ApiClient,
        dispatcher: Arc<dyn Dispatcher>,
        analytics: Arc<dyn Analytics>,
        mediation: Arc<dyn Mediation>,
        handoff: Arc<dyn LifecycleHandoff>,
        splash: SplashSequence,
        sessions: SessionSlot,
        options: InitOptions,
        runtime: Handle,
    ) -> Self {
        Self {
            identity,
            api,
            dispatcher,
            analytics,
            mediation,
            handoff,
            splash,
            sessions,
            mediation_ready: AtomicBool::new(false),
            options,
            runtime,
        }
    }

    /// Execute one full run and return the session it published.
    ///
    /// Concurrent runs are independent; the last one to finish wins the
    /// published session.
    pub async fn run(&self, observer: &dyn InitObserver) -> Arc<AdSession> {
        let mut run = Run::default();
        tracing::info!(
            package = self.identity.package_name(),
            channel = self.identity.channel(),
            "Init run started"
        );

        for step in InitStep::PIPELINE {
            observer.on_step_start(step);
            tracing::debug!(step = %step, "Init step started");
            match self.execute(step, &mut run, observer).await {
                Ok(()) => {
                    tracing::info!(step = %step, "Init step completed");
                    observer.on_step_completed(step);
                }
                Err(e) => {
                    tracing::warn!(step = %step, "Init step failed: {e}");
                    observer.on_step_failed(step, &e);
                }
            }
        }

        let session = run
            .published
            .take()
            .unwrap_or_else(|| Arc::new(freeze(&self.identity, &run)));
        tracing::info!(
            ads_enabled = session.ads_enabled(),
            has_strategy = session.strategy.is_some(),
            "Init run finished"
        );
        observer.on_init_completed(&session);
        session
    }

    async fn execute(
        &self,
        step: InitStep,
        run: &mut Run,
        observer: &dyn InitObserver,
    ) -> Result<(), StepError> {
        match step {
            InitStep::AppInit => self.app_init(run).await,
            InitStep::AnalyticsPreInit => self.analytics_step(run, true).await,
            InitStep::AnalyticsInit => self.analytics_step(run, false).await,
            InitStep::ResolveDeviceId => self.resolve_device_id(run).await,
            InitStep::UserValidate => self.user_validate(run).await,
            InitStep::ParseAdStrategy => Self::parse_strategy(run),
            InitStep::AdSdkInit => self.ad_sdk_init(run, observer).await,
            InitStep::Completed => {
                self.complete(run);
                Ok(())
            }
        }
    }

    async fn app_init(&self, run: &mut Run) -> Result<(), StepError> {
        let api = self.api.clone();
        let identity = self.identity.clone();
        let fetch = async move { api.app_init(&identity).await };
        run.snapshot = spawn_from_background(&*self.dispatcher, &self.runtime, fetch).await??;
        tracing::info!(
            ads_enabled = run.snapshot.ads_enabled(),
            "Remote configuration loaded"
        );
        Ok(())
    }

    async fn analytics_step(&self, run: &Run, pre: bool) -> Result<(), StepError> {
        let Some(key) = run.snapshot.analytics_key() else {
            tracing::debug!("No analytics key; skipping analytics");
            return Ok(());
        };
        let key = key.to_string();
        let channel = self.identity.channel().to_string();
        let analytics = Arc::clone(&self.analytics);
        on_main(&*self.dispatcher, move || {
            if pre {
                analytics.pre_init(&key, &channel)
            } else {
                analytics.init(&key, &channel)
            }
        })
        .await??;
        Ok(())
    }

    async fn resolve_device_id(&self, run: &mut Run) -> Result<(), StepError> {
        let (tx, rx) = oneshot::channel();
        self.analytics.resolve_device_id(Box::new(move |id| {
            let _ = tx.send(id);
        }));

        let received = match self.options.device_id_timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(received) => received,
                Err(_) => {
                    return Err(StepError::TimedOut {
                        step: InitStep::ResolveDeviceId,
                        after: limit,
                    });
                }
            },
            None => rx.await,
        };
        let id = received.map_err(|_| StepError::CallbackDropped)?;
        run.device_id = id.trim().to_string();
        tracing::debug!(has_device_id = !run.device_id.is_empty(), "Device id resolved");
        Ok(())
    }

    async fn user_validate(&self, run: &mut Run) -> Result<(), StepError> {
        let api = self.api.clone();
        let identity = self.identity.clone();
        let device_id = run.device_id.clone();
        let device_info = self.options.device_info.clone();
        let check = spawn_from_background(&*self.dispatcher, &self.runtime, async move {
            api.check_strategy(&identity, &device_id, &device_info)
                .await
        });

        let outcome = match self.options.validate_timeout {
            Some(limit) => tokio::time::timeout(limit, check).await.map_err(|_| {
                StepError::TimedOut {
                    step: InitStep::UserValidate,
                    after: limit,
                }
            })?,
            None => check.await,
        };

        if let Some(raw) = outcome??
            && run.snapshot.replace_raw_strategy(&raw)
        {
            tracing::info!("Strategy replaced by validation response");
        }
        Ok(())
    }

    fn parse_strategy(run: &mut Run) -> Result<(), StepError> {
        if !run.snapshot.ads_enabled() {
            tracing::debug!("Ads off; strategy not parsed");
            return Ok(());
        }
        match Strategy::parse(&run.snapshot.raw_strategy) {
            Ok(strategy) => {
                if strategy.is_none() {
                    tracing::debug!("Empty strategy document");
                }
                run.strategy = strategy;
                Ok(())
            }
            Err(e) => {
                run.strategy = None;
                Err(e.into())
            }
        }
    }

    async fn ad_sdk_init(&self, run: &Run, observer: &dyn InitObserver) -> Result<(), StepError> {
        if !run.snapshot.ads_enabled() {
            tracing::info!("Ads disabled by backend");
            observer.on_ad_disabled();
            return Ok(());
        }

        let app_id = run.snapshot.mediation_app_id.trim().to_string();
        if app_id.is_empty() {
            return Err(SdkError::MissingCredential("mediation app id").into());
        }
        if self.mediation_ready.swap(true, Ordering::SeqCst) {
            tracing::debug!("Mediation SDK already initialized");
            return Ok(());
        }

        let mediation = Arc::clone(&self.mediation);
        let result = on_main(&*self.dispatcher, move || mediation.initialize(&app_id)).await;
        if !matches!(result, Ok(Ok(()))) {
            // Allow a later run to try again.
            self.mediation_ready.store(false, Ordering::SeqCst);
        }
        result??;
        Ok(())
    }

    fn complete(&self, run: &mut Run) {
        let session = Arc::new(freeze(&self.identity, run));
        // Publish first so splash records carry the device id.
        self.sessions.publish(Arc::clone(&session));
        self.handoff.attach(Arc::clone(&session));
        if let Some(strategy) = session.active_strategy()
            && strategy.global_splash_enabled
        {
            drop(self.splash.launch(&session, strategy.splash_count()));
        }
        run.published = Some(session);
    }
}

fn freeze(identity: &AppIdentity, run: &Run) -> AdSession {
    AdSession {
        snapshot: run.snapshot.clone(),
        strategy: run.strategy.clone(),
        device_id: run.device_id.clone(),
        identity: identity.clone(),
    }
}
