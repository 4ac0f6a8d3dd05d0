//! Splash on return from background.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::collaborators::LifecycleHandoff;
use crate::session::AdSession;
use crate::splash::SplashSequence;
use crate::timers::{TimerHandle, TimerRegistry};

/// Watches host foreground/background transitions and shows one splash ad
/// when the app comes back, if the strategy asks for it.
///
/// The first foreground is the cold start and never triggers a splash, and
/// nothing happens until a session has been attached.
pub struct HotStartMonitor {
    session: Mutex<Option<Arc<AdSession>>>,
    launched: AtomicBool,
    backgrounded: AtomicBool,
    pending: Mutex<Option<TimerHandle>>,
    timers: TimerRegistry,
    splash: SplashSequence,
    delay: Duration,
}

impl HotStartMonitor {
    #[must_use]
    pub fn new(timers: TimerRegistry, splash: SplashSequence, delay: Duration) -> Self {
        Self {
            session: Mutex::new(None),
            launched: AtomicBool::new(false),
            backgrounded: AtomicBool::new(false),
            pending: Mutex::new(None),
            timers,
            splash,
            delay,
        }
    }

    /// Host moved to the foreground. Returns whether a splash was scheduled.
    pub fn on_foreground(&self) -> bool {
        let first = !self.launched.swap(true, Ordering::SeqCst);
        let returning = self.backgrounded.swap(false, Ordering::SeqCst);
        if first || !returning {
            tracing::debug!("Cold start foreground; no hot-start splash");
            return false;
        }

        let Some(session) = self.session_guard().clone() else {
            tracing::debug!("Foreground before startup finished; no hot-start splash");
            return false;
        };
        let enabled = session
            .active_strategy()
            .is_some_and(|strategy| strategy.hot_start_enabled);
        if !enabled {
            return false;
        }

        let splash = self.splash.clone();
        let handle = self.timers.post_delayed(
            move || {
                drop(splash.launch(&session, 1));
            },
            self.delay,
        );
        let previous = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            self.timers.cancel(previous);
        }
        tracing::info!(delay_ms = self.delay.as_millis(), "Hot start splash scheduled");
        true
    }

    /// Host moved to the background. Cancels a splash that has not started yet.
    pub fn on_background(&self) {
        self.launched.store(true, Ordering::SeqCst);
        self.backgrounded.store(true, Ordering::SeqCst);
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = pending
            && self.timers.cancel(handle)
        {
            tracing::debug!("Pending hot-start splash cancelled");
        }
    }

    fn session_guard(&self) -> MutexGuard<'_, Option<Arc<AdSession>>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LifecycleHandoff for HotStartMonitor {
    fn attach(&self, session: Arc<AdSession>) {
        *self.session_guard() = Some(session);
    }
}
