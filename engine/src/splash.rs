//! Back-to-back splash ads.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use xuad_types::{AdType, DisplayError, Interaction};

use crate::collaborators::{AdDisplay, DisplayEvent, DisplayReply, DisplayRequest};
use crate::report::InteractionReporter;
use crate::session::AdSession;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplashOutcome {
    /// Ads that reported `shown`.
    pub shown: u32,
    /// Ads that failed, or whose reply was dropped unanswered.
    pub failed: u32,
}

/// Shows splash ads one at a time: each waits for close or failure, then a
/// short gap, then the next.
#[derive(Clone)]
pub struct SplashSequence {
    display: Arc<dyn AdDisplay>,
    reporter: InteractionReporter,
    gap: Duration,
    runtime: Handle,
}

impl SplashSequence {
    #[must_use]
    pub fn new(
        display: Arc<dyn AdDisplay>,
        reporter: InteractionReporter,
        gap: Duration,
        runtime: Handle,
    ) -> Self {
        Self {
            display,
            reporter,
            gap,
            runtime,
        }
    }

    /// Spawn a sequence of `count` ads for `session`'s splash slot.
    pub fn launch(&self, session: &AdSession, count: u32) -> JoinHandle<SplashOutcome> {
        let slot_id = session.snapshot.slots.splash.clone();
        let sequence = self.clone();
        tracing::info!(count, "Launching splash sequence");
        self.runtime
            .spawn(async move { sequence.run(&slot_id, count).await })
    }

    pub async fn run(&self, slot_id: &str, count: u32) -> SplashOutcome {
        let mut outcome = SplashOutcome::default();
        let slot_id = slot_id.trim();
        if slot_id.is_empty() {
            tracing::warn!("No splash slot configured; skipping splash sequence");
            outcome.failed = 1;
            return outcome;
        }

        let shown = Arc::new(AtomicU32::new(0));
        for index in 0..count.max(1) {
            if index > 0 {
                tokio::time::sleep(self.gap).await;
            }

            match self.show_one(slot_id, Arc::clone(&shown)).await {
                Ok(()) => tracing::debug!(index, "Splash closed"),
                Err(e) => {
                    tracing::warn!(index, "Splash failed: {e}");
                    outcome.failed += 1;
                }
            }
        }
        outcome.shown = shown.load(Ordering::SeqCst);
        outcome
    }

    async fn show_one(&self, slot_id: &str, shown: Arc<AtomicU32>) -> Result<(), DisplayError> {
        let (tx, rx) = oneshot::channel();
        let done = Mutex::new(Some(tx));
        let reporter = self.reporter.clone();

        let reply = DisplayReply::new(move |event| {
            let finished = match event {
                DisplayEvent::Shown { ecpm } => {
                    shown.fetch_add(1, Ordering::SeqCst);
                    reporter.report(AdType::Splash, Interaction::View, ecpm);
                    return;
                }
                DisplayEvent::Clicked { ecpm } => {
                    reporter.report(AdType::Splash, Interaction::Click, ecpm);
                    return;
                }
                DisplayEvent::Closed => Ok(()),
                DisplayEvent::Failed(e) => Err(e),
            };
            if let Some(tx) = done.lock().unwrap_or_else(PoisonError::into_inner).take() {
                let _ = tx.send(finished);
            }
        });

        self.display.show(
            DisplayRequest {
                ad_type: AdType::Splash,
                slot_id: slot_id.to_string(),
                page: None,
            },
            reply,
        );

        rx.await.unwrap_or(Err(DisplayError::Abandoned))
    }
}
