//! Per-page ad scheduling.
//!
//! Each tracked page owns an independently locked state record. Scheduling
//! happens entirely on the [`TimerRegistry`] driver: timers fire there, and
//! display outcomes are re-posted there before they touch page state.
//!
//! # Interstitials
//!
//! | Mode | Behavior |
//! |------|----------|
//! | Cooldown | Show, wait for the ad to show and close, wait the cooldown, repeat. A failure ends the chain. |
//! | Concurrent | Request on a fixed cadence until the target count is requested. Outcomes only feed the tally. |
//!
//! # Staleness
//!
//! Every callback carries the generation it was scheduled under. Leaving a
//! page or tracking it again makes every older callback a no-op.

use std::collections::{HashMap, HashSet};
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use xuad_types::{AdType, DisplayError, Interaction, InterstitialMode};

use crate::collaborators::{AdDisplay, BannerCallback, DisplayEvent, DisplayReply, DisplayRequest};
use crate::report::InteractionReporter;
use crate::resolver::resolve_page_config;
use crate::session::SessionSlot;
use crate::timers::{TimerHandle, TimerRegistry};

pub const DEFAULT_CONCURRENT_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_BANNER_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerOptions {
    /// Cadence of concurrent-mode interstitial requests.
    pub concurrent_interval: Duration,
    /// Delay between tracking a page and showing its banner.
    pub banner_delay: Duration,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            concurrent_interval: DEFAULT_CONCURRENT_INTERVAL,
            banner_delay: DEFAULT_BANNER_DELAY,
        }
    }
}

/// Point-in-time view of one page, for diagnostics and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSnapshot {
    pub page_name: String,
    pub is_active: bool,
    pub generation: u64,
    pub interstitial_requested_count: u32,
    pub interstitial_executed_count: u32,
    pub banner_executed_count: u32,
    pub pending_timers: usize,
}

#[derive(Debug)]
struct PageState {
    page_name: String,
    active: bool,
    generation: u64,
    interstitial_requested: u32,
    interstitial_executed: u32,
    /// Whether the most recent interstitial request reported `shown`.
    last_shown: bool,
    banner_executed: u32,
    timers: HashSet<TimerHandle>,
}

impl PageState {
    fn new(page_name: &str) -> Self {
        Self {
            page_name: page_name.to_string(),
            active: false,
            generation: 0,
            interstitial_requested: 0,
            interstitial_executed: 0,
            last_shown: false,
            banner_executed: 0,
            timers: HashSet::new(),
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.active && self.generation == generation
    }

    fn cancel_timers(&mut self, timers: &TimerRegistry) {
        for handle in self.timers.drain() {
            timers.cancel(handle);
        }
    }

    /// Forget handles whose callbacks already ran.
    fn prune_fired(&mut self, timers: &TimerRegistry) {
        self.timers.retain(|handle| timers.is_pending(*handle));
    }

    fn snapshot(&self) -> PageSnapshot {
        PageSnapshot {
            page_name: self.page_name.clone(),
            is_active: self.active,
            generation: self.generation,
            interstitial_requested_count: self.interstitial_requested,
            interstitial_executed_count: self.interstitial_executed,
            banner_executed_count: self.banner_executed,
            pending_timers: self.timers.len(),
        }
    }
}

type PageRef = Arc<Mutex<PageState>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Everything an interstitial chain needs, captured when the page is tracked.
#[derive(Debug, Clone)]
struct InterstitialPlan {
    slot_id: String,
    target: u32,
    mode: InterstitialMode,
    cooldown: Duration,
}

#[derive(Debug)]
enum Job {
    CooldownShow(InterstitialPlan),
    ConcurrentTick(InterstitialPlan),
    Banner,
}

struct Inner {
    timers: TimerRegistry,
    display: Arc<dyn AdDisplay>,
    reporter: InteractionReporter,
    sessions: SessionSlot,
    options: SchedulerOptions,
    pages: Mutex<HashMap<String, PageRef>>,
    banners: Mutex<HashMap<String, BannerCallback>>,
}

/// Drives interstitial and banner requests for tracked pages.
///
/// Cheap to clone; all clones share state. Safe to call from any thread.
#[derive(Clone)]
pub struct AdScheduler {
    inner: Arc<Inner>,
}

impl AdScheduler {
    #[must_use]
    pub fn new(
        timers: TimerRegistry,
        display: Arc<dyn AdDisplay>,
        reporter: InteractionReporter,
        sessions: SessionSlot,
        options: SchedulerOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                timers,
                display,
                reporter,
                sessions,
                options,
                pages: Mutex::new(HashMap::new()),
                banners: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Start (or restart) scheduling for `page`.
    ///
    /// Any previous tracking of the same page is discarded: its pending timers
    /// are cancelled and its counts reset before new work is scheduled.
    pub fn track(&self, page: &str) {
        let state = self.page_or_insert(page);
        let generation = {
            let mut st = lock(&state);
            st.cancel_timers(&self.inner.timers);
            st.active = true;
            st.generation += 1;
            st.interstitial_requested = 0;
            st.interstitial_executed = 0;
            st.last_shown = false;
            st.banner_executed = 0;
            st.generation
        };
        tracing::info!(page, generation, "Tracking page");

        let Some(session) = self.inner.sessions.current() else {
            tracing::debug!(page, "No session yet; nothing scheduled");
            return;
        };
        let Some(strategy) = session.active_strategy() else {
            tracing::debug!(page, "Ads off or no strategy; nothing scheduled");
            return;
        };
        let Some(config) = resolve_page_config(strategy, page) else {
            tracing::debug!(page, "No page config; nothing scheduled");
            return;
        };

        let target = config.interstitial_target();
        if strategy.global_interstitial_enabled && target > 0 {
            let mode = config.interstitial_mode().unwrap_or_else(|| {
                tracing::warn!(
                    page,
                    mode = %config.interstitial_mode,
                    "Unknown interstitial mode; using cooldown"
                );
                InterstitialMode::Cooldown
            });
            let plan = InterstitialPlan {
                slot_id: session.snapshot.slots.interstitial.clone(),
                target,
                mode,
                cooldown: strategy.interstitial_cooldown(),
            };
            tracing::debug!(page, mode = mode.as_str(), target, "Scheduling interstitials");
            let job = match mode {
                InterstitialMode::Cooldown => Job::CooldownShow(plan),
                InterstitialMode::Concurrent => Job::ConcurrentTick(plan),
            };
            self.schedule(&state, page, generation, Duration::ZERO, job);
        }

        if strategy.global_banner_enabled && config.banner_ad_enabled {
            tracing::debug!(page, "Scheduling banner");
            self.schedule(
                &state,
                page,
                generation,
                self.inner.options.banner_delay,
                Job::Banner,
            );
        }
    }

    /// Stop all scheduling for `page`. Unknown pages and repeated calls are no-ops.
    pub fn on_page_leave(&self, page: &str) {
        self.unregister_banner_container(page);
        let Some(state) = self.page(page) else {
            return;
        };
        let mut st = lock(&state);
        if !st.active && st.timers.is_empty() {
            return;
        }
        st.active = false;
        st.cancel_timers(&self.inner.timers);
        tracing::info!(page, "Page left");
    }

    pub fn register_banner_container<F>(&self, page: &str, callback: F)
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        lock(&self.inner.banners).insert(page.to_string(), Arc::new(callback));
    }

    pub fn unregister_banner_container(&self, page: &str) {
        lock(&self.inner.banners).remove(page);
    }

    #[must_use]
    pub fn page_state(&self, page: &str) -> Option<PageSnapshot> {
        self.page(page).map(|state| {
            let mut st = lock(&state);
            st.prune_fired(&self.inner.timers);
            st.snapshot()
        })
    }

    /// Cancel everything and forget every page and banner container.
    pub fn clear_all_states(&self) {
        let pages = mem::take(&mut *lock(&self.inner.pages));
        for state in pages.values() {
            let mut st = lock(state);
            st.active = false;
            st.cancel_timers(&self.inner.timers);
        }
        lock(&self.inner.banners).clear();
        tracing::info!(pages = pages.len(), "Cleared all page states");
    }

    /// Whether the configuration resolved for `page` enables click ads.
    #[must_use]
    pub fn is_click_ad_enabled(&self, page: &str) -> bool {
        self.inner.sessions.current().is_some_and(|session| {
            session
                .active_strategy()
                .and_then(|strategy| resolve_page_config(strategy, page))
                .is_some_and(|config| config.click_ad_enabled)
        })
    }

    fn page(&self, page: &str) -> Option<PageRef> {
        lock(&self.inner.pages).get(page).cloned()
    }

    fn page_or_insert(&self, page: &str) -> PageRef {
        Arc::clone(
            lock(&self.inner.pages)
                .entry(page.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(PageState::new(page)))),
        )
    }

    fn schedule(&self, state: &PageRef, page: &str, generation: u64, delay: Duration, job: Job) {
        let mut st = lock(state);
        if !st.is_current(generation) {
            return;
        }
        let scheduler = self.clone();
        let page = page.to_string();
        let handle = self
            .inner
            .timers
            .post_delayed(move || scheduler.run_job(&page, generation, job), delay);
        st.timers.insert(handle);
    }

    fn run_job(&self, page: &str, generation: u64, job: Job) {
        let Some(state) = self.page(page) else {
            return;
        };
        {
            let mut st = lock(&state);
            st.prune_fired(&self.inner.timers);
            if !st.is_current(generation) {
                tracing::debug!(page, generation, "Stale timer ignored");
                return;
            }
        }

        match job {
            Job::CooldownShow(plan) => self.request_interstitial(&state, page, generation, &plan),
            Job::ConcurrentTick(plan) => self.concurrent_tick(&state, page, generation, plan),
            Job::Banner => self.fire_banner(&state, page, generation),
        }
    }

    fn concurrent_tick(&self, state: &PageRef, page: &str, generation: u64, plan: InterstitialPlan) {
        let more = {
            let st = lock(state);
            st.is_current(generation) && st.interstitial_requested + 1 < plan.target
        };
        // Schedule the next tick first so cadence does not depend on the display.
        if more {
            self.schedule(
                state,
                page,
                generation,
                self.inner.options.concurrent_interval,
                Job::ConcurrentTick(plan.clone()),
            );
        }
        self.request_interstitial(state, page, generation, &plan);
    }

    fn request_interstitial(
        &self,
        state: &PageRef,
        page: &str,
        generation: u64,
        plan: &InterstitialPlan,
    ) {
        let requested = {
            let mut st = lock(state);
            if !st.is_current(generation) || st.interstitial_requested >= plan.target {
                return;
            }
            st.interstitial_requested += 1;
            st.last_shown = false;
            st.interstitial_requested
        };

        if plan.slot_id.trim().is_empty() {
            self.on_interstitial_event(
                page,
                generation,
                plan,
                DisplayEvent::Failed(DisplayError::MissingSlot(AdType::Interstitial)),
            );
            return;
        }

        tracing::debug!(
            page,
            mode = plan.mode.as_str(),
            requested,
            target = plan.target,
            "Requesting interstitial"
        );
        let request = DisplayRequest {
            ad_type: AdType::Interstitial,
            slot_id: plan.slot_id.clone(),
            page: Some(page.to_string()),
        };
        let reply = self.interstitial_reply(page, generation, plan);
        self.inner.display.show(request, reply);
    }

    fn interstitial_reply(&self, page: &str, generation: u64, plan: &InterstitialPlan) -> DisplayReply {
        let scheduler = self.clone();
        let page = page.to_string();
        let plan = plan.clone();
        DisplayReply::new(move |event| {
            let handler = scheduler.clone();
            let page = page.clone();
            let plan = plan.clone();
            scheduler
                .inner
                .timers
                .post(move || handler.on_interstitial_event(&page, generation, &plan, event));
        })
    }

    fn on_interstitial_event(
        &self,
        page: &str,
        generation: u64,
        plan: &InterstitialPlan,
        event: DisplayEvent,
    ) {
        let reporter = &self.inner.reporter;
        let state = self.page(page);

        match event {
            DisplayEvent::Shown { ecpm } => {
                reporter.report(AdType::Interstitial, Interaction::View, ecpm);
                if let Some(state) = state {
                    let mut st = lock(&state);
                    if st.is_current(generation) {
                        st.interstitial_executed += 1;
                        st.last_shown = true;
                        tracing::debug!(
                            page,
                            executed = st.interstitial_executed,
                            "Interstitial shown"
                        );
                    }
                }
            }
            DisplayEvent::Clicked { ecpm } => {
                reporter.report(AdType::Interstitial, Interaction::Click, ecpm);
            }
            DisplayEvent::Closed => {
                if plan.mode != InterstitialMode::Cooldown {
                    return;
                }
                let Some(state) = state else {
                    return;
                };
                let next = {
                    let st = lock(&state);
                    st.is_current(generation)
                        && st.last_shown
                        && st.interstitial_executed < plan.target
                        && st.interstitial_requested < plan.target
                };
                if next {
                    tracing::debug!(
                        page,
                        cooldown_secs = plan.cooldown.as_secs(),
                        "Next interstitial after cooldown"
                    );
                    self.schedule(
                        &state,
                        page,
                        generation,
                        plan.cooldown,
                        Job::CooldownShow(plan.clone()),
                    );
                } else {
                    tracing::debug!(page, "Interstitial chain finished");
                }
            }
            DisplayEvent::Failed(e) => {
                tracing::warn!(page, mode = plan.mode.as_str(), "Interstitial failed: {e}");
                if plan.mode == InterstitialMode::Cooldown {
                    tracing::debug!(page, "Cooldown chain halted");
                }
            }
        }
    }

    fn fire_banner(&self, state: &PageRef, page: &str, generation: u64) {
        let callback = lock(&self.inner.banners).get(page).cloned();
        let Some(callback) = callback else {
            tracing::warn!(page, "Banner due but no container registered");
            return;
        };
        {
            let mut st = lock(state);
            if !st.is_current(generation) {
                return;
            }
            st.banner_executed += 1;
        }
        tracing::info!(page, "Showing banner");
        callback(true);
    }
}
