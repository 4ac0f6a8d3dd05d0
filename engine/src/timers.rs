//! Cancellable delayed callbacks.
//!
//! All callbacks run on one driver task in `(deadline, insertion)` order, so a
//! callback never races another callback from the same registry. Callbacks
//! must not block; anything slow should be spawned.

use std::collections::{BTreeMap, HashMap};
use std::{fmt, mem};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::time::Instant;

type Callback = Box<dyn FnOnce() + Send + 'static>;

/// Opaque ticket for a scheduled callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

#[derive(Default)]
struct Queue {
    entries: BTreeMap<(Instant, u64), Callback>,
    deadlines: HashMap<u64, Instant>,
    next_seq: u64,
    closed: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    wake: Arc<Notify>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        // Let the driver observe that every registry handle is gone.
        self.wake.notify_one();
    }
}

/// Handle to a timer queue. Cloning shares the queue.
#[derive(Clone)]
pub struct TimerRegistry {
    shared: Arc<Shared>,
}

impl fmt::Debug for TimerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerRegistry")
            .field("pending", &self.pending_count())
            .finish()
    }
}

enum Next {
    Fire(Callback),
    Wait(Option<Instant>),
    Stop,
}

impl TimerRegistry {
    /// Start a registry whose driver runs on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    #[must_use]
    pub fn start() -> Self {
        Self::start_on(&Handle::current())
    }

    #[must_use]
    pub fn start_on(runtime: &Handle) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue::default()),
            wake: Arc::new(Notify::new()),
        });
        runtime.spawn(drive(Arc::downgrade(&shared), Arc::clone(&shared.wake)));
        Self { shared }
    }

    /// Run `callback` once `delay` has elapsed.
    ///
    /// After [`TimerRegistry::shutdown`] the callback is dropped unrun and the
    /// returned handle is never pending.
    pub fn post_delayed<F>(&self, callback: F, delay: Duration) -> TimerHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let deadline = Instant::now() + delay;
        let mut queue = self.shared.lock();
        let seq = queue.next_seq;
        queue.next_seq += 1;
        if queue.closed {
            tracing::debug!("Timer registry shut down; dropping callback");
            return TimerHandle(seq);
        }

        let becomes_head = queue
            .entries
            .first_key_value()
            .is_none_or(|(&(head, _), _)| deadline < head);
        queue.entries.insert((deadline, seq), Box::new(callback));
        queue.deadlines.insert(seq, deadline);
        drop(queue);

        if becomes_head {
            self.shared.wake.notify_one();
        }
        TimerHandle(seq)
    }

    /// Run `callback` on the driver task as soon as possible.
    pub fn post<F>(&self, callback: F) -> TimerHandle
    where
        F: FnOnce() + Send + 'static,
    {
        self.post_delayed(callback, Duration::ZERO)
    }

    /// Prevent a pending callback from running.
    ///
    /// Returns `false` when the callback already ran, was already cancelled or
    /// never existed.
    pub fn cancel(&self, handle: TimerHandle) -> bool {
        let mut queue = self.shared.lock();
        let Some(deadline) = queue.deadlines.remove(&handle.0) else {
            return false;
        };
        queue.entries.remove(&(deadline, handle.0)).is_some()
    }

    #[must_use]
    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.shared.lock().deadlines.contains_key(&handle.0)
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.shared.lock().entries.len()
    }

    /// Drop every pending callback and stop the driver. Later posts are ignored.
    pub fn shutdown(&self) {
        let dropped = {
            let mut queue = self.shared.lock();
            queue.closed = true;
            queue.deadlines.clear();
            mem::take(&mut queue.entries)
        };
        self.shared.wake.notify_one();
        tracing::debug!(dropped = dropped.len(), "Timer registry shut down");
        // Callbacks may own registry clones; drop them outside the lock.
        drop(dropped);
    }
}

async fn drive(shared: Weak<Shared>, wake: Arc<Notify>) {
    loop {
        let next = {
            let Some(shared) = shared.upgrade() else {
                return;
            };
            let mut queue = shared.lock();
            if queue.closed {
                Next::Stop
            } else {
                match queue.entries.first_key_value() {
                    Some((&(deadline, seq), _)) if deadline <= Instant::now() => {
                        queue.deadlines.remove(&seq);
                        queue
                            .entries
                            .remove(&(deadline, seq))
                            .map_or(Next::Wait(None), Next::Fire)
                    }
                    Some((&(deadline, _), _)) => Next::Wait(Some(deadline)),
                    None => Next::Wait(None),
                }
            }
        };

        match next {
            Next::Fire(callback) => {
                if catch_unwind(AssertUnwindSafe(callback)).is_err() {
                    tracing::error!("Timer callback panicked");
                }
            }
            Next::Wait(Some(deadline)) => {
                tokio::select! {
                    () = tokio::time::sleep_until(deadline) => {}
                    () = wake.notified() => {}
                }
            }
            Next::Wait(None) => wake.notified().await,
            Next::Stop => return,
        }
    }
}
