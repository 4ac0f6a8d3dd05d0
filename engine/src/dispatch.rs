//! Thread placement for startup work.
//!
//! Some collaborators must only be touched from one UI-affinity thread (the
//! "main lane"); blocking network work belongs on a worker pool (the
//! "background lane"). [`Dispatcher`] names both lanes so the sequencer never
//! spawns threads itself and tests can substitute their own placement.

use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Mutex, PoisonError, mpsc};
use std::thread::{self, JoinHandle, ThreadId};

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::oneshot;

/// A unit of work handed to a lane.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

pub trait Dispatcher: Send + Sync {
    /// Queue `task` on the UI-affinity thread. Tasks run in submission order.
    fn run_on_main(&self, task: Task);

    /// Run `task` off the caller's path. Implementations may also run it
    /// inline; tasks must not block on the async runtime.
    fn run_on_background(&self, task: Task);
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{lane} lane dropped the task before it produced a result")]
    Dropped { lane: &'static str },
}

/// Run `f` on the main lane and wait for its result.
pub async fn on_main<D, F, T>(dispatcher: &D, f: F) -> Result<T, DispatchError>
where
    D: Dispatcher + ?Sized,
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    dispatcher.run_on_main(Box::new(move || {
        let _ = tx.send(f());
    }));
    rx.await.map_err(|_| DispatchError::Dropped { lane: "main" })
}

/// Run `f` on the background lane and wait for its result.
pub async fn on_background<D, F, T>(dispatcher: &D, f: F) -> Result<T, DispatchError>
where
    D: Dispatcher + ?Sized,
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    dispatcher.run_on_background(Box::new(move || {
        let _ = tx.send(f());
    }));
    rx.await
        .map_err(|_| DispatchError::Dropped { lane: "background" })
}

/// Launch `future` from the background lane and wait for its output.
///
/// The lane only hands the future to `runtime`, so a dispatcher that runs
/// tasks inline never blocks the awaiting task.
pub async fn spawn_from_background<D, Fut>(
    dispatcher: &D,
    runtime: &Handle,
    future: Fut,
) -> Result<Fut::Output, DispatchError>
where
    D: Dispatcher + ?Sized,
    Fut: Future + Send + 'static,
    Fut::Output: Send + 'static,
{
    let runtime = runtime.clone();
    let task = on_background(dispatcher, move || runtime.spawn(future)).await?;
    task.await
        .map_err(|_| DispatchError::Dropped { lane: "background" })
}

/// Dedicated `xuad-main` thread for the main lane, tokio's blocking pool for
/// the background lane.
///
/// The main thread drains its queue and exits once the dispatcher is dropped.
pub struct MainThreadDispatcher {
    main_tx: Mutex<Option<mpsc::Sender<Task>>>,
    main_id: ThreadId,
    main_thread: Mutex<Option<JoinHandle<()>>>,
    runtime: Handle,
}

impl MainThreadDispatcher {
    pub fn start(runtime: Handle) -> io::Result<Self> {
        let (tx, rx) = mpsc::channel::<Task>();
        let main_thread = thread::Builder::new()
            .name("xuad-main".to_string())
            .spawn(move || {
                while let Ok(task) = rx.recv() {
                    if catch_unwind(AssertUnwindSafe(task)).is_err() {
                        tracing::error!("Main lane task panicked");
                    }
                }
                tracing::debug!("Main lane stopped");
            })?;

        Ok(Self {
            main_tx: Mutex::new(Some(tx)),
            main_id: main_thread.thread().id(),
            main_thread: Mutex::new(Some(main_thread)),
            runtime,
        })
    }

    #[must_use]
    pub fn is_main_thread(&self) -> bool {
        thread::current().id() == self.main_id
    }
}

impl Dispatcher for MainThreadDispatcher {
    fn run_on_main(&self, task: Task) {
        let guard = self.main_tx.lock().unwrap_or_else(PoisonError::into_inner);
        let sent = guard.as_ref().is_some_and(|tx| tx.send(task).is_ok());
        if !sent {
            tracing::warn!("Main lane is gone; dropping task");
        }
    }

    fn run_on_background(&self, task: Task) {
        drop(self.runtime.spawn_blocking(task));
    }
}

impl Drop for MainThreadDispatcher {
    fn drop(&mut self) {
        self.main_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let handle = self
            .main_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        // A task on the main lane may hold the last reference.
        if let Some(handle) = handle
            && !self.is_main_thread()
        {
            let _ = handle.join();
        }
    }
}
