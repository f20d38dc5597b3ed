use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::error::Elapsed;
use tracing::debug;
use crate::model::ModelLoader;
use super::coordinator::ReloadCoordinator;
use super::worker::WorkerHandle;

/// Default quiet period a burst of triggers must settle for before reloading.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// A cloneable way to ask for a reload.
///
/// Triggering never blocks and never runs a load on the caller's task.
#[derive(Clone)]
pub struct ReloadSignal {
    notifier: Arc<Notify>,
}

impl ReloadSignal {
    pub fn trigger(&self) {
        self.notifier.notify_one();
    }

    /// A signal with no worker behind it, for observing triggers in tests.
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        Self {
            notifier: Arc::new(Notify::new()),
        }
    }

    #[cfg(test)]
    pub(crate) async fn triggered(&self) {
        self.notifier.notified().await;
    }
}

/// # ReloadScheduler
///
/// Funnels reload triggers into a single background worker.
///
/// Only one reload runs at a time. Triggers are debounced on the trailing
/// edge: after the first trigger the worker waits until `debounce` passes
/// with no further trigger, then reloads once. Triggers arriving while a
/// reload is running collapse into exactly one follow-up reload.
pub struct ReloadScheduler {
    worker: WorkerHandle,
}

impl ReloadScheduler {
    /// Spawns the reload worker for `coordinator`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<L: ModelLoader>(coordinator: Arc<ReloadCoordinator<L>>, debounce: Duration) -> Self {
        let worker = WorkerHandle::new(move |running, notifier| {
            tokio::spawn(async move {
                reload_loop(&coordinator, running, notifier, debounce).await;
            })
        });

        Self { worker }
    }

    /// Requests a reload.
    pub fn trigger(&self) {
        self.worker.notify();
    }

    /// Returns a trigger that other tasks can hold on to.
    pub fn signal(&self) -> ReloadSignal {
        ReloadSignal {
            notifier: self.worker.notifier(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running() && !self.worker.is_finished()
    }

    /// Stops the worker without waiting. A reload in progress finishes first.
    pub fn shutdown(&mut self) {
        self.worker.shutdown();
    }

    /// Stops the worker and waits for it to return.
    pub async fn stop(self) {
        self.worker.stop().await;
    }
}

async fn reload_loop<L: ModelLoader>(
    coordinator: &ReloadCoordinator<L>,
    running: Arc<AtomicBool>,
    notifier: Arc<Notify>,
    debounce: Duration,
) {
    loop {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        if timeout_await_notifier(&notifier).await.is_err() {
            // Timeout occurred, loop back and check the running flag
            continue;
        }
        if !running.load(Ordering::SeqCst) {
            break;
        }

        let coalesced = settle(&notifier, debounce).await;
        if !running.load(Ordering::SeqCst) {
            break;
        }
        debug!(coalesced, "reload triggered");
        coordinator.reload().await;
    }
    debug!("reload worker stopped");
}

/// Waits for a wake-up, timing out so the running flag is re-checked periodically.
#[inline]
async fn timeout_await_notifier(notifier: &Notify) -> Result<(), Elapsed> {
    tokio::time::timeout(
        Duration::from_millis(100),
        notifier.notified(),
    ).await
}

/// Waits until no trigger arrived for `debounce`. Returns how many extra
/// triggers were absorbed.
async fn settle(notifier: &Notify, debounce: Duration) -> usize {
    let mut absorbed = 0;
    if debounce.is_zero() {
        return absorbed;
    }
    while tokio::time::timeout(debounce, notifier.notified()).await.is_ok() {
        absorbed += 1;
    }
    absorbed
}
