//! Module for handling long-running background tasks.

use std::sync::{Arc, atomic::{AtomicBool, Ordering}};
use tokio::{task::JoinHandle, sync::Notify};

/// A handle for managing a background task that lives for a serving session.
///
/// The task receives a `running` flag and a notifier when it is spawned. It
/// is expected to re-check `running` every time the notifier wakes it, and
/// to return once the flag is cleared.
///
/// # Example
///
/// ```ignore
/// use ember::engine::WorkerHandle;
/// use std::sync::atomic::Ordering;
///
/// async fn example() {
///     let worker = WorkerHandle::new(|running, notifier| {
///         tokio::spawn(async move {
///             while running.load(Ordering::SeqCst) {
///                 notifier.notified().await;
///                 // react to the wake-up
///             }
///         })
///     });
///
///     worker.notify();
///     worker.stop().await;
/// }
/// ```
pub struct WorkerHandle {
    /// Flag indicating whether the background task should continue running
    running: Arc<AtomicBool>,

    /// Handle to the spawned background task, becomes `None` after shutdown is initiated
    handle: Option<JoinHandle<()>>,

    /// Notification mechanism to wake up the background task
    notifier: Arc<Notify>,
}

impl WorkerHandle {
    /// Creates a new `WorkerHandle` by spawning a background task.
    ///
    /// # Parameters
    ///
    /// * `task` - A function that takes a running flag and a notifier, and returns a `JoinHandle`.
    ///   This function is responsible for creating and spawning the actual background task.
    pub fn new<F>(task: F) -> Self
    where
        F: FnOnce(Arc<AtomicBool>, Arc<Notify>) -> JoinHandle<()> + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let notifier = Arc::new(Notify::new());
        let handle = task(running.clone(), notifier.clone());

        Self {
            running,
            handle: Some(handle),
            notifier,
        }
    }

    /// Wakes the background task.
    ///
    /// If the task is not currently waiting, the wake-up is stored and
    /// consumed by its next wait. Repeated calls before that collapse into one.
    pub fn notify(&self) {
        self.notifier.notify_one();
    }

    /// Returns a clone of the notifier so other tasks can wake the worker.
    pub fn notifier(&self) -> Arc<Notify> {
        self.notifier.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// True once the background task has returned.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|handle| handle.is_finished())
    }

    /// Signals the task to stop without waiting for it.
    ///
    /// The task handle is detached; the task exits at its next check of the
    /// running flag. Safe to call repeatedly.
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.notifier.notify_one();

        if let Some(handle) = self.handle.take() {
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                runtime.spawn(async move {
                    let _ = handle.await;
                });
            }
        }
    }

    /// Signals the task to stop and waits until it has returned.
    pub async fn stop(mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.notifier.notify_one();

        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for WorkerHandle {
    /// Ensures the background task is told to terminate when the handle is dropped.
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::time;

    fn counting_worker(count: Arc<AtomicUsize>, stopped: Arc<AtomicBool>) -> WorkerHandle {
        WorkerHandle::new(move |running, notifier| {
            tokio::spawn(async move {
                while running.load(Ordering::SeqCst) {
                    notifier.notified().await;
                    if running.load(Ordering::SeqCst) {
                        count.fetch_add(1, Ordering::SeqCst);
                    }
                }
                stopped.store(true, Ordering::SeqCst);
            })
        })
    }

    #[tokio::test]
    async fn test_worker_wakes_on_notify() {
        let count = Arc::new(AtomicUsize::new(0));
        let worker = counting_worker(count.clone(), Arc::new(AtomicBool::new(false)));

        worker.notify();
        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        worker.notify();
        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_notifications_before_wait_collapse() {
        let count = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());
        let worker = WorkerHandle::new({
            let count = count.clone();
            let gate = gate.clone();
            move |running, notifier| {
                tokio::spawn(async move {
                    gate.notified().await;
                    while running.load(Ordering::SeqCst) {
                        notifier.notified().await;
                        count.fetch_add(1, Ordering::SeqCst);
                    }
                })
            }
        });

        // The task is parked on the gate, so these land as a single stored permit
        worker.notify();
        worker.notify();
        worker.notify();
        gate.notify_one();

        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stop_waits_for_task() {
        let stopped = Arc::new(AtomicBool::new(false));
        let worker = counting_worker(Arc::new(AtomicUsize::new(0)), stopped.clone());
        assert!(worker.is_running());

        worker.stop().await;
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let stopped = Arc::new(AtomicBool::new(false));
        let mut worker = counting_worker(Arc::new(AtomicUsize::new(0)), stopped.clone());

        worker.shutdown();
        worker.shutdown();
        assert!(!worker.is_running());
        assert!(worker.is_finished());

        time::sleep(Duration::from_millis(50)).await;
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_drop_triggers_shutdown() {
        let stopped = Arc::new(AtomicBool::new(false));
        {
            let _worker = counting_worker(Arc::new(AtomicUsize::new(0)), stopped.clone());
            time::sleep(Duration::from_millis(10)).await;
        }

        time::sleep(Duration::from_millis(50)).await;
        assert!(stopped.load(Ordering::SeqCst));
    }
}
