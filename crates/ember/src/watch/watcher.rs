//! File system watcher for the served model file
//!
//! Monitors the model's parent directory and triggers a reload when the model
//! file itself is created, written, or replaced.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, Notify};
use tracing::{debug, error, info, trace};
use crate::engine::{ReloadSignal, WorkerHandle};
use crate::error::WatchError;
use super::identity::is_same_file;

/// Watches one model file for changes.
///
/// The parent directory is watched rather than the file, because editors and
/// copy tools usually replace a file (write elsewhere, then rename) instead of
/// writing it in place. Events for other entries of the directory are ignored.
///
/// The watch runs on its own task until [`stop`](Self::stop) or
/// [`shutdown`](Self::shutdown) is called or the watcher is dropped. If the
/// underlying watch fails, the task logs the failure and exits; serving
/// continues on the last loaded model.
pub struct ModelWatcher {
    /// Absolute path of the watched model file
    path: PathBuf,

    worker: WorkerHandle,
}

impl ModelWatcher {
    /// Starts watching `path`, triggering `signal` for each relevant change.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError`] if the path cannot be resolved or the directory
    /// watch cannot be registered.
    pub fn spawn(path: &Path, signal: ReloadSignal) -> Result<Self, WatchError> {
        let path = std::path::absolute(path)
            .map_err(|source| WatchError::Resolve { path: path.to_path_buf(), source })?;
        let directory = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .ok_or_else(|| WatchError::NoParent(path.clone()))?
            .to_path_buf();

        let (tx, rx) = mpsc::channel(256);
        let mut watcher = RecommendedWatcher::new(
            {
                let target = path.clone();
                // Filtered on the notify thread, identity checks hit the file system
                move |result: notify::Result<Event>| {
                    if let Ok(event) = &result {
                        if !touches_target(event, &target) {
                            return;
                        }
                    }
                    // The receiver only goes away once the watch task has ended
                    let _ = tx.blocking_send(result);
                }
            },
            Config::default(),
        )?;
        watcher.watch(&directory, RecursiveMode::NonRecursive)?;
        info!(path = %path.display(), "watching model file for changes");

        Ok(Self::start(path, watcher, rx, signal))
    }

    /// Runs the watch task over `events`, keeping `guard` alive until it ends.
    fn start<G>(
        path: PathBuf,
        guard: G,
        events: mpsc::Receiver<notify::Result<Event>>,
        signal: ReloadSignal,
    ) -> Self
    where
        G: Send + 'static,
    {
        let worker = WorkerHandle::new({
            let path = path.clone();
            move |running, notifier| {
                tokio::spawn(async move {
                    watch_loop(guard, events, path, signal, running, notifier).await;
                })
            }
        });

        Self { path, worker }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True while the watch task is alive.
    pub fn is_active(&self) -> bool {
        self.worker.is_running() && !self.worker.is_finished()
    }

    /// Cancels the watch without waiting for the task to exit.
    pub fn shutdown(&mut self) {
        self.worker.shutdown();
    }

    /// Cancels the watch and waits for the task to exit.
    pub async fn stop(self) {
        self.worker.stop().await;
    }
}

/// Forwards already filtered events to `signal` until stopped or the watch fails.
async fn watch_loop<G>(
    // Owned here so the OS watch lives exactly as long as this task
    _guard: G,
    mut events: mpsc::Receiver<notify::Result<Event>>,
    target: PathBuf,
    signal: ReloadSignal,
    running: Arc<AtomicBool>,
    notifier: Arc<Notify>,
) {
    while running.load(Ordering::SeqCst) {
        tokio::select! {
            _ = notifier.notified() => continue,
            received = events.recv() => match received {
                Some(Ok(event)) => {
                    debug!(kind = ?event.kind, "model file changed");
                    signal.trigger();
                }
                Some(Err(err)) => {
                    error!(error = %err, path = %target.display(), "model watch failed, hot reload disabled");
                    return;
                }
                None => {
                    error!(path = %target.display(), "model watch channel closed, hot reload disabled");
                    return;
                }
            }
        }
    }
    info!(path = %target.display(), "model watcher stopped");
}

/// True for create or modify events on an entry that is the target file.
pub(crate) fn touches_target(event: &Event, target: &Path) -> bool {
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return false;
    }
    event.paths.iter().any(|changed| match is_same_file(changed, target) {
        Ok(same) => {
            if !same {
                trace!(path = %changed.display(), "ignoring change to unrelated entry");
            }
            same
        }
        Err(err) => {
            trace!(path = %changed.display(), error = %err, "ignoring change to unreadable entry");
            false
        }
    })
}
