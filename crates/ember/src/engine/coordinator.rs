use std::path::{Path, PathBuf};
use std::sync::Arc;
use arc_swap::ArcSwap;
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info};
use uuid::Uuid;
use crate::error::{error_chain, LoadError};
use crate::model::{Evaluator, ModelHandle, ModelLoader};

/// Result of one reload attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ReloadOutcome {
    /// A new handle was published.
    Reloaded { generation: u64, instance: Uuid },
    /// Loading failed; the previous handle is still current.
    Failed { reason: String },
}

impl ReloadOutcome {
    pub fn is_reloaded(&self) -> bool {
        matches!(self, ReloadOutcome::Reloaded { .. })
    }
}

/// Owns the model currently serving traffic.
///
/// The active [`ModelHandle`] sits in a single atomic slot. Readers take a
/// reference-counted snapshot with [`current`](Self::current) and never wait
/// on a reload; a reload builds the replacement completely before publishing
/// it with one pointer swap. Handles that were current when an evaluation
/// started stay alive until that evaluation drops them.
///
/// Reload attempts are serialized, so generations are published strictly in
/// order and a failed attempt leaves the slot untouched.
pub struct ReloadCoordinator<L: ModelLoader> {
    loader: L,

    /// Model file this coordinator serves
    path: PathBuf,

    /// The single published handle
    slot: ArcSwap<ModelHandle<L::Evaluator>>,

    /// Held for the whole load-and-publish step
    reload_lock: Mutex<()>,

    outcomes: broadcast::Sender<ReloadOutcome>,
}

impl<L: ModelLoader> ReloadCoordinator<L> {
    /// Performs the startup load.
    ///
    /// # Errors
    ///
    /// Returns the loader's error unchanged. There is no previous model to
    /// fall back on, so callers should treat this as fatal.
    pub async fn load(loader: L, path: impl Into<PathBuf>) -> Result<Self, LoadError> {
        let path = path.into();
        let evaluator = loader.load(&path).await?;
        let handle = ModelHandle::new(evaluator, &path, 1);
        info!(
            path = %path.display(),
            model = %handle.describe(),
            instance = %handle.instance(),
            "model loaded"
        );

        let (outcomes, _) = broadcast::channel(32);
        Ok(Self {
            loader,
            path,
            slot: ArcSwap::from_pointee(handle),
            reload_lock: Mutex::new(()),
            outcomes,
        })
    }

    /// Returns the handle that is serving right now.
    pub fn current(&self) -> Arc<ModelHandle<L::Evaluator>> {
        self.slot.load_full()
    }

    pub fn generation(&self) -> u64 {
        self.slot.load().generation()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Subscribes to the outcome of every subsequent reload attempt.
    pub fn subscribe(&self) -> broadcast::Receiver<ReloadOutcome> {
        self.outcomes.subscribe()
    }

    /// Reloads from the coordinator's own model path.
    pub async fn reload(&self) -> ReloadOutcome {
        self.try_reload(&self.path).await
    }

    /// Loads `path` and, on success, publishes it as the current model.
    ///
    /// On failure the current model keeps serving; the error is logged with
    /// its full cause chain and returned as [`ReloadOutcome::Failed`].
    pub async fn try_reload(&self, path: &Path) -> ReloadOutcome {
        let _guard = self.reload_lock.lock().await;
        info!(path = %path.display(), "reloading model");

        let outcome = match self.loader.load(path).await {
            Ok(evaluator) => {
                let generation = self.generation() + 1;
                let handle = Arc::new(ModelHandle::new(evaluator, path, generation));
                let instance = handle.instance();
                let summary = handle.describe();
                self.slot.store(handle);
                info!(generation, %instance, model = %summary, "model reload succeeded");
                ReloadOutcome::Reloaded { generation, instance }
            }
            Err(err) => {
                let reason = error_chain(&err);
                error!(
                    path = %path.display(),
                    generation = self.generation(),
                    error = %reason,
                    "model reload failed, keeping current model"
                );
                ReloadOutcome::Failed { reason }
            }
        };

        // No subscribers is fine
        let _ = self.outcomes.send(outcome.clone());
        outcome
    }
}
