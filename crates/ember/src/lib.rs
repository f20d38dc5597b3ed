//! # Ember
//!
//! Serve a classification model from a file and keep serving while that file
//! is replaced.
//!
//! ## Overview
//!
//! This library evaluates samples against a model loaded from disk and swaps
//! in a new version of the model whenever the file changes, without pausing
//! or failing requests that are in flight. A bad replacement (half written,
//! corrupt, or the wrong shape) is logged and ignored; the previous model
//! keeps answering.
//!
//! Key components include:
//!
//! - A loader and evaluator abstraction for models stored as files
//! - A reload coordinator that publishes loaded models atomically
//! - A debounced reload scheduler fed by a file system watcher
//! - A request loop for batch and interactive input with pluggable output
//!
//! ## Architecture
//!
//! ### Model Traits
//!
//! The `ModelLoader` and `Evaluator` traits define what a model format must
//! provide. [`model::JsonModelLoader`] reads the JSON scoring documents this
//! crate ships with; other formats plug in behind the same traits.
//!
//! ### Publishing
//!
//! The active model lives in one atomic slot inside
//! [`engine::ReloadCoordinator`]. Every request takes a snapshot of the slot
//! and finishes on that snapshot, so it observes either the complete old
//! model or the complete new one. Reloads are serialized and each successful
//! one bumps the handle's generation.
//!
//! ### Triggering
//!
//! [`watch::ModelWatcher`] turns file events into triggers for
//! [`engine::ReloadScheduler`], which waits for the burst to settle and then
//! runs a single reload. Triggers that arrive while a reload runs collapse
//! into one follow-up reload.
//!
//! ### Serving
//!
//! [`serve::RequestLoop`] parses lines against the current model's schema,
//! evaluates them and hands each outcome to a [`serve::Presenter`]. Malformed
//! lines and rejected samples are reported and skipped.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ember::engine::{ReloadCoordinator, ReloadScheduler, DEFAULT_DEBOUNCE};
//! use ember::model::JsonModelLoader;
//! use ember::serve::{lines, RequestLoop, TextPresenter};
//! use ember::watch::ModelWatcher;
//!
//! async fn serve() -> anyhow::Result<()> {
//!     let coordinator = Arc::new(ReloadCoordinator::load(JsonModelLoader, "model.json").await?);
//!     let scheduler = ReloadScheduler::spawn(coordinator.clone(), DEFAULT_DEBOUNCE);
//!     let watcher = ModelWatcher::spawn(coordinator.path(), scheduler.signal())?;
//!
//!     let stdin = tokio::io::BufReader::new(tokio::io::stdin());
//!     let mut requests = RequestLoop::new(coordinator, TextPresenter::new(std::io::stdout()));
//!     requests.run_interactive(lines(stdin)).await?;
//!
//!     watcher.stop().await;
//!     scheduler.stop().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod sample;
pub mod serve;
pub mod watch;

pub use config::ServeConfig;
pub use engine::{ReloadCoordinator, ReloadOutcome, ReloadScheduler, ReloadSignal};
pub use error::{ConfigError, EvalError, InputError, LoadError, LoopError, WatchError};
pub use model::{Evaluator, JsonModelLoader, ModelHandle, ModelLoader};
pub use sample::{FeatureSample, FeatureSchema};
pub use serve::{Presenter, RequestLoop, RequestOutcome};
pub use watch::ModelWatcher;
