//! # Model Boundary
//!
//! The serving core never inspects a model's internals. It only needs two
//! capabilities, expressed as traits:
//!
//! * [`ModelLoader`] - turn a file into an evaluator, or fail
//! * [`Evaluator`] - score a [`FeatureSample`](crate::sample::FeatureSample)
//!
//! Loaded evaluators are wrapped in an immutable [`ModelHandle`] before they
//! are published to traffic.
//!
//! [`JsonModelLoader`] is the bundled loader for JSON scoring documents; see
//! the [`scoring`] module for the format.

mod core_trait;
mod handle;
pub mod scoring;

pub use core_trait::*;
pub use handle::ModelHandle;
pub use scoring::{JsonModelLoader, ScoringModel};

/// Scriptable evaluator and loader.
#[cfg(test)]
pub(crate) mod mock;
