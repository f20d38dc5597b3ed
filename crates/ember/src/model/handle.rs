use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use uuid::Uuid;
use crate::error::EvalError;
use crate::sample::{FeatureSample, FeatureSchema};
use super::core_trait::{Evaluator, Outputs};

/// # ModelHandle
///
/// An immutable wrapper around one loaded evaluator.
///
/// Handles are published behind an `Arc` and never mutated afterwards. A
/// reload builds a fresh handle with the next generation number; the old one
/// is released once the last evaluation holding it completes.
#[derive(Debug)]
pub struct ModelHandle<E> {
    /// Monotonic publish counter, `1` for the startup model
    generation: u64,

    /// Unique id of this loaded instance
    instance: Uuid,

    /// File the evaluator was loaded from
    source: PathBuf,

    /// Wall clock time the load finished
    loaded_at: SystemTime,

    evaluator: E,
}

impl<E: Evaluator> ModelHandle<E> {
    pub(crate) fn new(evaluator: E, source: &Path, generation: u64) -> Self {
        Self {
            generation,
            instance: Uuid::new_v4(),
            source: source.to_path_buf(),
            loaded_at: SystemTime::now(),
            evaluator,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn instance(&self) -> Uuid {
        self.instance
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn loaded_at(&self) -> SystemTime {
        self.loaded_at
    }

    pub fn schema(&self) -> &FeatureSchema {
        self.evaluator.schema()
    }

    /// Scores a sample with the wrapped evaluator.
    ///
    /// Samples parsed against another schema are rejected up front, so a
    /// sample prepared for a superseded model never reaches this one.
    pub fn evaluate(&self, sample: &FeatureSample) -> Result<Outputs, EvalError> {
        if sample.schema() != self.schema() {
            return Err(EvalError::SchemaMismatch);
        }
        self.evaluator.evaluate(sample)
    }
}

impl<E> Deref for ModelHandle<E> {
    type Target = E;

    fn deref(&self) -> &Self::Target {
        &self.evaluator
    }
}
