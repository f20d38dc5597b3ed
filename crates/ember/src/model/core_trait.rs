use std::path::Path;
use async_trait::async_trait;
use serde::Serialize;
use crate::error::{EvalError, LoadError};
use crate::sample::{FeatureSample, FeatureSchema};

/// Probability assigned to one class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassProbability {
    pub class_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub probability: f64,
}

/// Raw result of scoring one sample: a distribution over the model's classes.
#[derive(Debug, Clone, PartialEq)]
pub struct Outputs {
    pub probabilities: Vec<ClassProbability>,
}

/// Scores feature samples against one fixed, loaded model.
///
/// Implementations must be safe to share across threads: `evaluate` takes
/// `&self` and must not mutate shared state, so any number of concurrent
/// evaluations may run against one evaluator without external locking.
///
/// # Example
///
/// ```ignore
/// use ember::model::{Evaluator, Outputs};
///
/// struct Constant { schema: FeatureSchema }
///
/// impl Evaluator for Constant {
///     fn schema(&self) -> &FeatureSchema { &self.schema }
///     fn describe(&self) -> String { "constant".into() }
///     fn evaluate(&self, _sample: &FeatureSample) -> Result<Outputs, EvalError> {
///         Ok(Outputs { probabilities: vec![] })
///     }
/// }
/// ```
pub trait Evaluator: Send + Sync + 'static {
    /// The ordered feature set this model requires.
    fn schema(&self) -> &FeatureSchema;

    /// A short human readable summary of the model.
    fn describe(&self) -> String;

    /// Scores a sample.
    ///
    /// # Errors
    ///
    /// Returns an [`EvalError`] when the model rejects the prepared input.
    fn evaluate(&self, sample: &FeatureSample) -> Result<Outputs, EvalError>;
}

/// Turns a model file into an [`Evaluator`].
///
/// Loading must be referentially transparent: the same valid file always
/// produces an equivalent evaluator.
#[async_trait]
pub trait ModelLoader: Send + Sync + 'static {
    type Evaluator: Evaluator;

    /// Loads the model stored at `path`.
    async fn load(&self, path: &Path) -> Result<Self::Evaluator, LoadError>;
}
