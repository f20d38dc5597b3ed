use serde::Serialize;
use crate::error::EvalError;
use crate::model::{ClassProbability, Outputs};

/// The predicted class for one sample, with the full distribution behind it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub class_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub probabilities: Vec<ClassProbability>,
}

impl Prediction {
    /// Picks the most probable class. Ties go to the class listed first.
    ///
    /// # Errors
    ///
    /// Fails with [`EvalError::Degenerate`] when the distribution is empty or
    /// holds a non-finite probability.
    pub fn from_outputs(outputs: Outputs) -> Result<Self, EvalError> {
        if let Some(bad) = outputs.probabilities.iter().find(|p| !p.probability.is_finite()) {
            return Err(EvalError::Degenerate(format!(
                "probability for class '{}' is {}",
                bad.class_id, bad.probability
            )));
        }

        let mut best: Option<&ClassProbability> = None;
        for candidate in &outputs.probabilities {
            if best.is_none_or(|current| candidate.probability > current.probability) {
                best = Some(candidate);
            }
        }
        let best = best.ok_or_else(|| EvalError::Degenerate("empty probability distribution".into()))?;

        Ok(Self {
            class_id: best.class_id.clone(),
            label: best.label.clone(),
            probabilities: outputs.probabilities,
        })
    }
}

/// What came of one submitted sample. Never partially populated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RequestOutcome {
    Prediction(Prediction),
    Failure { reason: String },
}

impl RequestOutcome {
    /// Maps an evaluation result onto an outcome.
    pub fn from_evaluation(result: Result<Outputs, EvalError>) -> Self {
        match result.and_then(Prediction::from_outputs) {
            Ok(prediction) => RequestOutcome::Prediction(prediction),
            Err(err) => RequestOutcome::failure(err),
        }
    }

    pub fn failure(reason: impl ToString) -> Self {
        RequestOutcome::Failure { reason: reason.to_string() }
    }

    pub fn prediction(&self) -> Option<&Prediction> {
        match self {
            RequestOutcome::Prediction(prediction) => Some(prediction),
            RequestOutcome::Failure { .. } => None,
        }
    }
}

/// Tally of one batch or interactive phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionReport {
    /// Samples that produced a prediction
    pub predictions: usize,

    /// Lines that could not be parsed into a sample
    pub input_errors: usize,

    /// Samples the model rejected
    pub evaluation_failures: usize,
}

impl SessionReport {
    /// Number of lines submitted as samples, malformed ones included.
    pub fn submitted(&self) -> usize {
        self.predictions + self.input_errors + self.evaluation_failures
    }

    /// Adds another phase's counts to this one.
    pub fn merge(&mut self, other: SessionReport) {
        self.predictions += other.predictions;
        self.input_errors += other.input_errors;
        self.evaluation_failures += other.evaluation_failures;
    }
}
