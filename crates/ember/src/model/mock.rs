use std::path::Path;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use async_trait::async_trait;
use crate::error::{EvalError, LoadError};
use crate::sample::{FeatureSample, FeatureSchema, FeatureSpec, FeatureValue};
use super::core_trait::{ClassProbability, Evaluator, ModelLoader, Outputs};

/// Two-class evaluator over a single numeric feature `x`.
///
/// `p(yes) = bias` unless `x` is negative, which the model rejects.
#[derive(Debug, Clone)]
pub struct MockEvaluator {
    pub schema: FeatureSchema,
    pub bias: f64,
}

impl MockEvaluator {
    pub fn new(bias: f64) -> Self {
        Self {
            schema: FeatureSchema::new(vec![FeatureSpec::numeric("x")]),
            bias,
        }
    }
}

impl Evaluator for MockEvaluator {
    fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    fn describe(&self) -> String {
        format!("mock model (bias {})", self.bias)
    }

    fn evaluate(&self, sample: &FeatureSample) -> Result<Outputs, EvalError> {
        match sample.get("x") {
            Some(FeatureValue::Numeric(x)) if *x < 0.0 => Err(EvalError::Degenerate("negative x".into())),
            Some(FeatureValue::Numeric(_)) => Ok(Outputs {
                probabilities: vec![
                    ClassProbability { class_id: "no".into(), label: None, probability: 1.0 - self.bias },
                    ClassProbability { class_id: "yes".into(), label: Some("yes!".into()), probability: self.bias },
                ],
            }),
            _ => Err(EvalError::MissingFeature("x".into())),
        }
    }
}

/// Loader whose next result is scripted by the test.
#[derive(Clone)]
pub struct MockLoader {
    next: Arc<Mutex<Result<f64, String>>>,
    loads: Arc<AtomicUsize>,
    delay: Duration,
}

impl MockLoader {
    pub fn new(bias: f64) -> Self {
        Self {
            next: Arc::new(Mutex::new(Ok(bias))),
            loads: Arc::new(AtomicUsize::new(0)),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_bias(&self, bias: f64) {
        *self.next.lock().unwrap() = Ok(bias);
    }

    pub fn set_failure(&self, reason: &str) {
        *self.next.lock().unwrap() = Err(reason.to_string());
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelLoader for MockLoader {
    type Evaluator = MockEvaluator;

    async fn load(&self, path: &Path) -> Result<Self::Evaluator, LoadError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.next.lock().unwrap().clone();
        next.map(MockEvaluator::new).map_err(|reason| LoadError::Invalid {
            path: path.to_path_buf(),
            reason,
        })
    }
}
