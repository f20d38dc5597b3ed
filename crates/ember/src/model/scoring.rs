//! JSON scoring documents.
//!
//! A scoring document declares the feature schema, the class labels and one
//! estimator. Two estimators are understood:
//!
//! * `logistic` - multinomial logistic regression, one intercept and one
//!   coefficient row per class, softmax over the class scores.
//! * `forest` - an ensemble of decision trees whose leaf distributions are
//!   averaged.
//!
//! Both operate on the encoded input row: numeric features occupy one column,
//! categorical features are one-hot encoded over their declared categories,
//! in schema order.
//!
//! ```json
//! {
//!   "name": "titanic",
//!   "classes": [{ "id": "0", "label": "not_survived" }, { "id": "1", "label": "survived" }],
//!   "features": [
//!     { "name": "Sex", "kind": "categorical", "categories": ["female", "male"] },
//!     { "name": "Age", "kind": "numeric" }
//!   ],
//!   "estimator": {
//!     "type": "logistic",
//!     "intercepts": [0.0, 0.5],
//!     "coefficients": [[0.0, 0.0, 0.0], [1.2, -1.2, -0.03]]
//!   }
//! }
//! ```

use std::collections::HashSet;
use std::path::Path;
use async_trait::async_trait;
use serde::Deserialize;
use crate::error::{EvalError, LoadError};
use crate::sample::{FeatureSample, FeatureSchema, FeatureSpec, FeatureValue};
use super::core_trait::{ClassProbability, Evaluator, ModelLoader, Outputs};

#[derive(Debug, Deserialize)]
struct ModelDocument {
    name: String,
    classes: Vec<ClassDocument>,
    features: Vec<FeatureDocument>,
    estimator: EstimatorDocument,
}

#[derive(Debug, Clone, Deserialize)]
struct ClassDocument {
    id: String,
    #[serde(default)]
    label: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum FeatureDocument {
    Numeric { name: String },
    Categorical { name: String, categories: Vec<String> },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum EstimatorDocument {
    Logistic {
        intercepts: Vec<f64>,
        coefficients: Vec<Vec<f64>>,
    },
    Forest {
        trees: Vec<TreeDocument>,
    },
}

#[derive(Debug, Deserialize)]
struct TreeDocument {
    nodes: Vec<Node>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Node {
    Split {
        column: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        distribution: Vec<f64>,
    },
}

#[derive(Debug, Clone)]
enum Encoder {
    Numeric { name: String },
    OneHot { name: String, categories: Vec<String> },
}

impl Encoder {
    fn width(&self) -> usize {
        match self {
            Encoder::Numeric { .. } => 1,
            Encoder::OneHot { categories, .. } => categories.len(),
        }
    }

    fn name(&self) -> &str {
        match self {
            Encoder::Numeric { name } | Encoder::OneHot { name, .. } => name,
        }
    }

    fn encode_into(&self, value: &FeatureValue, row: &mut Vec<f64>) -> Result<(), EvalError> {
        match (self, value) {
            (Encoder::Numeric { name }, FeatureValue::Numeric(number)) => {
                if !number.is_finite() {
                    return Err(EvalError::NonFinite { feature: name.clone() });
                }
                row.push(*number);
                Ok(())
            }
            (Encoder::OneHot { name, categories }, FeatureValue::Categorical(token)) => {
                let hit = categories
                    .iter()
                    .position(|category| category == token)
                    .ok_or_else(|| EvalError::UnknownCategory {
                        feature: name.clone(),
                        value: token.clone(),
                    })?;
                row.extend((0..categories.len()).map(|idx| if idx == hit { 1.0 } else { 0.0 }));
                Ok(())
            }
            (Encoder::Numeric { name }, _) => Err(EvalError::TypeMismatch {
                feature: name.clone(),
                expected: "numeric",
            }),
            (Encoder::OneHot { name, .. }, _) => Err(EvalError::TypeMismatch {
                feature: name.clone(),
                expected: "categorical",
            }),
        }
    }
}

#[derive(Debug, Clone)]
enum Estimator {
    Logistic {
        intercepts: Vec<f64>,
        coefficients: Vec<Vec<f64>>,
    },
    Forest {
        trees: Vec<Vec<Node>>,
    },
}

impl Estimator {
    fn kind(&self) -> &'static str {
        match self {
            Estimator::Logistic { .. } => "logistic",
            Estimator::Forest { .. } => "forest",
        }
    }

    fn predict(&self, row: &[f64]) -> Vec<f64> {
        match self {
            Estimator::Logistic { intercepts, coefficients } => {
                let scores = intercepts
                    .iter()
                    .zip(coefficients)
                    .map(|(intercept, weights)| {
                        intercept + weights.iter().zip(row).map(|(w, x)| w * x).sum::<f64>()
                    })
                    .collect::<Vec<_>>();
                softmax(&scores)
            }
            Estimator::Forest { trees } => {
                let mut total = Vec::new();
                for tree in trees {
                    let leaf = walk(tree, row);
                    if total.is_empty() {
                        total = vec![0.0; leaf.len()];
                    }
                    total.iter_mut().zip(leaf).for_each(|(acc, p)| *acc += p);
                }
                let count = trees.len() as f64;
                total.iter_mut().for_each(|p| *p /= count);
                total
            }
        }
    }
}

fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps = scores.iter().map(|s| (s - max).exp()).collect::<Vec<_>>();
    let sum = exps.iter().sum::<f64>();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Follows split nodes from the root to a leaf.
///
/// Validation guarantees children index forward, so the walk terminates.
fn walk<'a>(nodes: &'a [Node], row: &[f64]) -> &'a [f64] {
    let mut idx = 0;
    loop {
        match &nodes[idx] {
            Node::Split { column, threshold, left, right } => {
                idx = if row[*column] <= *threshold { *left } else { *right };
            }
            Node::Leaf { distribution } => return distribution,
        }
    }
}

/// An evaluator backed by a JSON scoring document.
#[derive(Debug, Clone)]
pub struct ScoringModel {
    name: String,
    schema: FeatureSchema,
    encoders: Vec<Encoder>,
    classes: Vec<ClassDocument>,
    estimator: Estimator,
}

impl ScoringModel {
    /// Parses and validates a scoring document.
    ///
    /// `origin` only labels errors.
    pub fn from_slice(bytes: &[u8], origin: &Path) -> Result<Self, LoadError> {
        let document: ModelDocument = serde_json::from_slice(bytes)
            .map_err(|source| LoadError::Parse { path: origin.to_path_buf(), source })?;
        Self::from_document(document)
            .map_err(|reason| LoadError::Invalid { path: origin.to_path_buf(), reason })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn width(&self) -> usize {
        self.encoders.iter().map(Encoder::width).sum()
    }

    fn from_document(document: ModelDocument) -> Result<Self, String> {
        let ModelDocument { name, classes, features, estimator } = document;

        if classes.is_empty() {
            return Err("model declares no classes".to_string());
        }
        let mut seen = HashSet::new();
        if let Some(dup) = classes.iter().find(|class| !seen.insert(class.id.as_str())) {
            return Err(format!("duplicate class id '{}'", dup.id));
        }

        if features.is_empty() {
            return Err("model declares no features".to_string());
        }
        let encoders = features
            .into_iter()
            .map(|feature| match feature {
                FeatureDocument::Numeric { name } => Ok(Encoder::Numeric { name }),
                FeatureDocument::Categorical { name, categories } if categories.is_empty() => {
                    Err(format!("categorical feature '{name}' declares no categories"))
                }
                FeatureDocument::Categorical { name, categories } => {
                    Ok(Encoder::OneHot { name, categories })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        let mut seen = HashSet::new();
        if let Some(dup) = encoders.iter().find(|encoder| !seen.insert(encoder.name())) {
            return Err(format!("duplicate feature '{}'", dup.name()));
        }

        let schema = FeatureSchema::new(
            encoders
                .iter()
                .map(|encoder| match encoder {
                    Encoder::Numeric { name } => FeatureSpec::numeric(name.clone()),
                    Encoder::OneHot { name, .. } => FeatureSpec::categorical(name.clone()),
                })
                .collect(),
        );

        let mut model = Self {
            name,
            schema,
            encoders,
            classes,
            estimator: Estimator::Forest { trees: vec![] },
        };
        model.estimator = model.validate_estimator(estimator)?;
        Ok(model)
    }

    fn validate_estimator(&self, estimator: EstimatorDocument) -> Result<Estimator, String> {
        let width = self.width();
        let class_count = self.classes.len();

        match estimator {
            EstimatorDocument::Logistic { intercepts, coefficients } => {
                if intercepts.len() != class_count || coefficients.len() != class_count {
                    return Err(format!(
                        "logistic estimator needs {class_count} intercepts and coefficient rows, got {} and {}",
                        intercepts.len(),
                        coefficients.len()
                    ));
                }
                if let Some((idx, row)) = coefficients.iter().enumerate().find(|(_, row)| row.len() != width) {
                    return Err(format!(
                        "coefficient row {idx} has {} columns, encoded input has {width}",
                        row.len()
                    ));
                }
                let finite = intercepts.iter().chain(coefficients.iter().flatten()).all(|v| v.is_finite());
                if !finite {
                    return Err("logistic estimator contains non-finite weights".to_string());
                }
                Ok(Estimator::Logistic { intercepts, coefficients })
            }
            EstimatorDocument::Forest { trees } => {
                if trees.is_empty() {
                    return Err("forest estimator contains no trees".to_string());
                }
                let trees = trees
                    .into_iter()
                    .enumerate()
                    .map(|(idx, tree)| {
                        validate_tree(&tree.nodes, width, class_count)
                            .map(|_| tree.nodes)
                            .map_err(|reason| format!("tree {idx}: {reason}"))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Estimator::Forest { trees })
            }
        }
    }
}

fn validate_tree(nodes: &[Node], width: usize, class_count: usize) -> Result<(), String> {
    if nodes.is_empty() {
        return Err("tree has no nodes".to_string());
    }
    for (idx, node) in nodes.iter().enumerate() {
        match node {
            Node::Split { column, threshold, left, right } => {
                if *column >= width {
                    return Err(format!("node {idx} splits on column {column}, encoded input has {width}"));
                }
                if !threshold.is_finite() {
                    return Err(format!("node {idx} has a non-finite threshold"));
                }
                for child in [left, right] {
                    if *child <= idx || *child >= nodes.len() {
                        return Err(format!("node {idx} points at invalid child {child}"));
                    }
                }
            }
            Node::Leaf { distribution } => {
                if distribution.len() != class_count {
                    return Err(format!(
                        "leaf {idx} has {} probabilities, model has {class_count} classes",
                        distribution.len()
                    ));
                }
                if distribution.iter().any(|p| !p.is_finite() || *p < 0.0) {
                    return Err(format!("leaf {idx} has an invalid probability"));
                }
            }
        }
    }
    Ok(())
}

impl Evaluator for ScoringModel {
    fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    fn describe(&self) -> String {
        format!(
            "{} model '{}' ({} features, {} classes)",
            self.estimator.kind(),
            self.name,
            self.schema.len(),
            self.classes.len()
        )
    }

    fn evaluate(&self, sample: &FeatureSample) -> Result<Outputs, EvalError> {
        let mut row = Vec::with_capacity(self.width());
        for encoder in &self.encoders {
            let value = sample
                .get(encoder.name())
                .ok_or_else(|| EvalError::MissingFeature(encoder.name().to_string()))?;
            encoder.encode_into(value, &mut row)?;
        }

        let raw = self.estimator.predict(&row);
        let sum = raw.iter().sum::<f64>();
        if !sum.is_finite() || sum <= 0.0 {
            return Err(EvalError::Degenerate(format!("probabilities sum to {sum}")));
        }

        let probabilities = self.classes
            .iter()
            .zip(raw)
            .map(|(class, p)| ClassProbability {
                class_id: class.id.clone(),
                label: class.label.clone(),
                probability: p / sum,
            })
            .collect();
        Ok(Outputs { probabilities })
    }
}

/// Loads [`ScoringModel`]s from JSON files.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonModelLoader;

#[async_trait]
impl ModelLoader for JsonModelLoader {
    type Evaluator = ScoringModel;

    async fn load(&self, path: &Path) -> Result<Self::Evaluator, LoadError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| LoadError::Io { path: path.to_path_buf(), source })?;
        ScoringModel::from_slice(&bytes, path)
    }
}

#[cfg(test)]
pub(crate) const LOGISTIC_FIXTURE: &str = include_str!("../../tests/fixtures/titanic_logistic.json");

#[cfg(test)]
pub(crate) const FOREST_FIXTURE: &str = include_str!("../../tests/fixtures/titanic_forest.json");

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::titanic_schema;

    fn model(source: &str) -> ScoringModel {
        ScoringModel::from_slice(source.as_bytes(), Path::new("fixture.json")).unwrap()
    }

    fn argmax(outputs: &Outputs) -> &str {
        outputs.probabilities
            .iter()
            .max_by(|a, b| a.probability.total_cmp(&b.probability))
            .map(|p| p.class_id.as_str())
            .unwrap()
    }

    #[test]
    fn test_logistic_scores_titanic_samples() {
        let model = model(LOGISTIC_FIXTURE);
        assert_eq!(model.schema(), &titanic_schema());

        let male = model.schema().parse_line("3,male,22,1,0,7.25,S").unwrap().unwrap();
        let female = model.schema().parse_line("1,female,38,1,0,71.2833,C").unwrap().unwrap();

        let out_male = model.evaluate(&male).unwrap();
        let out_female = model.evaluate(&female).unwrap();

        for out in [&out_male, &out_female] {
            let sum = out.probabilities.iter().map(|p| p.probability).sum::<f64>();
            assert!((sum - 1.0).abs() < 1e-9);
        }
        assert_eq!(argmax(&out_male), "0");
        assert_eq!(argmax(&out_female), "1");
        assert_eq!(out_female.probabilities[1].label.as_deref(), Some("survived"));
    }

    #[test]
    fn test_forest_averages_leaves() {
        let model = model(FOREST_FIXTURE);

        let male = model.schema().parse_line("3 male 22 1 0 7.25 S").unwrap().unwrap();
        let out = model.evaluate(&male).unwrap();
        assert!((out.probabilities[0].probability - 0.84).abs() < 1e-9);
        assert!((out.probabilities[1].probability - 0.16).abs() < 1e-9);

        let female = model.schema().parse_line("1 female 38 1 0 71.2833 C").unwrap().unwrap();
        let out = model.evaluate(&female).unwrap();
        assert!((out.probabilities[1].probability - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_category_is_rejected() {
        let model = model(LOGISTIC_FIXTURE);
        let sample = model.schema().parse_line("3 male 22 1 0 7.25 X").unwrap().unwrap();
        assert_eq!(
            model.evaluate(&sample).unwrap_err(),
            EvalError::UnknownCategory { feature: "Embarked".into(), value: "X".into() }
        );
    }

    #[test]
    fn test_non_finite_input_is_rejected() {
        let model = model(LOGISTIC_FIXTURE);
        let sample = model.schema().parse_line("3 male NaN 1 0 7.25 S").unwrap().unwrap();
        assert_eq!(
            model.evaluate(&sample).unwrap_err(),
            EvalError::NonFinite { feature: "Age".into() }
        );
    }

    #[test]
    fn test_rejects_truncated_document() {
        let truncated = &LOGISTIC_FIXTURE[..LOGISTIC_FIXTURE.len() / 2];
        let err = ScoringModel::from_slice(truncated.as_bytes(), Path::new("m.json")).unwrap_err();
        assert!(matches!(err, LoadError::Parse { .. }));
    }

    #[test]
    fn test_rejects_coefficient_width_mismatch() {
        let doc = r#"{
            "name": "bad",
            "classes": [{"id": "0"}, {"id": "1"}],
            "features": [{"name": "x", "kind": "numeric"}],
            "estimator": {"type": "logistic", "intercepts": [0, 0], "coefficients": [[0], [1, 2]]}
        }"#;
        let err = ScoringModel::from_slice(doc.as_bytes(), Path::new("m.json")).unwrap_err();
        assert!(matches!(err, LoadError::Invalid { ref reason, .. } if reason.contains("coefficient row 1")));
    }

    #[test]
    fn test_rejects_backward_pointing_tree() {
        let doc = r#"{
            "name": "loop",
            "classes": [{"id": "a"}],
            "features": [{"name": "x", "kind": "numeric"}],
            "estimator": {"type": "forest", "trees": [{"nodes": [
                {"column": 0, "threshold": 1.0, "left": 0, "right": 1},
                {"distribution": [1.0]}
            ]}]}
        }"#;
        let err = ScoringModel::from_slice(doc.as_bytes(), Path::new("m.json")).unwrap_err();
        assert!(matches!(err, LoadError::Invalid { ref reason, .. } if reason.contains("invalid child 0")));
    }

    #[test]
    fn test_rejects_duplicate_classes() {
        let doc = r#"{
            "name": "dup",
            "classes": [{"id": "a"}, {"id": "a"}],
            "features": [{"name": "x", "kind": "numeric"}],
            "estimator": {"type": "logistic", "intercepts": [0, 0], "coefficients": [[0], [0]]}
        }"#;
        let err = ScoringModel::from_slice(doc.as_bytes(), Path::new("m.json")).unwrap_err();
        assert!(matches!(err, LoadError::Invalid { .. }));
    }

    #[tokio::test]
    async fn test_loader_reports_missing_file() {
        let err = JsonModelLoader.load(Path::new("/definitely/not/here.json")).await.unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[test]
    fn test_describe() {
        assert_eq!(
            model(FOREST_FIXTURE).describe(),
            "forest model 'titanic_random_forest' (7 features, 2 classes)"
        );
    }
}
