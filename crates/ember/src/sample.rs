//! Feature samples and the schema they are parsed against.

use std::fmt::{self, Display};
use std::sync::Arc;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use crate::error::InputError;

/// Whether a feature carries a number or a category token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    Numeric,
    Categorical,
}

/// One named input of a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub name: String,
    pub kind: FeatureKind,
}

impl FeatureSpec {
    pub fn numeric(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: FeatureKind::Numeric }
    }

    pub fn categorical(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: FeatureKind::Categorical }
    }
}

/// The ordered feature set a model requires.
///
/// Schemas are shared between an evaluator and every sample parsed against
/// it, so cloning one is a reference count bump.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSchema {
    features: Arc<[FeatureSpec]>,
}

impl FeatureSchema {
    pub fn new(features: Vec<FeatureSpec>) -> Self {
        Self { features: features.into() }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn features(&self) -> &[FeatureSpec] {
        &self.features
    }

    /// Parses one input line into a sample.
    ///
    /// Returns `Ok(None)` for lines that carry no sample: blank lines and
    /// lines starting with `#`. Values may be separated by commas, whitespace,
    /// or any run of both.
    pub fn parse_line(&self, line: &str) -> Result<Option<FeatureSample>, InputError> {
        let trimmed = line.trim();
        if is_skippable(trimmed) {
            return Ok(None);
        }
        let tokens = split_tokens(trimmed).collect::<Vec<_>>();
        self.parse_tokens(&tokens).map(Some)
    }

    /// Builds a sample from already separated tokens, one per feature.
    pub fn parse_tokens<S: AsRef<str>>(&self, tokens: &[S]) -> Result<FeatureSample, InputError> {
        if tokens.len() != self.features.len() {
            return Err(InputError::Arity {
                expected: self.features.len(),
                found: tokens.len(),
            });
        }

        let values = self.features
            .iter()
            .zip(tokens)
            .map(|(spec, token)| {
                let token = token.as_ref().trim();
                match spec.kind {
                    FeatureKind::Numeric => token
                        .parse::<f64>()
                        .map(FeatureValue::Numeric)
                        .map_err(|_| InputError::UnparsableNumber {
                            feature: spec.name.clone(),
                            token: token.to_string(),
                        }),
                    FeatureKind::Categorical => Ok(FeatureValue::Categorical(token.to_string())),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(FeatureSample {
            schema: self.clone(),
            values,
        })
    }
}

/// True for lines that are blank or comments.
pub(crate) fn is_skippable(trimmed: &str) -> bool {
    trimmed.is_empty() || trimmed.starts_with('#')
}

fn split_tokens(line: &str) -> impl Iterator<Item = &str> {
    line.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
}

/// A typed feature value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Numeric(f64),
    Categorical(String),
}

impl Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Numeric(value) => write!(f, "{value:.4}"),
            FeatureValue::Categorical(value) => f.write_str(value),
        }
    }
}

/// An immutable, schema-ordered set of feature values.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSample {
    schema: FeatureSchema,
    values: Vec<FeatureValue>,
}

impl FeatureSample {
    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn values(&self) -> &[FeatureValue] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.iter()
            .find(|(spec, _)| spec.name == name)
            .map(|(_, value)| value)
    }

    /// Pairs each feature spec with its value, in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&FeatureSpec, &FeatureValue)> {
        self.schema.features().iter().zip(self.values.iter())
    }
}

/// Serializes as a map from feature name to value, in schema order.
impl Serialize for FeatureSample {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (spec, value) in self.iter() {
            map.serialize_entry(&spec.name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
pub(crate) fn titanic_schema() -> FeatureSchema {
    FeatureSchema::new(vec![
        FeatureSpec::categorical("Pclass"),
        FeatureSpec::categorical("Sex"),
        FeatureSpec::numeric("Age"),
        FeatureSpec::numeric("SibSp"),
        FeatureSpec::numeric("Parch"),
        FeatureSpec::numeric("Fare"),
        FeatureSpec::categorical("Embarked"),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_comma_separated() {
        let schema = titanic_schema();
        let sample = schema.parse_line("3,male,22,1,0,7.25,S").unwrap().unwrap();

        assert_eq!(sample.values().len(), 7);
        assert_eq!(sample.get("Pclass"), Some(&FeatureValue::Categorical("3".into())));
        assert_eq!(sample.get("Fare"), Some(&FeatureValue::Numeric(7.25)));
        assert_eq!(sample.get("Embarked"), Some(&FeatureValue::Categorical("S".into())));
    }

    #[test]
    fn test_parse_mixed_separators() {
        let schema = titanic_schema();
        let sample = schema.parse_line("  1 , female\t38 1,0  71.2833 C ").unwrap().unwrap();

        assert_eq!(sample.get("Sex"), Some(&FeatureValue::Categorical("female".into())));
        assert_eq!(sample.get("Age"), Some(&FeatureValue::Numeric(38.0)));
    }

    #[test]
    fn test_skips_blank_and_comment_lines() {
        let schema = titanic_schema();
        assert_eq!(schema.parse_line("").unwrap(), None);
        assert_eq!(schema.parse_line("   \t").unwrap(), None);
        assert_eq!(schema.parse_line("# Pclass Sex Age").unwrap(), None);
    }

    #[test]
    fn test_arity_mismatch() {
        let schema = titanic_schema();
        let err = schema.parse_line("3 male 22").unwrap_err();
        assert_eq!(err, InputError::Arity { expected: 7, found: 3 });
    }

    #[test]
    fn test_unparsable_numeric() {
        let schema = titanic_schema();
        let err = schema.parse_line("3 male twenty 1 0 7.25 S").unwrap_err();
        assert_eq!(err, InputError::UnparsableNumber {
            feature: "Age".into(),
            token: "twenty".into(),
        });
    }

    #[test]
    fn test_sample_keeps_schema_order() {
        let schema = titanic_schema();
        let sample = schema.parse_tokens(&["2", "female", "30", "0", "0", "13", "Q"]).unwrap();
        let names = sample.iter().map(|(spec, _)| spec.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["Pclass", "Sex", "Age", "SibSp", "Parch", "Fare", "Embarked"]);
        assert_eq!(sample.schema(), &schema);
    }

    #[test]
    fn test_sample_serializes_as_ordered_map() {
        let schema = titanic_schema();
        let sample = schema.parse_line("3 male 22 1 0 7.25 S").unwrap().unwrap();
        assert_eq!(
            serde_json::to_string(&sample).unwrap(),
            r#"{"Pclass":"3","Sex":"male","Age":22.0,"SibSp":1.0,"Parch":0.0,"Fare":7.25,"Embarked":"S"}"#
        );
    }
}
