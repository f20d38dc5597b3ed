//! Error types surfaced by the serving core.
//!
//! Each component boundary owns one enum. Only [`LoadError`] at startup is
//! meant to be fatal; every other error is converted into a reported outcome
//! by the component that catches it.

use std::io;
use std::path::PathBuf;

/// Failure to turn a model file into an evaluator.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read model file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse model file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid model in {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

/// The evaluator rejected a prepared sample.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("value '{value}' is not a valid category for feature '{feature}'")]
    UnknownCategory { feature: String, value: String },

    #[error("feature '{feature}' must be a finite number")]
    NonFinite { feature: String },

    #[error("missing value for required field: {0}")]
    MissingFeature(String),

    #[error("feature '{feature}' expected a {expected} value")]
    TypeMismatch { feature: String, expected: &'static str },

    #[error("sample was prepared for a different feature schema")]
    SchemaMismatch,

    #[error("model produced no usable probabilities: {0}")]
    Degenerate(String),
}

/// A line could not be turned into a feature sample.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InputError {
    #[error("expected {expected} values per sample, got {found}")]
    Arity { expected: usize, found: usize },

    #[error("cannot parse numeric value for {feature}: {token}")]
    UnparsableNumber { feature: String, token: String },
}

/// The filesystem watch could not be established.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("model path {0} has no parent directory to watch")]
    NoParent(PathBuf),

    #[error("failed to resolve model path {path}: {source}")]
    Resolve {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("file watch failed: {0}")]
    Notify(#[from] notify::Error),
}

/// Session-level failures of the request loop.
#[derive(Debug, thiserror::Error)]
pub enum LoopError {
    #[error("request loop cannot {action} while {state:?}")]
    InvalidState {
        action: &'static str,
        state: crate::serve::LoopState,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Configuration could not be assembled.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Source(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Renders an error with its full source chain, for log lines.
pub(crate) fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !rendered.contains(&text) {
            rendered.push_str(": ");
            rendered.push_str(&text);
        }
        source = cause.source();
    }
    rendered
}
