//! Session configuration.
//!
//! Settings are layered: built-in defaults, then an optional configuration
//! file (TOML, JSON or YAML, picked by extension), then `EMBER__*`
//! environment variables. Command line flags are applied on top by the
//! binary.

use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::engine::DEFAULT_DEBOUNCE;
use crate::error::ConfigError;
use crate::serve::{OutputFormat, DEFAULT_EXIT_SENTINEL};

/// Model file served when none is configured.
pub const DEFAULT_MODEL_PATH: &str = "model/titanic_random_forest.json";

/// Sample evaluated when neither positional values nor a batch file are given.
pub const DEFAULT_SAMPLE: &str = "3 male 22 1 0 7.25 S";

/// Upper bound for the reload debounce window.
const MAX_DEBOUNCE_MS: u64 = 60_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Model file to serve, [`DEFAULT_MODEL_PATH`] when unset
    pub model_path: Option<PathBuf>,

    /// Keep serving interactively and reload when the model file changes
    pub watch: bool,

    /// Quiet period before a burst of file events turns into one reload
    pub debounce_ms: u64,

    /// Interactive line that ends the session
    pub exit_sentinel: String,

    pub default_sample: String,

    pub output: OutputFormat,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            watch: false,
            debounce_ms: DEFAULT_DEBOUNCE.as_millis() as u64,
            exit_sentinel: DEFAULT_EXIT_SENTINEL.to_string(),
            default_sample: DEFAULT_SAMPLE.to_string(),
            output: OutputFormat::Text,
        }
    }
}

impl ServeConfig {
    /// Loads configuration from `file` (if any) and the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, a value
    /// has the wrong type, or the result fails [`validate`](Self::validate).
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_from(file, None)
    }

    /// Like [`load`](Self::load), reading variables from `env` instead of
    /// the process environment when given.
    pub fn load_from(
        file: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(file) = file {
            builder = builder.add_source(config::File::from(file).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("EMBER")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let config: ServeConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that deserialize fine but cannot be served with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.exit_sentinel.trim().is_empty() {
            return Err(ConfigError::Invalid("exit_sentinel must not be blank".into()));
        }
        if self.default_sample.trim().is_empty() {
            return Err(ConfigError::Invalid("default_sample must not be blank".into()));
        }
        if self.debounce_ms > MAX_DEBOUNCE_MS {
            return Err(ConfigError::Invalid(format!(
                "debounce_ms must be at most {MAX_DEBOUNCE_MS}, got {}",
                self.debounce_ms
            )));
        }
        if self.model_path.as_ref().is_some_and(|path| path.as_os_str().is_empty()) {
            return Err(ConfigError::Invalid("model_path must not be empty".into()));
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// The model file to load.
    ///
    /// A configured path is used as given. The default path is relative, so
    /// when it does not exist under the working directory the parent
    /// directory is tried as well.
    pub fn resolved_model_path(&self) -> PathBuf {
        match &self.model_path {
            Some(path) => path.clone(),
            None => resolve_relative(Path::new(DEFAULT_MODEL_PATH)),
        }
    }
}

/// Returns `path`, or `../path` when `path` is relative and missing but the
/// parent-relative one exists.
pub fn resolve_relative(path: &Path) -> PathBuf {
    if path.is_absolute() || path.exists() {
        return path.to_path_buf();
    }
    let parent = Path::new("..").join(path);
    if parent.exists() {
        parent
    } else {
        path.to_path_buf()
    }
}
