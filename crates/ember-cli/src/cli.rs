//! Command line definition.

use std::path::PathBuf;
use clap::Parser;
use ember::serve::OutputFormat;
use ember::ServeConfig;

/// Serve a classification model and reload it when its file changes
#[derive(Debug, Parser)]
#[command(name = "ember")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Model file to serve [default: model/titanic_random_forest.json]
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// File of samples to evaluate, one per line
    #[arg(short, long)]
    pub batch: Option<PathBuf>,

    /// Keep reading samples from stdin and reload the model when it changes
    #[arg(short, long)]
    pub watch: bool,

    /// Configuration file (TOML, JSON or YAML)
    #[arg(short, long, env = "EMBER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format (text, json)
    #[arg(short, long)]
    pub output: Option<OutputFormat>,

    /// Quiet period in milliseconds before a file change triggers a reload
    #[arg(long)]
    pub debounce_ms: Option<u64>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Feature values of a single sample, in model order
    #[arg(allow_hyphen_values = true)]
    pub features: Vec<String>,
}

impl Cli {
    /// Lays the flags that were given over `config`.
    pub fn apply(&self, config: &mut ServeConfig) {
        if let Some(model) = &self.model {
            config.model_path = Some(model.clone());
        }
        if self.watch {
            config.watch = true;
        }
        if let Some(output) = self.output {
            config.output = output;
        }
        if let Some(debounce_ms) = self.debounce_ms {
            config.debounce_ms = debounce_ms;
        }
    }

    /// The positional values joined into one sample line, if any were given.
    pub fn sample_line(&self) -> Option<String> {
        (!self.features.is_empty()).then(|| self.features.join(" "))
    }
}
