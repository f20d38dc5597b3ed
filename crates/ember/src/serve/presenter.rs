use std::fmt::{self, Display};
use std::io::{self, Write};
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use crate::sample::FeatureSample;
use super::outcome::{RequestOutcome, SessionReport};

/// Everything known about one submitted sample once it has been handled.
#[derive(Debug, Clone, Copy)]
pub struct SampleRecord<'a> {
    /// 1-based position among submitted samples
    pub ordinal: usize,

    /// 1-based line number in the source the sample came from
    pub line: usize,

    /// Generation of the model handle that served the sample
    pub generation: u64,

    /// The parsed sample, absent when the line was malformed
    pub sample: Option<&'a FeatureSample>,

    pub outcome: &'a RequestOutcome,
}

/// Renders request results for a human or a downstream tool.
pub trait Presenter {
    /// Renders one handled sample.
    fn present(&mut self, record: &SampleRecord<'_>) -> io::Result<()>;

    /// Renders a free-form status line.
    fn notice(&mut self, message: &str) -> io::Result<()>;

    /// Renders the tally of a finished phase.
    fn summary(&mut self, report: &SessionReport) -> io::Result<()> {
        self.notice(&format!(
            "Evaluated {} sample(s): {} predicted, {} malformed, {} failed",
            report.submitted(),
            report.predictions,
            report.input_errors,
            report.evaluation_failures
        ))
    }
}

impl<P: Presenter + ?Sized> Presenter for Box<P> {
    fn present(&mut self, record: &SampleRecord<'_>) -> io::Result<()> {
        (**self).present(record)
    }

    fn notice(&mut self, message: &str) -> io::Result<()> {
        (**self).notice(message)
    }

    fn summary(&mut self, report: &SessionReport) -> io::Result<()> {
        (**self).summary(report)
    }
}

/// Human readable blocks, one per sample.
pub struct TextPresenter<W> {
    out: W,
}

impl<W: Write> TextPresenter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Presenter for TextPresenter<W> {
    fn present(&mut self, record: &SampleRecord<'_>) -> io::Result<()> {
        let out = &mut self.out;
        writeln!(out, "=== Sample {} ===", record.ordinal)?;
        if let Some(sample) = record.sample {
            writeln!(out, "Input features:")?;
            for (spec, value) in sample.iter() {
                writeln!(out, "  {:<9} = {}", spec.name, value)?;
            }
            writeln!(out)?;
        }

        match record.outcome {
            RequestOutcome::Prediction(prediction) => {
                writeln!(out, "Predicted class id: {}", prediction.class_id)?;
                writeln!(
                    out,
                    "Predicted class label: {}",
                    prediction.label.as_deref().unwrap_or("unknown")
                )?;
                writeln!(out)?;
                writeln!(out, "Class probabilities:")?;
                for class in &prediction.probabilities {
                    let key = format!("probability({})", class.class_id);
                    writeln!(out, "  {:<16} : {:.4}", key, class.probability)?;
                }
            }
            RequestOutcome::Failure { reason } => {
                writeln!(out, "Failed to evaluate sample {} (line {}): {}", record.ordinal, record.line, reason)?;
            }
        }
        writeln!(out, "Model generation: {}", record.generation)?;
        writeln!(out)?;
        out.flush()
    }

    fn notice(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.out, "{message}")?;
        self.out.flush()
    }
}

/// One JSON object per line, for machine consumption.
pub struct JsonPresenter<W> {
    out: W,
}

impl<W: Write> JsonPresenter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line<T: Serialize>(&mut self, value: &T) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, value)?;
        writeln!(self.out)?;
        self.out.flush()
    }
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    sample: usize,
    line: usize,
    generation: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    features: Option<&'a FeatureSample>,
    #[serde(flatten)]
    outcome: &'a RequestOutcome,
}

impl<W: Write> Presenter for JsonPresenter<W> {
    fn present(&mut self, record: &SampleRecord<'_>) -> io::Result<()> {
        self.write_line(&JsonRecord {
            sample: record.ordinal,
            line: record.line,
            generation: record.generation,
            features: record.sample,
            outcome: record.outcome,
        })
    }

    fn notice(&mut self, message: &str) -> io::Result<()> {
        self.write_line(&serde_json::json!({ "notice": message }))
    }

    fn summary(&mut self, report: &SessionReport) -> io::Result<()> {
        self.write_line(&serde_json::json!({ "summary": report }))
    }
}

/// Selects a presenter rendition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    /// Builds the presenter for this format on top of `out`.
    pub fn presenter<W: Write + 'static>(self, out: W) -> Box<dyn Presenter> {
        match self {
            OutputFormat::Text => Box::new(TextPresenter::new(out)),
            OutputFormat::Json => Box::new(JsonPresenter::new(out)),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format '{other}', expected 'text' or 'json'")),
        }
    }
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => f.write_str("text"),
            OutputFormat::Json => f.write_str("json"),
        }
    }
}
