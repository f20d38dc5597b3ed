use std::io;
use std::sync::Arc;
use futures::{Stream, StreamExt};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};
use crate::engine::ReloadCoordinator;
use crate::error::LoopError;
use crate::model::ModelLoader;
use super::outcome::{RequestOutcome, SessionReport};
use super::presenter::{Presenter, SampleRecord};

/// Default line that ends an interactive session.
pub const DEFAULT_EXIT_SENTINEL: &str = ":exit";

/// Where a [`RequestLoop`] is in its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Ready for a batch or the interactive phase
    Idle,
    EvaluatingBatch,
    /// Waiting for the next interactive line
    InteractiveOpen,
    EvaluatingOne,
    /// The session is over, no further phases may run
    Closed,
}

/// # RequestLoop
///
/// Feeds lines of feature values to whichever model is current and hands the
/// results to a [`Presenter`].
///
/// A session runs any number of batch phases, then at most one interactive
/// phase, after which the loop is closed. Every sample re-reads the current
/// model handle, so a reload published mid-session applies from the next
/// sample on, while the sample in flight finishes on the handle it started
/// with.
pub struct RequestLoop<L: ModelLoader, P> {
    coordinator: Arc<ReloadCoordinator<L>>,

    presenter: P,

    /// Lowercased line that ends the interactive phase
    exit_sentinel: String,

    state: LoopState,

    /// Samples submitted so far across all phases
    submitted: usize,
}

impl<L: ModelLoader, P: Presenter> RequestLoop<L, P> {
    pub fn new(coordinator: Arc<ReloadCoordinator<L>>, presenter: P) -> Self {
        Self {
            coordinator,
            presenter,
            exit_sentinel: DEFAULT_EXIT_SENTINEL.to_string(),
            state: LoopState::Idle,
            submitted: 0,
        }
    }

    /// Replaces the interactive exit sentinel. Matching ignores case and
    /// surrounding whitespace.
    pub fn with_exit_sentinel(mut self, sentinel: &str) -> Self {
        self.exit_sentinel = sentinel.trim().to_lowercase();
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    pub fn into_presenter(self) -> P {
        self.presenter
    }

    /// Evaluates every sample line of a finite source, in order.
    ///
    /// Malformed lines and rejected samples are reported and skipped. The
    /// loop is back to [`LoopState::Idle`] afterwards, even when the phase
    /// ends with an error.
    ///
    /// # Errors
    ///
    /// [`LoopError::InvalidState`] unless the loop is idle, and
    /// [`LoopError::Io`] when reading the source or presenting fails.
    pub async fn run_batch<S>(&mut self, lines: S) -> Result<SessionReport, LoopError>
    where
        S: Stream<Item = io::Result<String>>,
    {
        self.enter(LoopState::EvaluatingBatch, "start a batch")?;
        let result = self.drain_batch(lines).await;
        self.state = LoopState::Idle;

        let report = result?;
        info!(
            predictions = report.predictions,
            input_errors = report.input_errors,
            evaluation_failures = report.evaluation_failures,
            "batch finished"
        );
        self.presenter.summary(&report)?;
        Ok(report)
    }

    async fn drain_batch<S>(&mut self, lines: S) -> Result<SessionReport, LoopError>
    where
        S: Stream<Item = io::Result<String>>,
    {
        let mut lines = std::pin::pin!(lines);
        let mut report = SessionReport::default();
        let mut line_no = 0;
        while let Some(line) = lines.next().await {
            line_no += 1;
            self.submit(line_no, &line?, &mut report)?;
        }
        Ok(report)
    }

    /// Evaluates lines one at a time until the exit sentinel or the end of
    /// the source, then closes the loop and presents a summary.
    ///
    /// The sentinel line itself is never evaluated.
    ///
    /// # Errors
    ///
    /// [`LoopError::InvalidState`] unless the loop is idle, and
    /// [`LoopError::Io`] when reading the source or presenting fails. The
    /// loop is closed in every case.
    pub async fn run_interactive<S>(&mut self, lines: S) -> Result<SessionReport, LoopError>
    where
        S: Stream<Item = io::Result<String>>,
    {
        self.enter(LoopState::InteractiveOpen, "start an interactive session")?;
        let result = self.drain_interactive(lines).await;
        self.state = LoopState::Closed;

        let report = result?;
        info!(
            predictions = report.predictions,
            input_errors = report.input_errors,
            evaluation_failures = report.evaluation_failures,
            "interactive session closed"
        );
        self.presenter.summary(&report)?;
        Ok(report)
    }

    async fn drain_interactive<S>(&mut self, lines: S) -> Result<SessionReport, LoopError>
    where
        S: Stream<Item = io::Result<String>>,
    {
        let mut lines = std::pin::pin!(lines);
        let mut report = SessionReport::default();
        let mut line_no = 0;
        while let Some(line) = lines.next().await {
            let line = line?;
            line_no += 1;
            if line.trim().to_lowercase() == self.exit_sentinel {
                debug!(line = line_no, "exit sentinel received");
                break;
            }

            self.state = LoopState::EvaluatingOne;
            self.submit(line_no, &line, &mut report)?;
            self.state = LoopState::InteractiveOpen;
        }
        Ok(report)
    }

    /// Ends the session without an interactive phase.
    ///
    /// # Errors
    ///
    /// [`LoopError::InvalidState`] while a phase is running.
    pub fn close(&mut self) -> Result<(), LoopError> {
        match self.state {
            LoopState::Idle | LoopState::Closed => {
                self.state = LoopState::Closed;
                Ok(())
            }
            state => Err(LoopError::InvalidState { action: "close", state }),
        }
    }

    fn enter(&mut self, next: LoopState, action: &'static str) -> Result<(), LoopError> {
        if self.state != LoopState::Idle {
            return Err(LoopError::InvalidState { action, state: self.state });
        }
        self.state = next;
        Ok(())
    }

    /// Parses, evaluates and presents one line against the current model.
    fn submit(&mut self, line_no: usize, line: &str, report: &mut SessionReport) -> io::Result<()> {
        let handle = self.coordinator.current();
        let parsed = match handle.schema().parse_line(line) {
            Ok(None) => return Ok(()),
            Ok(Some(sample)) => Ok(sample),
            Err(err) => Err(err),
        };
        self.submitted += 1;

        let outcome = match &parsed {
            Ok(sample) => {
                let outcome = RequestOutcome::from_evaluation(handle.evaluate(sample));
                match &outcome {
                    RequestOutcome::Prediction(prediction) => {
                        report.predictions += 1;
                        debug!(line = line_no, class = %prediction.class_id, generation = handle.generation(), "sample evaluated");
                    }
                    RequestOutcome::Failure { reason } => {
                        report.evaluation_failures += 1;
                        warn!(line = line_no, generation = handle.generation(), error = %reason, "sample evaluation failed");
                    }
                }
                outcome
            }
            Err(err) => {
                report.input_errors += 1;
                warn!(line = line_no, error = %err, "skipping malformed sample");
                RequestOutcome::failure(err)
            }
        };

        self.presenter.present(&SampleRecord {
            ordinal: self.submitted,
            line: line_no,
            generation: handle.generation(),
            sample: parsed.as_ref().ok(),
            outcome: &outcome,
        })
    }
}

/// Adapts an async reader into a stream of lines without their terminators.
///
/// Bytes that are not valid UTF-8 are replaced with U+FFFD, so such a line
/// reaches the schema as a malformed sample. Only read failures are yielded
/// as errors, and the stream ends after the first one.
pub fn lines<R>(reader: R) -> impl Stream<Item = io::Result<String>>
where
    R: AsyncBufRead + Unpin,
{
    futures::stream::unfold(Some(reader), |state| async move {
        let mut reader = state?;
        let mut buf = Vec::new();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => None,
            Ok(_) => Some((Ok(decode_line(buf)), Some(reader))),
            Err(err) => Some((Err(err), None)),
        }
    })
}

/// Strips a trailing `\n` or `\r\n` and decodes the rest lossily.
fn decode_line(mut buf: Vec<u8>) -> String {
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    match String::from_utf8(buf) {
        Ok(line) => line,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    }
}
