//! The serving side of a session.
//!
//! [`RequestLoop`] reads lines, scores them against the current model and
//! passes each [`RequestOutcome`] to a [`Presenter`].

mod outcome;
mod presenter;
mod request_loop;

pub use outcome::{Prediction, RequestOutcome, SessionReport};
pub use presenter::{JsonPresenter, OutputFormat, Presenter, SampleRecord, TextPresenter};
pub use request_loop::{lines, LoopState, RequestLoop, DEFAULT_EXIT_SENTINEL};
