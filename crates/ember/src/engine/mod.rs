//! # Reload Engine
//!
//! The engine keeps exactly one model published while the file underneath
//! it changes.
//!
//! * [`coordinator`] - the [`ReloadCoordinator`] owns the atomic model slot.
//!   Reads are lock-free snapshots; reloads are serialized and a failed
//!   reload never touches the slot.
//!
//! * [`scheduler`] - the [`ReloadScheduler`] turns bursts of reload triggers
//!   into debounced, one-at-a-time reloads on a background task.
//!
//! * [`worker`] - [`WorkerHandle`] spawns, wakes and gracefully shuts down
//!   the session's background tasks.
//!
//! Components only talk to each other through a [`ReloadSignal`] (to ask for
//! a reload) and the coordinator's published handle (to read the result).
pub mod coordinator;
pub mod scheduler;
pub mod worker;

pub use coordinator::{ReloadCoordinator, ReloadOutcome};
pub use scheduler::{ReloadScheduler, ReloadSignal, DEFAULT_DEBOUNCE};
pub use worker::WorkerHandle;
