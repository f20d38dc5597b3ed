//! Change detection for the model file.
//!
//! [`ModelWatcher`] turns file system events into reload triggers. It only
//! requests reloads; loading and publishing stay with the
//! [`ReloadCoordinator`](crate::engine::ReloadCoordinator).

mod identity;
mod watcher;

pub use identity::is_same_file;
pub use watcher::ModelWatcher;
