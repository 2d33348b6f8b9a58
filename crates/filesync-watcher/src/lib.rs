//! # filesync-watcher
//!
//! Filesystem watch sessions for FileSync. A session owns the set of roots it
//! watches, turns raw `notify` events into [`ChangeEvent`]s and hands them to
//! the change bus.
//!
//! [`ChangeEvent`]: filesync_core::events::ChangeEvent

pub mod classify;
pub mod paths;
pub mod session;

pub use classify::{EventTranslator, classify, is_hidden, stable_file_id};
pub use paths::WatchPaths;
pub use session::WatchSession;
