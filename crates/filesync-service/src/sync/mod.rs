//! Sync coordinator: device state classification, version history,
//! conflict resolution and watch sessions.

pub mod classify;
pub mod coordinator;
pub mod watch;

pub use classify::classify_sync;
pub use coordinator::SyncCoordinator;
pub use watch::WatchRequest;
