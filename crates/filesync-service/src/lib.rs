//! # filesync-service
//!
//! Business logic for FileSync: the upload/download pipeline, file metadata
//! queries and the sync coordinator that classifies device state, records
//! conflict resolutions and runs watch sessions.
//!
//! Services follow constructor injection. All dependencies are provided at
//! construction time via `Arc` references.

pub mod context;
pub mod file;
pub mod sync;

pub use context::RequestContext;
pub use file::{DownloadService, FileService, UploadService};
pub use sync::{SyncCoordinator, WatchRequest};
