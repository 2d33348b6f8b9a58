//! File domain entities.

pub mod metadata;
pub mod model;
pub mod version;

pub use metadata::FileMetadata;
pub use model::{File, NewUpload, RemoteChange, base_name};
pub use version::{FileVersion, SYSTEM_DEVICE_ID};
