//! # filesync-storage
//!
//! Blob store implementations for FileSync: local filesystem, process
//! memory, and S3-compatible object stores (behind the `s3` feature).

pub mod factory;
pub mod key;
pub mod providers;

pub use factory::build_blob_store;
pub use key::storage_key;
pub use providers::{LocalBlobStore, MemoryBlobStore};
