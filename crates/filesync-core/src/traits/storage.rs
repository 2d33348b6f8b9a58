//! Blob store trait for pluggable byte storage backends.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use crate::result::AppResult;

/// A byte stream type used for reading blob contents.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Opaque put/get-by-key byte store.
///
/// Implementations exist for the local filesystem, process memory and
/// S3-compatible object stores. A key, once written, is readable by the
/// same process immediately.
#[async_trait]
pub trait BlobStore: Send + Sync + std::fmt::Debug + 'static {
    /// Return the provider type name (e.g., "local", "s3").
    fn provider_type(&self) -> &str;

    /// Check whether the store is reachable.
    async fn health_check(&self) -> AppResult<bool>;

    /// Store `data` under `key`, replacing any previous object.
    async fn put(&self, key: &str, data: Bytes) -> AppResult<()>;

    /// Open the object stored under `key` as a byte stream.
    async fn get(&self, key: &str) -> AppResult<ByteStream>;

    /// Read the whole object stored under `key` into memory.
    async fn get_bytes(&self, key: &str) -> AppResult<Bytes>;

    /// Whether an object exists under `key`.
    async fn exists(&self, key: &str) -> AppResult<bool>;

    /// Delete the object stored under `key`. Missing keys are not an error.
    async fn delete(&self, key: &str) -> AppResult<()>;
}
