//! In-memory blob store.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use filesync_core::error::AppError;
use filesync_core::result::AppResult;
use filesync_core::traits::storage::{BlobStore, ByteStream};

/// Blob store kept in process memory, for tests and development.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: DashMap<String, Bytes>,
}

impl MemoryBlobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the store holds no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn lookup(&self, key: &str) -> AppResult<Bytes> {
        self.objects
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::not_found(format!("Blob not found: {key}")))
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn provider_type(&self) -> &str {
        "memory"
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }

    async fn put(&self, key: &str, data: Bytes) -> AppResult<()> {
        self.objects.insert(key.to_string(), data);
        Ok(())
    }

    async fn get(&self, key: &str) -> AppResult<ByteStream> {
        let data = self.lookup(key)?;
        Ok(Box::pin(futures::stream::once(async move { Ok(data) })))
    }

    async fn get_bytes(&self, key: &str) -> AppResult<Bytes> {
        self.lookup(key)
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        Ok(self.objects.contains_key(key))
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.objects.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filesync_core::error::ErrorKind;

    #[tokio::test]
    async fn test_roundtrip_and_missing() {
        let store = MemoryBlobStore::new();
        store.put("a", Bytes::from_static(b"abc")).await.unwrap();
        assert_eq!(store.get_bytes("a").await.unwrap(), Bytes::from_static(b"abc"));
        assert_eq!(store.len(), 1);

        store.delete("a").await.unwrap();
        let err = store.get_bytes("a").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert!(store.is_empty());
    }
}
