//! Construct the configured blob store.

use std::sync::Arc;

use tracing::info;

use filesync_core::config::{StorageConfig, StorageProviderKind};
use filesync_core::result::AppResult;
use filesync_core::traits::storage::BlobStore;

use crate::providers::{LocalBlobStore, MemoryBlobStore};

/// Build the blob store selected by `storage.provider`.
pub async fn build_blob_store(config: &StorageConfig) -> AppResult<Arc<dyn BlobStore>> {
    let store: Arc<dyn BlobStore> = match config.provider {
        StorageProviderKind::Local => {
            Arc::new(LocalBlobStore::new(&config.local.root_path).await?)
        }
        StorageProviderKind::Memory => Arc::new(MemoryBlobStore::new()),
        #[cfg(feature = "s3")]
        StorageProviderKind::S3 => Arc::new(crate::providers::S3BlobStore::new(&config.s3).await?),
        #[cfg(not(feature = "s3"))]
        StorageProviderKind::S3 => {
            return Err(filesync_core::AppError::configuration(
                "storage.provider = s3 requires building with the `s3` feature",
            ));
        }
    };

    info!(provider = store.provider_type(), "Blob store ready");
    Ok(store)
}
