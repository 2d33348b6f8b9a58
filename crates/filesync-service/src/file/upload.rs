//! File upload service: turns a stream of frames into a stored, versioned file.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use filesync_core::config::StorageConfig;
use filesync_core::error::{AppError, ErrorKind};
use filesync_core::result::AppResult;
use filesync_core::traits::storage::BlobStore;
use filesync_database::MetadataStore;
use filesync_entity::file::{File, FileVersion, NewUpload, base_name};
use filesync_storage::storage_key;

use super::sniff::sniff_content_type;
use crate::context::RequestContext;

/// Metadata carried by the first frame of an upload.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UploadMetadata {
    /// Existing file to add a version to. A new id is generated when absent.
    pub file_id: Option<Uuid>,
    /// Logical client path of the file.
    pub file_name: String,
    /// The uploading device.
    pub device_id: String,
}

/// One message of an upload stream.
#[derive(Debug, Clone)]
pub struct UploadFrame {
    /// Present on the first frame. Ignored on later frames.
    pub metadata: Option<UploadMetadata>,
    /// Content bytes, possibly empty.
    pub data: Bytes,
}

impl UploadFrame {
    /// The opening frame.
    pub fn metadata(metadata: UploadMetadata) -> Self {
        Self {
            metadata: Some(metadata),
            data: Bytes::new(),
        }
    }

    /// A content frame.
    pub fn chunk(data: impl Into<Bytes>) -> Self {
        Self {
            metadata: None,
            data: data.into(),
        }
    }
}

/// The committed file and its new version.
#[derive(Debug, Clone)]
pub struct UploadResult {
    /// The file after the upsert.
    pub file: File,
    /// The version created by this upload.
    pub version: FileVersion,
}

/// Receives uploads, stores their bytes and commits file metadata.
#[derive(Clone)]
pub struct UploadService {
    /// Metadata store.
    store: Arc<dyn MetadataStore>,
    /// Blob store.
    blobs: Arc<dyn BlobStore>,
    /// Storage configuration.
    config: StorageConfig,
}

impl std::fmt::Debug for UploadService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadService")
            .field("blobs", &self.blobs.provider_type())
            .field("max_upload_size_bytes", &self.config.max_upload_size_bytes)
            .finish()
    }
}

impl UploadService {
    /// Creates a new upload service.
    pub fn new(
        store: Arc<dyn MetadataStore>,
        blobs: Arc<dyn BlobStore>,
        config: StorageConfig,
    ) -> Self {
        Self {
            store,
            blobs,
            config,
        }
    }

    /// Consume an upload stream and commit it as a new file version.
    ///
    /// The first frame must carry metadata. Bytes are hashed and buffered in
    /// arrival order. Receive failures surface as `Transport`, blob writes as
    /// `Storage` (nothing is committed) and commit failures as `Persistence`.
    pub async fn upload<S, E>(&self, ctx: &RequestContext, frames: S) -> AppResult<UploadResult>
    where
        S: Stream<Item = Result<UploadFrame, E>> + Send,
        E: std::error::Error + Send + Sync + 'static,
    {
        let mut frames = std::pin::pin!(frames);

        let first = next_frame(&mut frames)
            .await?
            .ok_or_else(|| AppError::validation("Upload stream ended before any metadata"))?;
        let metadata = first
            .metadata
            .ok_or_else(|| AppError::validation("The first upload frame must carry metadata"))?;
        self.validate_metadata(ctx, &metadata).await?;

        let mut hasher = Sha256::new();
        let mut buffer = BytesMut::new();
        let mut chunk = first.data;
        loop {
            if !chunk.is_empty() {
                let total = (buffer.len() + chunk.len()) as u64;
                if total > self.config.max_upload_size_bytes {
                    return Err(AppError::validation(format!(
                        "File exceeds maximum upload size of {} bytes",
                        self.config.max_upload_size_bytes
                    )));
                }
                hasher.update(&chunk);
                buffer.extend_from_slice(&chunk);
            }
            match next_frame(&mut frames).await? {
                Some(frame) => chunk = frame.data,
                None => break,
            }
        }

        let data = buffer.freeze();
        let content_hash = format!("{:x}", hasher.finalize());
        let content_type = sniff_content_type(&data).to_string();
        let file_id = metadata.file_id.unwrap_or_else(Uuid::new_v4);
        let key = storage_key(
            ctx.user_id,
            &metadata.device_id,
            &metadata.file_name,
            &content_hash,
        );
        let size_bytes = data.len() as i64;

        debug!(file_id = %file_id, key = %key, size = size_bytes, "Writing upload to blob store");
        self.blobs.put(&key, data).await.map_err(into_storage)?;

        let upload = NewUpload {
            file_id,
            name: base_name(&metadata.file_name).to_string(),
            path: metadata.file_name.clone(),
            storage_key: key,
            size_bytes,
            content_type,
            content_hash,
            owner_id: ctx.user_id,
            device_id: metadata.device_id.clone(),
        };
        let (file, version) = self.store.commit_upload(&upload).await?;

        info!(
            user_id = %ctx.user_id,
            file_id = %file.id,
            version = version.version_number,
            device_id = %version.origin_device_id,
            size = file.size_bytes,
            "Upload committed"
        );

        Ok(UploadResult { file, version })
    }

    async fn validate_metadata(&self, ctx: &RequestContext, metadata: &UploadMetadata) -> AppResult<()> {
        if metadata.file_name.trim().is_empty() || base_name(&metadata.file_name).is_empty() {
            return Err(AppError::validation("file_name must not be empty"));
        }
        if metadata.device_id.trim().is_empty() {
            return Err(AppError::validation("device_id must not be empty"));
        }
        if let Some(file_id) = metadata.file_id {
            let existing = self.store.find_file(file_id).await?;
            if existing.is_some_and(|file| !ctx.owns(file.owner_id)) {
                return Err(AppError::not_found(format!("File {file_id} not found")));
            }
        }
        Ok(())
    }
}

async fn next_frame<S, E>(frames: &mut std::pin::Pin<&mut S>) -> AppResult<Option<UploadFrame>>
where
    S: Stream<Item = Result<UploadFrame, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    match frames.next().await {
        Some(Ok(frame)) => Ok(Some(frame)),
        Some(Err(e)) => Err(AppError::with_source(
            ErrorKind::Transport,
            format!("Failed to receive upload chunk: {e}"),
            e,
        )),
        None => Ok(None),
    }
}

/// Blob store failures on the upload path are always reported as storage errors.
fn into_storage(e: AppError) -> AppError {
    if e.kind == ErrorKind::Storage {
        e
    } else {
        AppError::storage(format!("Blob store write failed: {e}"))
    }
}
