//! File download service: streams a file's latest content in fixed-size chunks.

use std::pin::Pin;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use tracing::info;
use uuid::Uuid;

use filesync_core::config::SyncConfig;
use filesync_core::error::{AppError, ErrorKind};
use filesync_core::result::AppResult;
use filesync_core::traits::storage::{BlobStore, ByteStream};
use filesync_database::MetadataStore;
use filesync_entity::file::{File, FileVersion};

use crate::context::RequestContext;

/// Ordered content chunks. A `Storage` error item ends the stream.
pub type ChunkStream = Pin<Box<dyn Stream<Item = AppResult<Bytes>> + Send>>;

/// A download ready to be streamed.
pub struct DownloadResult {
    /// File metadata.
    pub file: File,
    /// The version being served.
    pub version: FileVersion,
    /// Content chunks of `chunk_size` bytes; the last one may be shorter.
    pub chunks: ChunkStream,
}

impl std::fmt::Debug for DownloadResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadResult")
            .field("file", &self.file.id)
            .field("version", &self.version.version_number)
            .finish()
    }
}

/// Serves the latest stored content of a file.
#[derive(Clone)]
pub struct DownloadService {
    /// Metadata store.
    store: Arc<dyn MetadataStore>,
    /// Blob store.
    blobs: Arc<dyn BlobStore>,
    /// Size of each streamed chunk.
    chunk_size: usize,
}

impl std::fmt::Debug for DownloadService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadService")
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

impl DownloadService {
    /// Creates a new download service.
    pub fn new(store: Arc<dyn MetadataStore>, blobs: Arc<dyn BlobStore>, config: &SyncConfig) -> Self {
        Self {
            store,
            blobs,
            chunk_size: config.download_chunk_size_bytes.max(1),
        }
    }

    /// Open the latest version of `file_id` for streaming.
    ///
    /// Fails with `NotFound` when the file is missing, owned by someone else,
    /// has no versions, or its latest version is a contentless stub.
    pub async fn download(&self, ctx: &RequestContext, file_id: Uuid) -> AppResult<DownloadResult> {
        let file = self
            .store
            .find_file(file_id)
            .await?
            .filter(|file| ctx.owns(file.owner_id))
            .ok_or_else(|| AppError::not_found(format!("File {file_id} not found")))?;

        let version = self
            .store
            .latest_version(file_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("File {file_id} has no versions")))?;

        let key = match (&version.storage_key, version.has_content()) {
            (Some(key), true) => key.clone(),
            _ => {
                return Err(AppError::not_found(format!(
                    "Latest version of file {file_id} has no stored content"
                )));
            }
        };

        let inner = self.blobs.get(&key).await.map_err(|e| {
            if e.kind == ErrorKind::Storage {
                e
            } else {
                AppError::storage(format!("Blob store read failed: {e}"))
            }
        })?;

        info!(
            user_id = %ctx.user_id,
            file_id = %file_id,
            version = version.version_number,
            "Download started"
        );

        Ok(DownloadResult {
            file,
            version,
            chunks: rechunk(inner, self.chunk_size),
        })
    }
}

struct Rechunker {
    inner: ByteStream,
    buffer: BytesMut,
    done: bool,
}

/// Regroup a blob byte stream into `chunk_size` pieces, preserving order.
///
/// A read error is yielded once as `Storage` and ends the stream.
pub(crate) fn rechunk(inner: ByteStream, chunk_size: usize) -> ChunkStream {
    let state = Rechunker {
        inner,
        buffer: BytesMut::new(),
        done: false,
    };

    Box::pin(futures::stream::unfold(state, move |mut state| async move {
        loop {
            if state.buffer.len() >= chunk_size {
                let chunk = state.buffer.split_to(chunk_size).freeze();
                return Some((Ok(chunk), state));
            }
            if state.done {
                if state.buffer.is_empty() {
                    return None;
                }
                let chunk = state.buffer.split().freeze();
                return Some((Ok(chunk), state));
            }
            match state.inner.next().await {
                Some(Ok(bytes)) => state.buffer.extend_from_slice(&bytes),
                Some(Err(e)) => {
                    state.done = true;
                    state.buffer.clear();
                    let err = AppError::with_source(
                        ErrorKind::Storage,
                        format!("Blob read failed mid-stream: {e}"),
                        e,
                    );
                    return Some((Err(err), state));
                }
                None => state.done = true,
            }
        }
    }))
}
