//! Read-only file metadata queries.

use std::sync::Arc;

use uuid::Uuid;

use filesync_core::error::AppError;
use filesync_core::result::AppResult;
use filesync_core::types::pagination::{PageRequest, PageResponse};
use filesync_database::MetadataStore;
use filesync_entity::file::FileMetadata;

use crate::context::RequestContext;

/// Metadata lookups and listings scoped to the calling user.
#[derive(Debug, Clone)]
pub struct FileService {
    /// Metadata store.
    store: Arc<dyn MetadataStore>,
}

impl FileService {
    /// Creates a new file service.
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self { store }
    }

    /// A file joined with its latest version.
    pub async fn get_metadata(&self, ctx: &RequestContext, file_id: Uuid) -> AppResult<FileMetadata> {
        let file = self
            .store
            .find_file(file_id)
            .await?
            .filter(|file| ctx.owns(file.owner_id))
            .ok_or_else(|| AppError::not_found(format!("File {file_id} not found")))?;

        let latest = self.store.latest_version(file_id).await?;
        Ok(FileMetadata {
            file,
            latest_version_id: latest.as_ref().map(|v| v.id),
            latest_version_number: latest.as_ref().map(|v| v.version_number),
            content_hash: latest.and_then(|v| v.content_hash),
        })
    }

    /// Page through the caller's files, optionally under a path prefix.
    pub async fn list_files(
        &self,
        ctx: &RequestContext,
        folder: Option<&str>,
        page: PageRequest,
    ) -> AppResult<PageResponse<FileMetadata>> {
        let prefix = folder.map(str::trim).filter(|p| !p.is_empty());
        self.store.list_files(ctx.user_id, prefix, &page).await
    }
}
