//! File repository implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use filesync_core::error::{AppError, ErrorKind};
use filesync_core::result::AppResult;
use filesync_core::types::pagination::{PageRequest, PageResponse};
use filesync_entity::file::{
    File, FileMetadata, FileVersion, NewUpload, RemoteChange, SYSTEM_DEVICE_ID, base_name,
};

use crate::store::{ConflictResolution, MetadataStore, like_prefix, select_winner};

/// PostgreSQL-backed metadata store for files and versions.
#[derive(Debug, Clone)]
pub struct FileRepository {
    pool: PgPool,
}

impl FileRepository {
    /// Create a new file repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn persistence(message: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| AppError::with_source(ErrorKind::Persistence, message, e)
}

const NEXT_VERSION_SQL: &str =
    "SELECT COALESCE(MAX(version_number), 0) + 1 FROM file_versions WHERE file_id = $1";

#[async_trait]
impl MetadataStore for FileRepository {
    async fn find_file(&self, file_id: Uuid) -> AppResult<Option<File>> {
        sqlx::query_as::<_, File>("SELECT * FROM files WHERE id = $1")
            .bind(file_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(persistence("Failed to find file"))
    }

    async fn latest_version(&self, file_id: Uuid) -> AppResult<Option<FileVersion>> {
        sqlx::query_as::<_, FileVersion>(
            "SELECT * FROM file_versions WHERE file_id = $1 \
             ORDER BY version_number DESC LIMIT 1",
        )
        .bind(file_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(persistence("Failed to find latest version"))
    }

    async fn list_versions(&self, file_id: Uuid) -> AppResult<Vec<FileVersion>> {
        sqlx::query_as::<_, FileVersion>(
            "SELECT * FROM file_versions WHERE file_id = $1 ORDER BY version_number ASC",
        )
        .bind(file_id)
        .fetch_all(&self.pool)
        .await
        .map_err(persistence("Failed to list versions"))
    }

    async fn commit_upload(&self, upload: &NewUpload) -> AppResult<(File, FileVersion)> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(persistence("Failed to begin upload transaction"))?;

        // The upsert row-locks an existing file, serializing version numbering.
        let file = sqlx::query_as::<_, File>(
            "INSERT INTO files (id, name, path, storage_key, size_bytes, content_type, owner_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, path = EXCLUDED.path, \
             storage_key = EXCLUDED.storage_key, size_bytes = EXCLUDED.size_bytes, \
             content_type = EXCLUDED.content_type, updated_at = NOW() \
             WHERE files.owner_id = EXCLUDED.owner_id \
             RETURNING *",
        )
        .bind(upload.file_id)
        .bind(&upload.name)
        .bind(&upload.path)
        .bind(&upload.storage_key)
        .bind(upload.size_bytes)
        .bind(&upload.content_type)
        .bind(upload.owner_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(persistence("Failed to upsert file"))?
        .ok_or_else(|| AppError::not_found(format!("File {} not found", upload.file_id)))?;

        let version_number: i32 = sqlx::query_scalar(NEXT_VERSION_SQL)
            .bind(upload.file_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(persistence("Failed to allocate version number"))?;

        let version = sqlx::query_as::<_, FileVersion>(
            "INSERT INTO file_versions \
             (id, file_id, version_number, content_hash, size_bytes, storage_key, origin_device_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(upload.file_id)
        .bind(version_number)
        .bind(&upload.content_hash)
        .bind(upload.size_bytes)
        .bind(&upload.storage_key)
        .bind(&upload.device_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(persistence("Failed to insert file version"))?;

        tx.commit()
            .await
            .map_err(persistence("Failed to commit upload transaction"))?;

        debug!(
            file_id = %file.id,
            version_number = version.version_number,
            "Committed upload"
        );
        Ok((file, version))
    }

    async fn record_remote_change(&self, change: &RemoteChange) -> AppResult<(File, FileVersion)> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(persistence("Failed to begin remote change transaction"))?;

        let file = sqlx::query_as::<_, File>(
            "INSERT INTO files (id, name, path, owner_id) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, path = EXCLUDED.path, \
             updated_at = NOW() \
             WHERE files.owner_id = EXCLUDED.owner_id \
             RETURNING *",
        )
        .bind(change.file_id)
        .bind(base_name(&change.path))
        .bind(&change.path)
        .bind(change.owner_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(persistence("Failed to upsert file"))?
        .ok_or_else(|| AppError::not_found(format!("File {} not found", change.file_id)))?;

        let version_number: i32 = sqlx::query_scalar(NEXT_VERSION_SQL)
            .bind(change.file_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(persistence("Failed to allocate version number"))?;

        let version = sqlx::query_as::<_, FileVersion>(
            "INSERT INTO file_versions (id, file_id, version_number, origin_device_id) \
             VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(change.file_id)
        .bind(version_number)
        .bind(&change.origin_device_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(persistence("Failed to insert stub version"))?;

        tx.commit()
            .await
            .map_err(persistence("Failed to commit remote change transaction"))?;

        Ok((file, version))
    }

    async fn resolve_conflict(&self, resolution: &ConflictResolution) -> AppResult<FileVersion> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(persistence("Failed to begin resolution transaction"))?;

        sqlx::query_scalar::<_, Uuid>("SELECT id FROM files WHERE id = $1 FOR UPDATE")
            .bind(resolution.file_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(persistence("Failed to lock file"))?
            .ok_or_else(|| AppError::not_found(format!("File {} not found", resolution.file_id)))?;

        let versions = sqlx::query_as::<_, FileVersion>(
            "SELECT * FROM file_versions WHERE file_id = $1 ORDER BY version_number ASC",
        )
        .bind(resolution.file_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(persistence("Failed to load versions"))?;

        let winner = select_winner(&versions, resolution)?.clone();
        let version_number = versions.last().map_or(0, |v| v.version_number) + 1;

        let resolved = sqlx::query_as::<_, FileVersion>(
            "INSERT INTO file_versions \
             (id, file_id, version_number, content_hash, size_bytes, storage_key, origin_device_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(resolution.file_id)
        .bind(version_number)
        .bind(&winner.content_hash)
        .bind(winner.size_bytes)
        .bind(&winner.storage_key)
        .bind(SYSTEM_DEVICE_ID)
        .fetch_one(&mut *tx)
        .await
        .map_err(persistence("Failed to insert resolving version"))?;

        if let Some(storage_key) = &winner.storage_key {
            sqlx::query(
                "UPDATE files SET storage_key = $2, size_bytes = $3, updated_at = NOW() \
                 WHERE id = $1",
            )
            .bind(resolution.file_id)
            .bind(storage_key)
            .bind(winner.size_bytes)
            .execute(&mut *tx)
            .await
            .map_err(persistence("Failed to update canonical copy"))?;
        }

        let marked = sqlx::query(
            "UPDATE file_versions SET resolved_by = $1 WHERE file_id = $2 AND id = ANY($3)",
        )
        .bind(resolved.id)
        .bind(resolution.file_id)
        .bind(&resolution.losing_version_ids)
        .execute(&mut *tx)
        .await
        .map_err(persistence("Failed to mark losing versions"))?
        .rows_affected();

        let expected = resolution
            .losing_version_ids
            .iter()
            .collect::<std::collections::HashSet<_>>()
            .len() as u64;
        if marked != expected {
            // Dropping the transaction rolls back the resolving version.
            return Err(AppError::persistence(format!(
                "Marked {marked} of {expected} losing versions"
            )));
        }

        tx.commit()
            .await
            .map_err(persistence("Failed to commit resolution transaction"))?;

        Ok(resolved)
    }

    async fn list_files(
        &self,
        owner_id: Uuid,
        path_prefix: Option<&str>,
        page: &PageRequest,
    ) -> AppResult<PageResponse<FileMetadata>> {
        let pattern = path_prefix.filter(|p| !p.is_empty()).map(like_prefix);

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM files \
             WHERE owner_id = $1 AND ($2::text IS NULL OR path LIKE $2)",
        )
        .bind(owner_id)
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await
        .map_err(persistence("Failed to count files"))?;

        let files = sqlx::query_as::<_, File>(
            "SELECT * FROM files \
             WHERE owner_id = $1 AND ($2::text IS NULL OR path LIKE $2) \
             ORDER BY path ASC, id ASC LIMIT $3 OFFSET $4",
        )
        .bind(owner_id)
        .bind(&pattern)
        .bind(i64::try_from(page.limit()).unwrap_or(i64::MAX))
        .bind(i64::try_from(page.offset()).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(persistence("Failed to list files"))?;

        let ids: Vec<Uuid> = files.iter().map(|f| f.id).collect();
        let mut latest: HashMap<Uuid, FileVersion> = sqlx::query_as::<_, FileVersion>(
            "SELECT DISTINCT ON (file_id) * FROM file_versions \
             WHERE file_id = ANY($1) ORDER BY file_id, version_number DESC",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(persistence("Failed to load latest versions"))?
        .into_iter()
        .map(|v| (v.file_id, v))
        .collect();

        let items = files
            .into_iter()
            .map(|file| {
                let version = latest.remove(&file.id);
                FileMetadata {
                    latest_version_id: version.as_ref().map(|v| v.id),
                    latest_version_number: version.as_ref().map(|v| v.version_number),
                    content_hash: version.and_then(|v| v.content_hash),
                    file,
                }
            })
            .collect();

        Ok(PageResponse::new(items, page, total.max(0) as u64))
    }

    async fn health_check(&self) -> AppResult<bool> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|v| v == 1)
            .map_err(persistence("Metadata store health check failed"))
    }
}
