//! In-process metadata store.
//!
//! Holds every file and version behind one lock, so each write method is
//! atomic with respect to concurrent callers. Used by tests and by
//! `database.url = "memory://"` development setups.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use filesync_core::error::AppError;
use filesync_core::result::AppResult;
use filesync_core::types::pagination::{PageRequest, PageResponse};
use filesync_entity::file::{
    File, FileMetadata, FileVersion, NewUpload, RemoteChange, SYSTEM_DEVICE_ID, base_name,
};

use crate::store::{ConflictResolution, MetadataStore, select_winner};

const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Debug, Default)]
struct Tables {
    files: HashMap<Uuid, File>,
    versions: HashMap<Uuid, Vec<FileVersion>>,
}

impl Tables {
    fn next_version_number(&self, file_id: Uuid) -> i32 {
        self.versions
            .get(&file_id)
            .and_then(|v| v.last())
            .map_or(0, |v| v.version_number)
            + 1
    }

    fn push_version(&mut self, version: FileVersion) {
        self.versions.entry(version.file_id).or_default().push(version);
    }

    fn owned_file_mut(&mut self, file_id: Uuid, owner_id: Uuid) -> AppResult<Option<&mut File>> {
        match self.files.get_mut(&file_id) {
            Some(file) if file.owner_id != owner_id => {
                Err(AppError::not_found(format!("File {file_id} not found")))
            }
            other => Ok(other),
        }
    }
}

/// Metadata store kept entirely in process memory.
#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    tables: RwLock<Tables>,
}

impl MemoryMetadataStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

/// A timestamp that never goes backwards relative to `previous`.
fn monotonic_now(previous: DateTime<Utc>) -> DateTime<Utc> {
    Utc::now().max(previous)
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn find_file(&self, file_id: Uuid) -> AppResult<Option<File>> {
        Ok(self.tables.read().await.files.get(&file_id).cloned())
    }

    async fn latest_version(&self, file_id: Uuid) -> AppResult<Option<FileVersion>> {
        Ok(self
            .tables
            .read()
            .await
            .versions
            .get(&file_id)
            .and_then(|v| v.last())
            .cloned())
    }

    async fn list_versions(&self, file_id: Uuid) -> AppResult<Vec<FileVersion>> {
        Ok(self
            .tables
            .read()
            .await
            .versions
            .get(&file_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn commit_upload(&self, upload: &NewUpload) -> AppResult<(File, FileVersion)> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();

        let file = match tables.owned_file_mut(upload.file_id, upload.owner_id)? {
            Some(file) => {
                file.name = upload.name.clone();
                file.path = upload.path.clone();
                file.storage_key = upload.storage_key.clone();
                file.size_bytes = upload.size_bytes;
                file.content_type = upload.content_type.clone();
                file.updated_at = monotonic_now(file.updated_at);
                file.clone()
            }
            None => {
                let file = File {
                    id: upload.file_id,
                    name: upload.name.clone(),
                    path: upload.path.clone(),
                    storage_key: upload.storage_key.clone(),
                    size_bytes: upload.size_bytes,
                    content_type: upload.content_type.clone(),
                    owner_id: upload.owner_id,
                    created_at: now,
                    updated_at: now,
                };
                tables.files.insert(file.id, file.clone());
                file
            }
        };

        let version = FileVersion {
            id: Uuid::new_v4(),
            file_id: upload.file_id,
            version_number: tables.next_version_number(upload.file_id),
            content_hash: Some(upload.content_hash.clone()),
            size_bytes: upload.size_bytes,
            storage_key: Some(upload.storage_key.clone()),
            origin_device_id: upload.device_id.clone(),
            created_at: now,
            resolved_by: None,
        };
        tables.push_version(version.clone());

        Ok((file, version))
    }

    async fn record_remote_change(&self, change: &RemoteChange) -> AppResult<(File, FileVersion)> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let name = base_name(&change.path).to_string();

        let file = match tables.owned_file_mut(change.file_id, change.owner_id)? {
            Some(file) => {
                file.name = name;
                file.path = change.path.clone();
                file.updated_at = monotonic_now(file.updated_at);
                file.clone()
            }
            None => {
                let file = File {
                    id: change.file_id,
                    name,
                    path: change.path.clone(),
                    storage_key: String::new(),
                    size_bytes: 0,
                    content_type: OCTET_STREAM.to_string(),
                    owner_id: change.owner_id,
                    created_at: now,
                    updated_at: now,
                };
                tables.files.insert(file.id, file.clone());
                file
            }
        };

        let version = FileVersion {
            id: Uuid::new_v4(),
            file_id: change.file_id,
            version_number: tables.next_version_number(change.file_id),
            content_hash: None,
            size_bytes: 0,
            storage_key: None,
            origin_device_id: change.origin_device_id.clone(),
            created_at: now,
            resolved_by: None,
        };
        tables.push_version(version.clone());

        Ok((file, version))
    }

    async fn resolve_conflict(&self, resolution: &ConflictResolution) -> AppResult<FileVersion> {
        let mut tables = self.tables.write().await;
        if !tables.files.contains_key(&resolution.file_id) {
            return Err(AppError::not_found(format!(
                "File {} not found",
                resolution.file_id
            )));
        }

        let versions = tables
            .versions
            .get(&resolution.file_id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let winner = select_winner(versions, resolution)?.clone();

        let resolved = FileVersion {
            id: Uuid::new_v4(),
            file_id: resolution.file_id,
            version_number: tables.next_version_number(resolution.file_id),
            content_hash: winner.content_hash.clone(),
            size_bytes: winner.size_bytes,
            storage_key: winner.storage_key.clone(),
            origin_device_id: SYSTEM_DEVICE_ID.to_string(),
            created_at: Utc::now(),
            resolved_by: None,
        };

        // Validation is complete; nothing below can fail.
        if let Some(versions) = tables.versions.get_mut(&resolution.file_id) {
            for version in versions
                .iter_mut()
                .filter(|v| resolution.losing_version_ids.contains(&v.id))
            {
                version.resolved_by = Some(resolved.id);
            }
        }
        if let (Some(file), Some(storage_key)) = (
            tables.files.get_mut(&resolution.file_id),
            winner.storage_key.as_ref(),
        ) {
            file.storage_key = storage_key.clone();
            file.size_bytes = winner.size_bytes;
            file.updated_at = monotonic_now(file.updated_at);
        }
        tables.push_version(resolved.clone());

        Ok(resolved)
    }

    async fn list_files(
        &self,
        owner_id: Uuid,
        path_prefix: Option<&str>,
        page: &PageRequest,
    ) -> AppResult<PageResponse<FileMetadata>> {
        let tables = self.tables.read().await;
        let prefix = path_prefix.unwrap_or_default();

        let mut files: Vec<&File> = tables
            .files
            .values()
            .filter(|f| f.owner_id == owner_id && f.path.starts_with(prefix))
            .collect();
        files.sort_by(|a, b| a.path.cmp(&b.path).then(a.id.cmp(&b.id)));

        let total = files.len() as u64;
        let items = files
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(page.limit()).unwrap_or(usize::MAX))
            .map(|file| {
                let latest = tables.versions.get(&file.id).and_then(|v| v.last());
                FileMetadata {
                    file: file.clone(),
                    latest_version_id: latest.map(|v| v.id),
                    latest_version_number: latest.map(|v| v.version_number),
                    content_hash: latest.and_then(|v| v.content_hash.clone()),
                }
            })
            .collect();

        Ok(PageResponse::new(items, page, total))
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}
