//! The metadata store contract shared by the PostgreSQL and in-memory
//! implementations.

use std::collections::HashSet;

use async_trait::async_trait;
use uuid::Uuid;

use filesync_core::error::AppError;
use filesync_core::result::AppResult;
use filesync_core::types::pagination::{PageRequest, PageResponse};
use filesync_entity::file::{File, FileMetadata, FileVersion, NewUpload, RemoteChange};

/// A caller's conflict resolution decision.
#[derive(Debug, Clone)]
pub struct ConflictResolution {
    /// The file being resolved.
    pub file_id: Uuid,
    /// Versions that lose and get `resolved_by` set.
    pub losing_version_ids: Vec<Uuid>,
    /// Version whose content the resolving version carries. Defaults to the
    /// most recent version not listed as losing.
    pub winning_version_id: Option<Uuid>,
}

/// Transactional record store for files and their versions.
///
/// Every method that writes more than one row does so atomically: either all
/// rows become visible or none do.
#[async_trait]
pub trait MetadataStore: Send + Sync + std::fmt::Debug + 'static {
    /// Find a file by id.
    async fn find_file(&self, file_id: Uuid) -> AppResult<Option<File>>;

    /// The version with the greatest version number, if any.
    async fn latest_version(&self, file_id: Uuid) -> AppResult<Option<FileVersion>>;

    /// All versions of a file in chronological order.
    async fn list_versions(&self, file_id: Uuid) -> AppResult<Vec<FileVersion>>;

    /// Upsert the file row and append a new version numbered `max + 1`.
    ///
    /// Uploading to a file id owned by another user fails with `NotFound`.
    async fn commit_upload(&self, upload: &NewUpload) -> AppResult<(File, FileVersion)>;

    /// Append a contentless version recording that a peer changed the file,
    /// creating the file row if it does not exist yet.
    async fn record_remote_change(&self, change: &RemoteChange) -> AppResult<(File, FileVersion)>;

    /// Append a system-originated resolving version and mark every losing
    /// version as resolved by it.
    async fn resolve_conflict(&self, resolution: &ConflictResolution) -> AppResult<FileVersion>;

    /// Page through an owner's files, optionally restricted to a path prefix.
    async fn list_files(
        &self,
        owner_id: Uuid,
        path_prefix: Option<&str>,
        page: &PageRequest,
    ) -> AppResult<PageResponse<FileMetadata>>;

    /// Check store connectivity.
    async fn health_check(&self) -> AppResult<bool>;
}

/// Validate a resolution against a file's versions and pick the winner.
///
/// `versions` must be in chronological order.
pub fn select_winner<'a>(
    versions: &'a [FileVersion],
    resolution: &ConflictResolution,
) -> AppResult<&'a FileVersion> {
    if resolution.losing_version_ids.is_empty() {
        return Err(AppError::validation("At least one losing version is required"));
    }

    let known: HashSet<Uuid> = versions.iter().map(|v| v.id).collect();
    let losing: HashSet<Uuid> = resolution.losing_version_ids.iter().copied().collect();
    if let Some(missing) = losing.iter().find(|id| !known.contains(id)) {
        return Err(AppError::not_found(format!(
            "Version {missing} does not belong to file {}",
            resolution.file_id
        )));
    }

    match resolution.winning_version_id {
        Some(winner_id) => {
            if losing.contains(&winner_id) {
                return Err(AppError::validation(
                    "The winning version cannot also be a losing version",
                ));
            }
            versions
                .iter()
                .find(|v| v.id == winner_id)
                .ok_or_else(|| {
                    AppError::not_found(format!(
                        "Version {winner_id} does not belong to file {}",
                        resolution.file_id
                    ))
                })
        }
        // With every version losing, the newest one still carries the content.
        None => versions
            .iter()
            .rev()
            .find(|v| !losing.contains(&v.id))
            .or_else(|| versions.last())
            .ok_or_else(|| {
                AppError::not_found(format!("File {} has no versions", resolution.file_id))
            }),
    }
}

/// Hand-built prefix match used by [`MetadataStore::list_files`].
pub(crate) fn like_prefix(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use filesync_core::error::ErrorKind;

    fn version(file_id: Uuid, number: i32) -> FileVersion {
        FileVersion {
            id: Uuid::new_v4(),
            file_id,
            version_number: number,
            content_hash: Some(format!("hash-{number}")),
            size_bytes: 1,
            storage_key: Some(format!("key-{number}")),
            origin_device_id: "dev".to_string(),
            created_at: Utc::now(),
            resolved_by: None,
        }
    }

    fn history() -> (Uuid, Vec<FileVersion>) {
        let file_id = Uuid::new_v4();
        let versions = (1..=3).map(|n| version(file_id, n)).collect();
        (file_id, versions)
    }

    #[test]
    fn test_default_winner_is_latest_non_losing() {
        let (file_id, versions) = history();
        let resolution = ConflictResolution {
            file_id,
            losing_version_ids: vec![versions[2].id],
            winning_version_id: None,
        };
        let winner = select_winner(&versions, &resolution).expect("winner");
        assert_eq!(winner.id, versions[1].id);
    }

    #[test]
    fn test_explicit_winner() {
        let (file_id, versions) = history();
        let resolution = ConflictResolution {
            file_id,
            losing_version_ids: vec![versions[1].id, versions[2].id],
            winning_version_id: Some(versions[0].id),
        };
        let winner = select_winner(&versions, &resolution).expect("winner");
        assert_eq!(winner.version_number, 1);
    }

    #[test]
    fn test_foreign_losing_version_is_not_found() {
        let (file_id, versions) = history();
        let resolution = ConflictResolution {
            file_id,
            losing_version_ids: vec![Uuid::new_v4()],
            winning_version_id: None,
        };
        let err = select_winner(&versions, &resolution).expect_err("foreign id");
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn test_all_losing_falls_back_to_newest() {
        let (file_id, versions) = history();
        let resolution = ConflictResolution {
            file_id,
            losing_version_ids: versions.iter().map(|v| v.id).collect(),
            winning_version_id: None,
        };
        let winner = select_winner(&versions, &resolution).expect("newest wins");
        assert_eq!(winner.id, versions[2].id);

        let empty = ConflictResolution {
            file_id,
            losing_version_ids: Vec::new(),
            winning_version_id: None,
        };
        let err = select_winner(&versions, &empty).expect_err("empty list");
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[test]
    fn test_like_prefix_escapes_wildcards() {
        assert_eq!(like_prefix("docs/"), "docs/%");
        assert_eq!(like_prefix("100%_done"), "100\\%\\_done%");
    }
}
