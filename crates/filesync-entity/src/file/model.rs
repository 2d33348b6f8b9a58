//! File entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One logical synchronized file, owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct File {
    /// Stable file identifier, assigned at first creation.
    pub id: Uuid,
    /// The file name (base name of `path`).
    pub name: String,
    /// Logical path supplied by the client.
    pub path: String,
    /// Blob store key of the current canonical copy.
    pub storage_key: String,
    /// Size in bytes of the current canonical copy.
    pub size_bytes: i64,
    /// Sniffed MIME type.
    pub content_type: String,
    /// The owning user.
    pub owner_id: Uuid,
    /// When the file was created.
    pub created_at: DateTime<Utc>,
    /// When the file was last updated.
    pub updated_at: DateTime<Utc>,
}

impl File {
    /// Get the file extension (lowercase), if any.
    pub fn extension(&self) -> Option<String> {
        self.name
            .rsplit('.')
            .next()
            .filter(|ext| *ext != self.name)
            .map(|ext| ext.to_lowercase())
    }
}

/// Everything needed to commit an uploaded file and its new version.
#[derive(Debug, Clone)]
pub struct NewUpload {
    /// Target file id (new or existing).
    pub file_id: Uuid,
    /// Base name of the file.
    pub name: String,
    /// Logical client path.
    pub path: String,
    /// Blob store key the bytes were written under.
    pub storage_key: String,
    /// Size in bytes.
    pub size_bytes: i64,
    /// Sniffed MIME type.
    pub content_type: String,
    /// Hex-encoded SHA-256 of the content.
    pub content_hash: String,
    /// The uploading user.
    pub owner_id: Uuid,
    /// The uploading device.
    pub device_id: String,
}

/// A change reported by another device, recorded without content.
#[derive(Debug, Clone)]
pub struct RemoteChange {
    /// The changed file.
    pub file_id: Uuid,
    /// Path reported by the origin device.
    pub path: String,
    /// Owner of the file.
    pub owner_id: Uuid,
    /// Device that made the change.
    pub origin_device_id: String,
}

/// Base name of a slash-separated logical path.
pub fn base_name(path: &str) -> &str {
    path.trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("docs/report.txt"), "report.txt");
        assert_eq!(base_name("report.txt"), "report.txt");
        assert_eq!(base_name("C:\\work\\plan.md"), "plan.md");
        assert_eq!(base_name("docs/"), "docs");
    }
}
