//! File version entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Origin device recorded on versions created by conflict resolution.
pub const SYSTEM_DEVICE_ID: &str = "system";

/// One committed snapshot of a file's content.
///
/// Versions are append-only. The only field ever updated after insert is
/// `resolved_by`, set when conflict resolution supersedes the version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct FileVersion {
    /// Unique version identifier.
    pub id: Uuid,
    /// The file this version belongs to.
    pub file_id: Uuid,
    /// Sequential version number, unique and increasing per file.
    pub version_number: i32,
    /// Hex-encoded SHA-256 of the content. `None` for remote-change stubs.
    pub content_hash: Option<String>,
    /// Size in bytes.
    pub size_bytes: i64,
    /// Blob store key of this version's bytes. `None` for remote-change stubs.
    pub storage_key: Option<String>,
    /// Device that produced this version.
    pub origin_device_id: String,
    /// When this version was created.
    pub created_at: DateTime<Utc>,
    /// The version that superseded this one after conflict resolution.
    pub resolved_by: Option<Uuid>,
}

impl FileVersion {
    /// Whether this version carries stored content.
    pub fn has_content(&self) -> bool {
        self.content_hash.is_some() && self.storage_key.is_some()
    }

    /// Whether conflict resolution has superseded this version.
    pub fn is_resolved(&self) -> bool {
        self.resolved_by.is_some()
    }
}
