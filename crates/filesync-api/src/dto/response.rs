//! Response DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use filesync_entity::file::FileVersion;

/// Standard success response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    /// Whether the request was successful.
    pub success: bool,
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Creates a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Result of an upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    /// The file id, new or existing.
    pub file_id: Uuid,
    /// The created version.
    pub version_id: Uuid,
    /// Its version number.
    pub version_number: i32,
    /// Hex SHA-256 of the uploaded bytes.
    pub content_hash: String,
    /// Size in bytes.
    pub size_bytes: i64,
    /// Human-readable summary.
    pub message: String,
}

/// One entry of a file's version history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionResponse {
    /// Version id.
    pub version_id: Uuid,
    /// Sequential number.
    pub version_number: i32,
    /// When it was committed.
    pub created_at: DateTime<Utc>,
    /// Origin device.
    pub device_id: String,
    /// Size in bytes.
    pub size: i64,
    /// Content hash, absent for remote-change stubs.
    pub hash: Option<String>,
    /// Version that superseded this one.
    pub resolved_by: Option<Uuid>,
}

impl From<FileVersion> for VersionResponse {
    fn from(v: FileVersion) -> Self {
        Self {
            version_id: v.id,
            version_number: v.version_number,
            created_at: v.created_at,
            device_id: v.origin_device_id,
            size: v.size_bytes,
            hash: v.content_hash,
            resolved_by: v.resolved_by,
        }
    }
}

/// Result of a conflict resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveConflictResponse {
    /// Always true; failures are reported as errors.
    pub success: bool,
    /// Human-readable summary.
    pub message: String,
    /// The resolving version.
    pub new_version_id: Uuid,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall status: "ok" or "degraded".
    pub status: String,
    /// Version.
    pub version: String,
    /// Metadata store status.
    pub database: String,
    /// Blob store status.
    pub storage: String,
}
