//! Request DTOs with validation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use filesync_core::error::AppError;

/// Query string of `POST /api/files/upload`; the body carries the bytes.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UploadQuery {
    /// Logical path of the file on the uploading device.
    #[validate(length(min = 1, max = 1024, message = "file_name is required"))]
    pub file_name: String,
    /// The uploading device.
    #[validate(length(min = 1, max = 255, message = "device_id is required"))]
    pub device_id: String,
    /// Existing file to add a version to.
    pub file_id: Option<Uuid>,
}

/// Optional folder filter for listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FolderFilter {
    /// Path prefix.
    pub folder: Option<String>,
}

/// Body of `POST /api/sync/check`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SyncFileRequest {
    /// File to check.
    pub file_id: Uuid,
    /// Hash of the device's local copy.
    pub file_hash: String,
    /// The checking device.
    #[validate(length(min = 1, max = 255, message = "device_id is required"))]
    pub device_id: String,
}

/// Body of `POST /api/sync/resolve`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ResolveConflictRequest {
    /// File being resolved.
    pub file_id: Uuid,
    /// Versions that lose the conflict.
    #[validate(length(min = 1, message = "at least one losing version is required"))]
    pub losing_version_ids: Vec<Uuid>,
    /// Version whose content wins. Defaults to the newest non-losing version.
    #[serde(default)]
    pub winning_version_id: Option<Uuid>,
}

/// Query string of the watch WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WatchQuery {
    /// The watching device.
    #[validate(length(min = 1, max = 255, message = "device_id is required"))]
    pub device_id: String,
    /// Local folders to watch; repeat the parameter for several.
    #[serde(default)]
    pub folder: Vec<String>,
}

/// Run `validator` rules and convert failures into a `Validation` error.
pub fn validate<T: Validate>(value: &T) -> Result<(), AppError> {
    value
        .validate()
        .map_err(|e| AppError::validation(format!("Invalid request: {e}")))
}
