//! Sync state classification results.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Relationship between a device's local copy and the latest version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    /// The device holds the latest content.
    Synced,
    /// The device is behind its own last write.
    NeedsUpdate,
    /// Another device diverged from this one.
    Conflict,
    /// The file does not exist or has no versions.
    FileNotFound,
}

impl SyncStatus {
    /// Human-readable explanation sent back to clients.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Synced => "File is up to date",
            Self::NeedsUpdate => "Local copy is behind the latest version from this device",
            Self::Conflict => "File was changed on another device",
            Self::FileNotFound => "File not found",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Synced => write!(f, "SYNCED"),
            Self::NeedsUpdate => write!(f, "NEEDS_UPDATE"),
            Self::Conflict => write!(f, "CONFLICT"),
            Self::FileNotFound => write!(f, "FILE_NOT_FOUND"),
        }
    }
}

/// Outcome of a sync check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCheck {
    /// The classification.
    pub status: SyncStatus,
    /// Latest version id, absent when the file was not found.
    pub latest_version_id: Option<Uuid>,
    /// Human-readable explanation.
    pub message: String,
}

impl SyncCheck {
    /// Build a check result with the status's default message.
    pub fn new(status: SyncStatus, latest_version_id: Option<Uuid>) -> Self {
        Self {
            status,
            latest_version_id,
            message: status.message().to_string(),
        }
    }
}
