//! File change events.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// The semantic kind of a file change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    /// A file appeared.
    Created,
    /// A file's content was written.
    Modified,
    /// A file was removed.
    Deleted,
    /// A file was renamed or moved.
    Renamed,
}

impl ChangeType {
    /// Wire name of the change type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Modified => "MODIFIED",
            Self::Deleted => "DELETED",
            Self::Renamed => "RENAMED",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CREATED" => Ok(Self::Created),
            "MODIFIED" => Ok(Self::Modified),
            "DELETED" => Ok(Self::Deleted),
            "RENAMED" => Ok(Self::Renamed),
            other => Err(AppError::validation(format!("Unknown change type: {other}"))),
        }
    }
}

/// A change that happened to a file on one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Unique event id.
    pub id: Uuid,
    /// The file that changed.
    pub file_id: Uuid,
    /// Path of the file as seen by the origin device.
    pub file_path: String,
    /// What happened.
    pub change_type: ChangeType,
    /// When the change was observed.
    pub timestamp: DateTime<Utc>,
    /// Owner of the file.
    pub origin_user_id: Uuid,
    /// Device that produced the change.
    pub origin_device_id: String,
    /// Version created by the change, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<Uuid>,
}

impl ChangeEvent {
    /// Create a new change event stamped with a fresh id and the current time.
    pub fn new(
        file_id: Uuid,
        file_path: impl Into<String>,
        change_type: ChangeType,
        origin_user_id: Uuid,
        origin_device_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_id,
            file_path: file_path.into(),
            change_type,
            timestamp: Utc::now(),
            origin_user_id,
            origin_device_id: origin_device_id.into(),
            version_id: None,
        }
    }

    /// Attach the version produced by this change.
    pub fn with_version(mut self, version_id: Uuid) -> Self {
        self.version_id = Some(version_id);
        self
    }

    /// Whether this event was produced by the given device.
    pub fn is_from_device(&self, device_id: &str) -> bool {
        self.origin_device_id == device_id
    }
}
