//! File metadata projection.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::model::File;

/// A file joined with its latest version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// The file row.
    #[serde(flatten)]
    pub file: File,
    /// Id of the latest version, if any.
    pub latest_version_id: Option<Uuid>,
    /// Number of the latest version, if any.
    pub latest_version_number: Option<i32>,
    /// Content hash of the latest version, if known.
    pub content_hash: Option<String>,
}
