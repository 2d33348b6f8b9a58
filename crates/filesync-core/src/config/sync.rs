//! Synchronization engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Settings for the upload/download pipeline and watch sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Size of each chunk streamed back by a download (default 1 MiB).
    #[serde(default = "default_download_chunk")]
    pub download_chunk_size_bytes: usize,
    /// Base names starting with this marker are never reported.
    #[serde(default = "default_hidden_prefix")]
    pub hidden_file_prefix: String,
    /// Outbound event buffer per watch session.
    #[serde(default = "default_watch_buffer")]
    pub watch_buffer_size: usize,
    /// Consumer group name prefix for watch sessions.
    #[serde(default = "default_group_prefix")]
    pub consumer_group_prefix: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            download_chunk_size_bytes: default_download_chunk(),
            hidden_file_prefix: default_hidden_prefix(),
            watch_buffer_size: default_watch_buffer(),
            consumer_group_prefix: default_group_prefix(),
        }
    }
}

impl SyncConfig {
    pub(crate) fn validate(&self) -> Result<(), AppError> {
        if self.download_chunk_size_bytes == 0 {
            return Err(AppError::configuration(
                "sync.download_chunk_size_bytes must be positive",
            ));
        }
        if self.watch_buffer_size == 0 {
            return Err(AppError::configuration(
                "sync.watch_buffer_size must be positive",
            ));
        }
        Ok(())
    }
}

fn default_download_chunk() -> usize {
    1024 * 1024
}

fn default_hidden_prefix() -> String {
    ".".to_string()
}

fn default_watch_buffer() -> usize {
    256
}

fn default_group_prefix() -> String {
    "filesync-watch".to_string()
}
