//! Change bus configuration.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Which change bus backend to construct at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusProvider {
    /// In-process bus; only devices connected to this node see each other.
    Memory,
    /// Redis Streams with consumer groups.
    Redis,
}

/// Change bus configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Bus backend.
    #[serde(default = "default_provider")]
    pub provider: BusProvider,
    /// Redis URL when `provider = "redis"`.
    #[serde(default)]
    pub redis_url: String,
    /// Base topic name for file change events.
    #[serde(default = "default_topic")]
    pub topic: String,
    /// Publish to one topic per user (`{topic}.{user_id}`) instead of a
    /// single shared topic.
    #[serde(default)]
    pub per_user_topics: bool,
    /// Per consumer group buffer for the in-process bus.
    #[serde(default = "default_channel_buffer")]
    pub channel_buffer_size: usize,
    /// How long a Redis read blocks before re-checking cancellation.
    #[serde(default = "default_block_timeout")]
    pub block_timeout_ms: u64,
    /// Maximum messages fetched per Redis read.
    #[serde(default = "default_read_count")]
    pub read_count: usize,
    /// Approximate number of entries a Redis stream keeps; older entries
    /// are trimmed on publish.
    #[serde(default = "default_stream_max_len")]
    pub stream_max_len: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            redis_url: String::new(),
            topic: default_topic(),
            per_user_topics: false,
            channel_buffer_size: default_channel_buffer(),
            block_timeout_ms: default_block_timeout(),
            read_count: default_read_count(),
            stream_max_len: default_stream_max_len(),
        }
    }
}

impl BusConfig {
    pub(crate) fn validate(&self) -> Result<(), AppError> {
        if self.topic.trim().is_empty() {
            return Err(AppError::configuration("bus.topic must not be empty"));
        }
        if self.provider == BusProvider::Redis && self.redis_url.trim().is_empty() {
            return Err(AppError::configuration(
                "bus.redis_url is required when provider = redis",
            ));
        }
        if self.channel_buffer_size == 0 {
            return Err(AppError::configuration(
                "bus.channel_buffer_size must be positive",
            ));
        }
        if self.stream_max_len == 0 {
            return Err(AppError::configuration("bus.stream_max_len must be positive"));
        }
        Ok(())
    }
}

fn default_provider() -> BusProvider {
    BusProvider::Memory
}

fn default_topic() -> String {
    "file-changes".to_string()
}

fn default_channel_buffer() -> usize {
    1024
}

fn default_block_timeout() -> u64 {
    2000
}

fn default_read_count() -> usize {
    64
}

fn default_stream_max_len() -> usize {
    100_000
}
