//! Change bus trait for topic-based publish/subscribe backends.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use crate::result::AppResult;

/// A message received from the change bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// Topic the message was published to.
    pub topic: String,
    /// Ordering key (the file id).
    pub key: String,
    /// Encoded payload.
    pub payload: Bytes,
}

/// Stream of messages delivered to one consumer group member.
pub type BusStream = Pin<Box<dyn Stream<Item = AppResult<BusMessage>> + Send>>;

/// Topic-based publish/subscribe transport with consumer groups.
///
/// Messages with the same key are delivered to a given consumer group in
/// publish order. Nothing is promised across different keys. Members of the
/// same group share the group's messages; distinct groups each see every
/// message published after the group was created.
#[async_trait]
pub trait ChangeBus: Send + Sync + std::fmt::Debug + 'static {
    /// Return the provider type name (e.g., "memory", "redis").
    fn provider_type(&self) -> &str;

    /// Publish `payload` to `topic` under the ordering `key`.
    async fn publish(&self, topic: &str, key: &str, payload: Bytes) -> AppResult<()>;

    /// Join `group` on `topic` and return the stream of delivered messages.
    async fn subscribe(&self, group: &str, topic: &str) -> AppResult<BusStream>;
}
