//! Typed change-event client on top of a [`ChangeBus`] backend.

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use filesync_core::config::BusConfig;
use filesync_core::error::AppError;
use filesync_core::events::ChangeEvent;
use filesync_core::result::AppResult;
use filesync_core::traits::bus::ChangeBus;

/// Publishes and consumes [`ChangeEvent`]s.
///
/// Events are JSON encoded and keyed by file id, so every change to one file
/// reaches a consumer group in publish order.
#[derive(Clone)]
pub struct ChangeBusClient {
    bus: Arc<dyn ChangeBus>,
    topic: String,
    per_user_topics: bool,
}

impl std::fmt::Debug for ChangeBusClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeBusClient")
            .field("provider", &self.bus.provider_type())
            .field("topic", &self.topic)
            .field("per_user_topics", &self.per_user_topics)
            .finish()
    }
}

impl ChangeBusClient {
    /// Wrap a bus backend using the topic settings from configuration.
    pub fn new(bus: Arc<dyn ChangeBus>, config: &BusConfig) -> Self {
        Self {
            bus,
            topic: config.topic.clone(),
            per_user_topics: config.per_user_topics,
        }
    }

    /// The topic carrying `user_id`'s changes.
    pub fn topic_for(&self, user_id: Uuid) -> String {
        if self.per_user_topics {
            format!("{}.{user_id}", self.topic)
        } else {
            self.topic.clone()
        }
    }

    /// Consumer group name unique to one watch session.
    pub fn session_group(
        prefix: &str,
        user_id: Uuid,
        device_id: &str,
        started_at: DateTime<Utc>,
    ) -> String {
        format!(
            "{prefix}-{user_id}-{device_id}-{}",
            started_at.timestamp_millis()
        )
    }

    /// Publish a change event on its owner's topic, keyed by file id.
    pub async fn publish_change(&self, event: &ChangeEvent) -> AppResult<()> {
        let topic = self.topic_for(event.origin_user_id);
        let payload = Bytes::from(serde_json::to_vec(event)?);
        self.bus
            .publish(&topic, &event.file_id.to_string(), payload)
            .await?;
        debug!(
            topic = %topic,
            file_id = %event.file_id,
            change_type = %event.change_type,
            device_id = %event.origin_device_id,
            "Published change event"
        );
        Ok(())
    }

    /// Join `group` on `user_id`'s topic and invoke `on_event` for every
    /// change event owned by `user_id`, one at a time.
    ///
    /// Runs until `cancel` fires (returns `Ok`), the handler fails, or the bus
    /// fails or closes the subscription (returns the error). Events belonging
    /// to other users are discarded before the handler sees them. Payloads
    /// that fail to decode are skipped.
    pub async fn subscribe_changes<F, Fut>(
        &self,
        group: &str,
        user_id: Uuid,
        cancel: CancellationToken,
        mut on_event: F,
    ) -> AppResult<()>
    where
        F: FnMut(ChangeEvent) -> Fut + Send,
        Fut: Future<Output = AppResult<()>> + Send,
    {
        let topic = self.topic_for(user_id);
        let mut stream = self.bus.subscribe(group, &topic).await?;
        info!(topic = %topic, group, "Change bus subscription started");

        loop {
            let message = tokio::select! {
                _ = cancel.cancelled() => {
                    info!(group, "Change bus subscription cancelled");
                    return Ok(());
                }
                next = stream.next() => match next {
                    Some(message) => message?,
                    None => return Err(AppError::bus(format!("Subscription {group} closed by the bus"))),
                },
            };

            let event: ChangeEvent = match serde_json::from_slice(&message.payload) {
                Ok(event) => event,
                Err(e) => {
                    warn!(group, key = %message.key, error = %e, "Skipping undecodable change event");
                    continue;
                }
            };

            if event.origin_user_id != user_id {
                continue;
            }

            on_event(event).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MemoryChangeBus;
    use filesync_core::error::ErrorKind;
    use filesync_core::events::ChangeType;
    use tokio::sync::mpsc;

    fn client(per_user_topics: bool) -> ChangeBusClient {
        let config = BusConfig {
            per_user_topics,
            ..BusConfig::default()
        };
        ChangeBusClient::new(Arc::new(MemoryChangeBus::new(64)), &config)
    }

    fn event(user: Uuid, device: &str) -> ChangeEvent {
        ChangeEvent::new(Uuid::new_v4(), "a.txt", ChangeType::Modified, user, device)
    }

    #[test]
    fn test_topic_naming() {
        let user = Uuid::new_v4();
        assert_eq!(client(false).topic_for(user), "file-changes");
        assert_eq!(client(true).topic_for(user), format!("file-changes.{user}"));
    }

    #[test]
    fn test_session_group_is_unique_per_session() {
        let user = Uuid::new_v4();
        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::milliseconds(1);
        let a = ChangeBusClient::session_group("filesync-watch", user, "laptop", t0);
        let b = ChangeBusClient::session_group("filesync-watch", user, "laptop", t1);
        assert_ne!(a, b);
        assert!(a.starts_with(&format!("filesync-watch-{user}-laptop-")));
    }

    #[tokio::test]
    async fn test_subscriber_only_sees_own_user() {
        let client = client(false);
        let me = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel(8);

        let sub_client = client.clone();
        let sub_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            sub_client
                .subscribe_changes("g", me, sub_cancel, move |event| {
                    let tx = tx.clone();
                    async move {
                        tx.send(event).await.map_err(|_| AppError::transport("closed"))
                    }
                })
                .await
        });
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        client.publish_change(&event(Uuid::new_v4(), "other")).await.unwrap();
        let mine = event(me, "phone");
        client.publish_change(&mine).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.id, mine.id);

        cancel.cancel();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_handler_error_ends_subscription() {
        let client = client(true);
        let me = Uuid::new_v4();
        let cancel = CancellationToken::new();

        let sub_client = client.clone();
        let handle = tokio::spawn(async move {
            sub_client
                .subscribe_changes("g", me, cancel, |_| async {
                    Err(AppError::transport("outbound stream closed"))
                })
                .await
        });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        client.publish_change(&event(me, "phone")).await.unwrap();

        let err = handle.await.unwrap().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Transport);
    }
}
