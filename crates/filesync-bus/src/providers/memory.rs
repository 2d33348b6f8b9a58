//! In-memory change bus for single-node deployments.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::debug;

use filesync_core::result::AppResult;
use filesync_core::traits::bus::{BusMessage, BusStream, ChangeBus};

type SharedReceiver = Arc<Mutex<mpsc::Receiver<BusMessage>>>;

/// One consumer group's queue. Members share the receiver, so each message
/// goes to exactly one member of the group.
#[derive(Debug)]
struct GroupQueue {
    tx: mpsc::Sender<BusMessage>,
    rx: Weak<Mutex<mpsc::Receiver<BusMessage>>>,
}

/// In-memory bus: topic → consumer group → queue.
///
/// A group sees every message published after it was created, in publish
/// order. A full queue makes the publisher wait for that group to catch up;
/// a group whose members are all gone is skipped and removed.
#[derive(Debug)]
pub struct MemoryChangeBus {
    topics: RwLock<HashMap<String, HashMap<String, GroupQueue>>>,
    buffer_size: usize,
}

impl MemoryChangeBus {
    /// Create a bus whose group queues hold up to `buffer_size` messages.
    pub fn new(buffer_size: usize) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            buffer_size: buffer_size.max(1),
        }
    }

    /// Number of live consumer groups on `topic`.
    pub async fn group_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .await
            .get(topic)
            .map(|groups| groups.values().filter(|g| g.rx.strong_count() > 0).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl ChangeBus for MemoryChangeBus {
    fn provider_type(&self) -> &str {
        "memory"
    }

    async fn publish(&self, topic: &str, key: &str, payload: Bytes) -> AppResult<()> {
        let message = BusMessage {
            topic: topic.to_string(),
            key: key.to_string(),
            payload,
        };

        let queues: Vec<(String, mpsc::Sender<BusMessage>)> = {
            let topics = self.topics.read().await;
            let Some(groups) = topics.get(topic) else {
                debug!(topic, "Published to topic without consumer groups");
                return Ok(());
            };
            groups
                .iter()
                .map(|(group, queue)| (group.clone(), queue.tx.clone()))
                .collect()
        };

        let sends = queues.into_iter().map(|(group, tx)| {
            let message = message.clone();
            async move {
                if tx.capacity() == 0 {
                    debug!(topic, group = %group, "Consumer group is full, waiting");
                }
                tx.send(message).await.err().map(|_| group)
            }
        });
        let closed: Vec<String> = futures::future::join_all(sends)
            .await
            .into_iter()
            .flatten()
            .collect();

        if !closed.is_empty() {
            let mut topics = self.topics.write().await;
            if let Some(groups) = topics.get_mut(topic) {
                for group in &closed {
                    // A member may have rejoined between the two locks.
                    if groups.get(group).is_some_and(|q| q.rx.strong_count() == 0) {
                        groups.remove(group);
                        debug!(topic, group = %group, "Removed abandoned consumer group");
                    }
                }
                if groups.is_empty() {
                    topics.remove(topic);
                }
            }
        }

        Ok(())
    }

    async fn subscribe(&self, group: &str, topic: &str) -> AppResult<BusStream> {
        let receiver: SharedReceiver = {
            let mut topics = self.topics.write().await;
            let groups = topics.entry(topic.to_string()).or_default();
            match groups.get(group).and_then(|q| q.rx.upgrade()) {
                Some(rx) => rx,
                None => {
                    let (tx, rx) = mpsc::channel(self.buffer_size);
                    let rx = Arc::new(Mutex::new(rx));
                    groups.insert(
                        group.to_string(),
                        GroupQueue {
                            tx,
                            rx: Arc::downgrade(&rx),
                        },
                    );
                    rx
                }
            }
        };
        debug!(topic, group, "Joined consumer group");

        let stream = futures::stream::unfold(receiver, |rx| async move {
            let next = rx.lock().await.recv().await;
            next.map(|message| (Ok(message), rx))
        });
        Ok(Box::pin(stream))
    }
}
