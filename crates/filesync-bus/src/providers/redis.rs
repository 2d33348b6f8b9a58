//! Redis Streams change bus for multi-node deployments.
//!
//! Topics map to streams, consumer groups map to Redis consumer groups.
//! Entries carry two fields, `key` and `payload`. Streams are trimmed to
//! roughly `bus.stream_max_len` entries on every publish, and a group is
//! destroyed once its last member's subscription is dropped.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::streams::{StreamId, StreamReadReply};
use tracing::{debug, info, warn};
use uuid::Uuid;

use filesync_core::config::BusConfig;
use filesync_core::error::{AppError, ErrorKind};
use filesync_core::result::AppResult;
use filesync_core::traits::bus::{BusMessage, BusStream, ChangeBus};

/// Removes a consumer from its group, then destroys the group if that was
/// its last consumer. Returns 1 when the group was destroyed.
const LEAVE_GROUP_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
    return 0
end
redis.call('XGROUP', 'DELCONSUMER', KEYS[1], ARGV[1], ARGV[2])
if #redis.call('XINFO', 'CONSUMERS', KEYS[1], ARGV[1]) == 0 then
    return redis.call('XGROUP', 'DESTROY', KEYS[1], ARGV[1])
end
return 0
"#;

/// Change bus backed by Redis Streams.
#[derive(Clone)]
pub struct RedisChangeBus {
    client: redis::Client,
    publisher: ConnectionManager,
    block_timeout: Duration,
    read_count: usize,
    stream_max_len: usize,
}

impl std::fmt::Debug for RedisChangeBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisChangeBus")
            .field("block_timeout", &self.block_timeout)
            .field("read_count", &self.read_count)
            .field("stream_max_len", &self.stream_max_len)
            .finish()
    }
}

impl RedisChangeBus {
    /// Connect to Redis at `bus.redis_url`.
    pub async fn connect(config: &BusConfig) -> AppResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str()).map_err(|e| {
            AppError::with_source(ErrorKind::Configuration, "Invalid bus.redis_url", e)
        })?;
        let publisher = ConnectionManager::new(client.clone())
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Bus, "Redis connection failed", e))?;

        info!(stream_max_len = config.stream_max_len, "Connected change bus to Redis");
        Ok(Self {
            client,
            publisher,
            block_timeout: Duration::from_millis(config.block_timeout_ms),
            read_count: config.read_count.max(1),
            stream_max_len: config.stream_max_len.max(1),
        })
    }

    async fn ensure_group(conn: &mut MultiplexedConnection, topic: &str, group: &str) -> AppResult<()> {
        let created = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(topic)
            .arg(group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async::<()>(conn)
            .await;
        match created {
            Ok(()) => {
                debug!(topic, group, "Created consumer group");
                Ok(())
            }
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => Err(AppError::with_source(
                ErrorKind::Bus,
                format!("XGROUP CREATE failed for {topic}/{group}"),
                e,
            )),
        }
    }

    /// Register the consumer up front so a concurrent leave never sees the
    /// group empty while this member is joining.
    async fn join_group(
        conn: &mut MultiplexedConnection,
        topic: &str,
        group: &str,
        consumer: &str,
    ) -> AppResult<()> {
        redis::cmd("XGROUP")
            .arg("CREATECONSUMER")
            .arg(topic)
            .arg(group)
            .arg(consumer)
            .query_async::<i64>(conn)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Bus,
                    format!("XGROUP CREATECONSUMER failed for {topic}/{group}"),
                    e,
                )
            })?;
        Ok(())
    }
}

fn xadd_command(topic: &str, max_len: usize, key: &str, payload: &[u8]) -> redis::Cmd {
    let mut cmd = redis::cmd("XADD");
    cmd.arg(topic)
        .arg("MAXLEN")
        .arg("~")
        .arg(max_len)
        .arg("*")
        .arg("key")
        .arg(key)
        .arg("payload")
        .arg(payload);
    cmd
}

/// A consumer's place in a group. Dropping it leaves the group in the
/// background, destroying the group when no consumers remain.
struct Membership {
    conn: ConnectionManager,
    topic: String,
    group: String,
    consumer: String,
}

impl Drop for Membership {
    fn drop(&mut self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(topic = %self.topic, group = %self.group, "No runtime to leave consumer group");
            return;
        };
        let mut conn = self.conn.clone();
        let topic = std::mem::take(&mut self.topic);
        let group = std::mem::take(&mut self.group);
        let consumer = std::mem::take(&mut self.consumer);
        runtime.spawn(async move {
            let left = redis::Script::new(LEAVE_GROUP_SCRIPT)
                .key(&topic)
                .arg(&group)
                .arg(&consumer)
                .invoke_async::<i64>(&mut conn)
                .await;
            match left {
                Ok(1) => debug!(topic = %topic, group = %group, "Destroyed consumer group"),
                Ok(_) => debug!(topic = %topic, group = %group, consumer = %consumer, "Left consumer group"),
                Err(e) => warn!(topic = %topic, group = %group, error = %e, "Failed to leave consumer group"),
            }
        });
    }
}

/// Per-member read state carried through the subscription stream.
struct Reader {
    conn: MultiplexedConnection,
    membership: Membership,
    block_ms: u64,
    count: usize,
    pending: VecDeque<BusMessage>,
    failed: bool,
}

impl Reader {
    async fn fill(&mut self) -> AppResult<()> {
        let Membership {
            topic,
            group,
            consumer,
            ..
        } = &self.membership;
        let reply: Option<StreamReadReply> = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(group)
            .arg(consumer)
            .arg("COUNT")
            .arg(self.count)
            .arg("BLOCK")
            .arg(self.block_ms)
            .arg("STREAMS")
            .arg(topic)
            .arg(">")
            .query_async(&mut self.conn)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Bus, "XREADGROUP failed", e))?;

        let Some(reply) = reply else {
            return Ok(());
        };

        let mut ids = Vec::new();
        for stream in reply.keys {
            for entry in stream.ids {
                ids.push(entry.id.clone());
                match decode_entry(topic, &entry) {
                    Some(message) => self.pending.push_back(message),
                    None => warn!(topic = %topic, id = %entry.id, "Skipping malformed stream entry"),
                }
            }
        }

        if !ids.is_empty() {
            redis::cmd("XACK")
                .arg(topic)
                .arg(group)
                .arg(&ids)
                .query_async::<i64>(&mut self.conn)
                .await
                .map_err(|e| AppError::with_source(ErrorKind::Bus, "XACK failed", e))?;
        }
        Ok(())
    }
}

fn decode_entry(topic: &str, entry: &StreamId) -> Option<BusMessage> {
    let key: String = entry.get("key")?;
    let payload: Vec<u8> = entry.get("payload")?;
    Some(BusMessage {
        topic: topic.to_string(),
        key,
        payload: Bytes::from(payload),
    })
}

#[async_trait]
impl ChangeBus for RedisChangeBus {
    fn provider_type(&self) -> &str {
        "redis"
    }

    async fn publish(&self, topic: &str, key: &str, payload: Bytes) -> AppResult<()> {
        let mut conn = self.publisher.clone();
        xadd_command(topic, self.stream_max_len, key, payload.as_ref())
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Bus, format!("XADD to {topic} failed"), e))?;
        Ok(())
    }

    async fn subscribe(&self, group: &str, topic: &str) -> AppResult<BusStream> {
        // Blocking reads get a dedicated connection so they never stall publishers.
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Bus, "Redis connection failed", e))?;
        Self::ensure_group(&mut conn, topic, group).await?;
        let consumer = format!("{group}-{}", Uuid::new_v4());
        Self::join_group(&mut conn, topic, group, &consumer).await?;

        let reader = Reader {
            conn,
            membership: Membership {
                conn: self.publisher.clone(),
                topic: topic.to_string(),
                group: group.to_string(),
                consumer,
            },
            block_ms: self.block_timeout.as_millis() as u64,
            count: self.read_count,
            pending: VecDeque::new(),
            failed: false,
        };

        let stream = futures::stream::unfold(reader, |mut reader| async move {
            if reader.failed {
                return None;
            }
            loop {
                if let Some(message) = reader.pending.pop_front() {
                    return Some((Ok(message), reader));
                }
                if let Err(e) = reader.fill().await {
                    reader.failed = true;
                    return Some((Err(e), reader));
                }
            }
        });
        Ok(Box::pin(stream))
    }
}
