//! Job queue using Redis Streams.

use redis::streams::{StreamClaimReply, StreamPendingCountReply, StreamReadReply};
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use crate::error::{QueueError, QueueResult};
use crate::job::QueueJob;

/// TTL for the per-message retry and stall counters.
const COUNTER_TTL_SECS: i64 = 86_400;

/// TTL for enqueue-side dedup keys.
const DEDUP_TTL_SECS: u64 = 3_600;

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Stream name for jobs
    pub stream_name: String,
    /// Consumer group name
    pub consumer_group: String,
    /// Dead letter stream name
    pub dlq_stream_name: String,
    /// Max retries before DLQ
    pub max_retries: u32,
    /// Max times a pending message may be reclaimed before it is
    /// dead-lettered as stalled
    pub max_stalled: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            stream_name: "mediaqueue:jobs".to_string(),
            consumer_group: "mediaqueue:workers".to_string(),
            dlq_stream_name: "mediaqueue:dlq".to_string(),
            max_retries: 3,
            max_stalled: 1,
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            stream_name: std::env::var("QUEUE_STREAM")
                .unwrap_or_else(|_| "mediaqueue:jobs".to_string()),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP")
                .unwrap_or_else(|_| "mediaqueue:workers".to_string()),
            dlq_stream_name: std::env::var("QUEUE_DLQ_STREAM")
                .unwrap_or_else(|_| "mediaqueue:dlq".to_string()),
            max_retries: std::env::var("QUEUE_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            max_stalled: std::env::var("QUEUE_MAX_STALLED")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1),
        }
    }

    /// Same Redis instance, but addressing the cleanup stream.
    pub fn for_cleanup(&self) -> Self {
        Self {
            stream_name: std::env::var("QUEUE_CLEANUP_STREAM")
                .unwrap_or_else(|_| "mediaqueue:cleanup".to_string()),
            consumer_group: "mediaqueue:cleaners".to_string(),
            ..self.clone()
        }
    }
}

/// Job queue client for one stream.
pub struct JobQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl JobQueue {
    /// Create a new job queue.
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    /// Initialize the queue (create the consumer group if missing).
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!("Created consumer group: {}", self.config.consumer_group),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!("Consumer group already exists: {}", self.config.consumer_group);
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }

        Ok(())
    }

    /// Enqueue a job, rejecting duplicates while one is in flight.
    pub async fn enqueue(&self, job: &QueueJob) -> QueueResult<String> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let payload = serde_json::to_string(job)?;
        let dedup_key = format!("mediaqueue:dedup:{}", job.idempotency_key());

        let exists: bool = conn.exists(&dedup_key).await?;
        if exists {
            warn!("Duplicate job rejected: {}", job.idempotency_key());
            return Err(QueueError::enqueue_failed("Duplicate job"));
        }

        let message_id: String = redis::cmd("XADD")
            .arg(&self.config.stream_name)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .query_async(&mut conn)
            .await?;

        conn.set_ex::<_, _, ()>(&dedup_key, "1", DEDUP_TTL_SECS).await?;

        info!(
            post_id = job.post_id(),
            message_id = %message_id,
            "Enqueued job on {}",
            self.config.stream_name
        );

        Ok(message_id)
    }

    /// Acknowledge and drop a message.
    pub async fn ack(&self, message_id: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        redis::cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        redis::cmd("XDEL")
            .arg(&self.config.stream_name)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        debug!("Acknowledged message: {}", message_id);
        Ok(())
    }

    /// Allow the same logical job to be submitted again.
    pub async fn clear_dedup(&self, job: &QueueJob) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let dedup_key = format!("mediaqueue:dedup:{}", job.idempotency_key());
        conn.del::<_, ()>(&dedup_key).await?;
        Ok(())
    }

    /// Move a job to the dead letter stream and ack the original.
    pub async fn dlq(&self, message_id: &str, job: &QueueJob, error: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let payload = serde_json::to_string(job)?;
        redis::cmd("XADD")
            .arg(&self.config.dlq_stream_name)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .arg("error")
            .arg(error)
            .arg("original_id")
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        self.ack(message_id).await?;

        warn!(post_id = job.post_id(), "Dead-lettered job: {}", error);
        Ok(())
    }

    /// Read new messages for this consumer.
    pub async fn consume(
        &self,
        consumer_name: &str,
        block_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, QueueJob)>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let reply: StreamReadReply = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg("COUNT")
            .arg(count)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg(">")
            .query_async(&mut conn)
            .await?;

        let mut jobs = Vec::new();
        for stream in reply.keys {
            for entry in stream.ids {
                match Self::payload_of(&entry.map) {
                    Some(job) => jobs.push((entry.id, job)),
                    None => {
                        warn!("Dropping malformed message {}", entry.id);
                        self.ack(&entry.id).await.ok();
                    }
                }
            }
        }

        Ok(jobs)
    }

    /// Reclaim messages another consumer left pending for too long.
    ///
    /// A message that has already been reclaimed `max_stalled` times is
    /// dead-lettered instead of being handed out again, so one post is never
    /// processed by two attempts at once for long.
    pub async fn claim_pending(
        &self,
        consumer_name: &str,
        min_idle_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, QueueJob)>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let pending: StreamPendingCountReply = redis::cmd("XPENDING")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("IDLE")
            .arg(min_idle_ms)
            .arg("-")
            .arg("+")
            .arg(count)
            .query_async(&mut conn)
            .await?;

        if pending.ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut cmd = redis::cmd("XCLAIM");
        cmd.arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg(min_idle_ms);
        for entry in &pending.ids {
            cmd.arg(&entry.id);
        }

        let claimed: StreamClaimReply = cmd.query_async(&mut conn).await?;

        let mut jobs = Vec::new();
        for entry in claimed.ids {
            let Some(job) = Self::payload_of(&entry.map) else {
                warn!("Dropping malformed pending message {}", entry.id);
                self.ack(&entry.id).await.ok();
                continue;
            };

            let stall_key = format!("mediaqueue:stalls:{}", entry.id);
            let stalls: u32 = conn.incr(&stall_key, 1).await?;
            conn.expire::<_, ()>(&stall_key, COUNTER_TTL_SECS).await?;

            if stalls > self.config.max_stalled {
                self.dlq(&entry.id, &job, "stalled too many times").await?;
                self.clear_dedup(&job).await.ok();
                continue;
            }

            info!(
                post_id = job.post_id(),
                message_id = %entry.id,
                "Claimed stalled job"
            );
            jobs.push((entry.id, job));
        }

        Ok(jobs)
    }

    /// Retry count recorded for a message.
    pub async fn retry_count(&self, message_id: &str) -> QueueResult<u32> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("mediaqueue:retries:{}", message_id);
        let count: Option<u32> = conn.get(&key).await?;
        Ok(count.unwrap_or(0))
    }

    /// Record a failed attempt; returns the new count.
    pub async fn increment_retry(&self, message_id: &str) -> QueueResult<u32> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("mediaqueue:retries:{}", message_id);
        let count: u32 = conn.incr(&key, 1).await?;
        conn.expire::<_, ()>(&key, COUNTER_TTL_SECS).await?;
        Ok(count)
    }

    /// Max retries from config.
    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    /// Queue depth, for observers.
    pub async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: u64 = conn.xlen(&self.config.stream_name).await?;
        Ok(len)
    }

    /// Dead-letter depth, for observers.
    pub async fn dlq_len(&self) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: u64 = conn.xlen(&self.config.dlq_stream_name).await?;
        Ok(len)
    }

    fn payload_of(map: &std::collections::HashMap<String, redis::Value>) -> Option<QueueJob> {
        let redis::Value::BulkString(payload) = map.get("job")? else {
            return None;
        };
        serde_json::from_slice(payload).ok()
    }
}
