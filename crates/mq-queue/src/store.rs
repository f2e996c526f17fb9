//! Per-post progress store.
//!
//! Keyed Redis state that lets a retried attempt resume where the previous
//! one stopped: the highest percentage ever reported, the set of completed
//! media ids, and each completed item's cached result. The store is a hint
//! cache, not a source of truth. Reads fall back to safe defaults and
//! writes are best-effort, so a flaky Redis never fails a job.

use redis::AsyncCommands;
use tracing::warn;

use mq_models::{ItemResult, ProgressSnapshot};

use crate::error::QueueResult;

/// Reported when a post has no recorded progress yet; the caller owns the
/// band below this.
pub const DEFAULT_MAX_PROGRESS: f64 = 30.0;

/// All keys slide on a 24 h TTL.
const KEY_TTL_SECS: u64 = 86_400;

/// Durable keyed store for per-post progress state.
pub struct ProgressStore {
    client: redis::Client,
}

impl ProgressStore {
    pub fn new(redis_url: &str) -> QueueResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }

    /// Highest percentage ever reported for this post.
    pub async fn max_progress(&self, post_id: &str) -> f64 {
        match self.read_max_progress(post_id).await {
            Ok(Some(v)) => v,
            Ok(None) => DEFAULT_MAX_PROGRESS,
            Err(e) => {
                warn!(post_id, "Progress store read failed, using default: {}", e);
                DEFAULT_MAX_PROGRESS
            }
        }
    }

    /// Unconditional write; the caller enforces monotonicity.
    pub async fn set_max_progress(&self, post_id: &str, value: f64) {
        let key = format!("maxProgress:{}", post_id);
        if let Err(e) = self.write(&key, value.to_string()).await {
            warn!(post_id, "Failed to store max progress: {}", e);
        }
    }

    /// Media ids marked done, in completion order.
    pub async fn completed(&self, post_id: &str) -> Vec<String> {
        match self.read_completed(post_id).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(post_id, "Progress store read failed, assuming none done: {}", e);
                Vec::new()
            }
        }
    }

    /// Idempotent append to the completion set.
    pub async fn mark_completed(&self, post_id: &str, media_id: &str) {
        let mut ids = self.completed(post_id).await;
        if ids.iter().any(|id| id == media_id) {
            return;
        }
        ids.push(media_id.to_string());

        let key = format!("completed:{}", post_id);
        let payload = match serde_json::to_string(&ids) {
            Ok(p) => p,
            Err(e) => {
                warn!(post_id, "Failed to encode completion set: {}", e);
                return;
            }
        };
        if let Err(e) = self.write(&key, payload).await {
            warn!(post_id, media_id, "Failed to store completion: {}", e);
        }
    }

    /// Cache the result for a completed item.
    pub async fn set_result(&self, post_id: &str, media_id: &str, result: &ItemResult) {
        let key = format!("mediaResult:{}:{}", post_id, media_id);
        let payload = match serde_json::to_string(result) {
            Ok(p) => p,
            Err(e) => {
                warn!(post_id, media_id, "Failed to encode item result: {}", e);
                return;
            }
        };
        if let Err(e) = self.write(&key, payload).await {
            warn!(post_id, media_id, "Failed to store item result: {}", e);
        }
    }

    /// Cached result for a completed item, if any.
    pub async fn result(&self, post_id: &str, media_id: &str) -> Option<ItemResult> {
        let key = format!("mediaResult:{}:{}", post_id, media_id);
        match self.read(&key).await {
            Ok(Some(payload)) => serde_json::from_str(&payload)
                .map_err(|e| warn!(post_id, media_id, "Discarding unreadable cached result: {}", e))
                .ok(),
            Ok(None) => None,
            Err(e) => {
                warn!(post_id, media_id, "Progress store read failed: {}", e);
                None
            }
        }
    }

    /// All cached results, in completion order.
    pub async fn all_results(&self, post_id: &str) -> Vec<ItemResult> {
        let mut results = Vec::new();
        for media_id in self.completed(post_id).await {
            if let Some(result) = self.result(post_id, &media_id).await {
                results.push(result);
            }
        }
        results
    }

    /// Last-written progress state, for observers.
    pub async fn snapshot_progress(&self, post_id: &str, snapshot: &ProgressSnapshot) {
        let key = format!("progress:{}", post_id);
        let payload = match serde_json::to_string(snapshot) {
            Ok(p) => p,
            Err(e) => {
                warn!(post_id, "Failed to encode progress snapshot: {}", e);
                return;
            }
        };
        if let Err(e) = self.write(&key, payload).await {
            warn!(post_id, "Failed to store progress snapshot: {}", e);
        }
    }

    async fn read_max_progress(&self, post_id: &str) -> QueueResult<Option<f64>> {
        let key = format!("maxProgress:{}", post_id);
        Ok(self.read(&key).await?.and_then(|v| v.parse().ok()))
    }

    async fn read_completed(&self, post_id: &str) -> QueueResult<Vec<String>> {
        let key = format!("completed:{}", post_id);
        match self.read(&key).await? {
            Some(payload) => Ok(serde_json::from_str(&payload)?),
            None => Ok(Vec::new()),
        }
    }

    async fn read(&self, key: &str) -> QueueResult<Option<String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn write(&self, key: &str, value: String) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.set_ex::<_, _, ()>(key, value, KEY_TTL_SECS).await?;
        Ok(())
    }
}
