//! Job payloads carried on the queue streams.

use serde::{Deserialize, Serialize};

use mq_models::MediaItem;

/// A post-processing job as submitted by the API side.
///
/// `post_id` is stable across retries of the same logical request; `s3_key`
/// is the key prefix inside the bucket and ends with a slash by convention.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessPostJob {
    pub post_id: String,
    pub media: Vec<MediaItem>,
    pub s3_key: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

impl ProcessPostJob {
    /// Key used to reject duplicate submissions while one is in flight.
    pub fn idempotency_key(&self) -> String {
        format!("process:{}", self.post_id)
    }
}

/// Best-effort cleanup of the original uploads of a failed post.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupFailedMediaJob {
    pub post_id: String,
    pub s3_key: String,
    pub filenames: Vec<String>,
}

impl CleanupFailedMediaJob {
    pub fn idempotency_key(&self) -> String {
        format!("cleanup:{}", self.post_id)
    }
}

/// Envelope for anything a stream can carry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueueJob {
    ProcessPost(ProcessPostJob),
    CleanupFailedMedia(CleanupFailedMediaJob),
}

impl QueueJob {
    pub fn post_id(&self) -> &str {
        match self {
            QueueJob::ProcessPost(j) => &j.post_id,
            QueueJob::CleanupFailedMedia(j) => &j.post_id,
        }
    }

    pub fn idempotency_key(&self) -> String {
        match self {
            QueueJob::ProcessPost(j) => j.idempotency_key(),
            QueueJob::CleanupFailedMedia(j) => j.idempotency_key(),
        }
    }
}
