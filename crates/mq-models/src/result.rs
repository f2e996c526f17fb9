//! Per-item results, post outcomes and progress snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Processing status reported in snapshots and callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Processing,
    Success,
    Failed,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Processing => "processing",
            PostStatus::Success => "success",
            PostStatus::Failed => "failed",
        }
    }
}

/// The derived artifacts for one processed item.
///
/// Tagged by `mediaType` on the wire. URLs are `None` when the stage that
/// derives them failed non-fatally or the upload could not be matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mediaType")]
pub enum ItemResult {
    #[serde(rename = "VIDEO")]
    Video(VideoResult),
    #[serde(rename = "IMAGE")]
    Image(ImageResult),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoResult {
    pub media_id: String,
    pub original_name: String,
    pub filename: String,
    pub status: PostStatus,
    pub master_playlist_url: Option<String>,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResult {
    pub media_id: String,
    pub original_name: String,
    pub filename: String,
    pub status: PostStatus,
    pub original_url: Option<String>,
    pub image_url: Option<String>,
    pub blurred_thumbnail_url: Option<String>,
}

impl ItemResult {
    pub fn media_id(&self) -> &str {
        match self {
            ItemResult::Video(v) => &v.media_id,
            ItemResult::Image(i) => &i.media_id,
        }
    }
}

/// Terminal value returned to the worker host for a successful attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostOutcome {
    pub post_id: String,
    pub media_results: Vec<ItemResult>,
    pub total_processed: u32,
    pub status: PostStatus,
}

/// Last-written progress state for a post, stored for observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub percentage: f64,
    pub message: String,
    pub status: PostStatus,
    pub current_media: u32,
    pub total_media: u32,
    pub updated_at: DateTime<Utc>,
}
