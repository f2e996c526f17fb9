//! Outbound callback payloads.

use serde::Serialize;

use crate::result::{ItemResult, PostStatus};

/// In-flight progress notification.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub post_id: String,
    pub progress: f64,
    pub message: String,
    pub attempt: u32,
    pub status: PostStatus,
    #[serde(rename = "type")]
    pub event: &'static str,
    pub current_media: u32,
    pub total_media: u32,
}

/// Terminal success notification.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingComplete {
    pub post_id: String,
    pub media_results: Vec<ItemResult>,
    pub total_processed: u32,
    pub attempt: u32,
    pub status: PostStatus,
    pub progress: f64,
    pub message: String,
}

/// Terminal failure notification.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingFailed {
    pub post_id: String,
    pub error: String,
    pub attempt: u32,
    pub status: PostStatus,
    pub progress: f64,
    pub message: String,
}

/// Any payload the notifier can POST.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CallbackPayload {
    Progress(ProgressUpdate),
    Complete(ProcessingComplete),
    Failed(ProcessingFailed),
}

impl CallbackPayload {
    pub fn progress(
        post_id: impl Into<String>,
        progress: f64,
        message: impl Into<String>,
        attempt: u32,
        current_media: u32,
        total_media: u32,
    ) -> Self {
        CallbackPayload::Progress(ProgressUpdate {
            post_id: post_id.into(),
            progress,
            message: message.into(),
            attempt,
            status: PostStatus::Processing,
            event: "progress",
            current_media,
            total_media,
        })
    }

    pub fn complete(
        post_id: impl Into<String>,
        media_results: Vec<ItemResult>,
        attempt: u32,
    ) -> Self {
        let total_processed = media_results.len() as u32;
        CallbackPayload::Complete(ProcessingComplete {
            post_id: post_id.into(),
            media_results,
            total_processed,
            attempt,
            status: PostStatus::Success,
            progress: 100.0,
            message: "Media processing completed successfully".to_string(),
        })
    }

    pub fn failed(
        post_id: impl Into<String>,
        error: impl Into<String>,
        attempt: u32,
        progress: f64,
        message: impl Into<String>,
    ) -> Self {
        CallbackPayload::Failed(ProcessingFailed {
            post_id: post_id.into(),
            error: error.into(),
            attempt,
            status: PostStatus::Failed,
            progress,
            message: message.into(),
        })
    }

    /// Terminal payloads end the attempt; at most one may fire.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CallbackPayload::Complete(_) | CallbackPayload::Failed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_payload_shape() {
        let payload = CallbackPayload::progress("p1", 42.5, "Transcoding a.mp4...", 1, 1, 2);
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"type\":\"progress\""));
        assert!(json.contains("\"status\":\"processing\""));
        assert!(json.contains("\"currentMedia\":1"));
        assert!(json.contains("\"totalMedia\":2"));
        assert!(!payload.is_terminal());
    }

    #[test]
    fn test_complete_payload_shape() {
        let payload = CallbackPayload::complete("p1", vec![], 2);
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"status\":\"success\""));
        assert!(json.contains("\"progress\":100.0"));
        assert!(json.contains("\"totalProcessed\":0"));
        assert!(json.contains("Media processing completed successfully"));
        assert!(!json.contains("\"type\""));
        assert!(payload.is_terminal());
    }

    #[test]
    fn test_failed_payload_keeps_max_progress() {
        let payload = CallbackPayload::failed("p1", "encode failed", 3, 65.0, "Processing failed");
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"status\":\"failed\""));
        assert!(json.contains("\"progress\":65.0"));
        assert!(json.contains("\"attempt\":3"));
        assert!(payload.is_terminal());
    }
}
