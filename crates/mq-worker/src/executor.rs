//! Per-job execution: resumable item loop, progress accounting, cleanup,
//! terminal notification.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info};

use mq_models::{ItemResult, MediaItem, PostOutcome, PostStatus};
use mq_queue::{ProcessPostJob, ProgressStore};
use mq_storage::BlobClient;

use crate::accounting::ProgressLedger;
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::image::process_image_item;
use crate::notifier::Notifier;
use crate::reporter::ProgressReporter;
use crate::scratch::ScratchSpace;
use crate::video::{process_video_item, EncodeBridge};

/// Executes one post job per call.
///
/// Success and failure handling are mutually exclusive per attempt, so at
/// most one terminal callback ever fires. A cancelled attempt emits none and
/// leaves the progress store untouched for the next delivery.
pub struct PostProcessor {
    config: WorkerConfig,
    store: Arc<ProgressStore>,
    blob: Arc<BlobClient>,
    notifier: Arc<dyn Notifier>,
}

impl PostProcessor {
    pub fn new(
        config: WorkerConfig,
        store: Arc<ProgressStore>,
        blob: Arc<BlobClient>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            store,
            blob,
            notifier,
        }
    }

    /// Run one attempt of a job to its terminal state.
    pub async fn process(
        &self,
        job: &ProcessPostJob,
        attempt: u32,
        cancel: watch::Receiver<bool>,
    ) -> WorkerResult<PostOutcome> {
        if job.media.is_empty() {
            return Err(WorkerError::invalid_job(format!(
                "post {} has no media",
                job.post_id
            )));
        }

        let reporter = ProgressReporter::new(
            Arc::clone(&self.store),
            Arc::clone(&self.notifier),
            job.callback_url.clone(),
            &job.post_id,
            attempt,
            job.media.len() as u32,
            self.config.progress_interval,
        );
        let mut scratch = ScratchSpace::new(&self.config, &job.post_id);

        match self.run(job, &reporter, &scratch, cancel).await {
            Ok(outcome) => {
                scratch.purge().await;
                reporter.notify_success(&outcome.media_results).await;
                info!(
                    post_id = %job.post_id,
                    attempt,
                    processed = outcome.total_processed,
                    "Post processed"
                );
                Ok(outcome)
            }
            Err(e) if e.is_cancelled() => {
                info!(post_id = %job.post_id, attempt, "Attempt cancelled");
                scratch.purge().await;
                Err(WorkerError::Cancelled)
            }
            Err(e) => {
                error!(post_id = %job.post_id, attempt, "Attempt failed: {}", e);
                let max = reporter.mark_failed(&e.to_string(), 0).await;
                scratch.purge().await;
                reporter.notify_failure(&e.to_string(), max).await;
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        job: &ProcessPostJob,
        reporter: &ProgressReporter,
        scratch: &ScratchSpace,
        cancel: watch::Receiver<bool>,
    ) -> WorkerResult<PostOutcome> {
        let total = job.media.len();
        let mut ledger = ProgressLedger::new(total);
        let mut results: Vec<Option<ItemResult>> = vec![None; total];

        // Resume: credit completed items and seed their cached results at
        // their original index so output order matches input order. An item
        // whose cached result expired is re-processed, not trusted.
        let marked: HashSet<String> =
            self.store.completed(&job.post_id).await.into_iter().collect();
        let mut completed = HashSet::new();
        for (index, item) in job.media.iter().enumerate() {
            if !marked.contains(item.media_id()) {
                continue;
            }
            if let Some(result) = self.store.result(&job.post_id, item.media_id()).await {
                ledger.restore_completed(index);
                results[index] = Some(result);
                completed.insert(item.media_id().to_string());
            }
        }

        if !completed.is_empty() {
            info!(
                post_id = %job.post_id,
                resumed = completed.len(),
                "Resuming with previously completed items"
            );
        }

        reporter
            .update(ledger.percentage(), "Starting media processing", 0, true)
            .await;

        for (index, item) in job.media.iter().enumerate() {
            if *cancel.borrow() {
                return Err(WorkerError::Cancelled);
            }

            let current = (index + 1) as u32;
            reporter
                .update(
                    ledger.percentage(),
                    &format!("Processing {}/{}: {}", current, total, item.filename()),
                    current,
                    true,
                )
                .await;

            if completed.contains(item.media_id()) {
                debug!(
                    post_id = %job.post_id,
                    media_id = item.media_id(),
                    "Already processed, reusing cached result"
                );
                continue;
            }

            let dirs = scratch.reset_item(item.media_id()).await?;

            let input_key = format!("{}original/{}", job.s3_key, item.filename());
            let signed_url = self
                .blob
                .presign_get(&input_key, self.config.signed_url_ttl)
                .await?;
            let input_path = dirs.download.join(item.filename());
            let mut download_cancel = cancel.clone();
            tokio::select! {
                result = self.blob.download_to_file(&signed_url, &input_path) => result?,
                _ = wait_cancelled(&mut download_cancel) => return Err(WorkerError::Cancelled),
            }

            ledger.record_download(index);
            reporter
                .update(
                    ledger.percentage(),
                    &format!("Downloaded {}", item.filename()),
                    current,
                    false,
                )
                .await;

            let result = match item {
                MediaItem::Video(video) => {
                    let mut bridge = EncodeBridge {
                        reporter,
                        ledger: &mut ledger,
                        item_index: index,
                        current_media: current,
                    };
                    process_video_item(
                        video,
                        &input_path,
                        &dirs.output,
                        &job.s3_key,
                        &self.blob,
                        cancel.clone(),
                        &mut bridge,
                    )
                    .await?
                }
                MediaItem::Image(image) => {
                    process_image_item(
                        image,
                        &input_path,
                        &dirs.output,
                        &job.s3_key,
                        &self.blob,
                        cancel.clone(),
                    )
                    .await?
                }
            };

            self.store.mark_completed(&job.post_id, item.media_id()).await;
            self.store
                .set_result(&job.post_id, item.media_id(), &result)
                .await;
            results[index] = Some(result);

            ledger.complete_item(index);
            reporter
                .update(
                    ledger.percentage(),
                    &format!("Completed {}", item.filename()),
                    current,
                    true,
                )
                .await;
        }

        // Finalisation: the cap lifts only here.
        reporter
            .update(
                ledger.percentage(),
                "Uploading processed files...",
                total as u32,
                true,
            )
            .await;
        reporter
            .update(100.0, "Finalizing...", total as u32, true)
            .await;

        let media_results: Vec<ItemResult> = results.into_iter().flatten().collect();
        let total_processed = media_results.len() as u32;

        Ok(PostOutcome {
            post_id: job.post_id.clone(),
            media_results,
            total_processed,
            status: PostStatus::Success,
        })
    }
}

/// Resolve once cancellation is requested; never resolves if the sender
/// goes away without cancelling.
async fn wait_cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
