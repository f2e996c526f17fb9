//! Worker host: queue consumption, concurrency, graceful drain.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use mq_queue::{JobQueue, QueueJob};

use crate::cleanup::CleanupWorker;
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::executor::PostProcessor;

/// Pulls jobs from the broker and dispatches them to executor instances.
pub struct WorkerHost {
    config: WorkerConfig,
    queue: Arc<JobQueue>,
    cleanup_queue: Arc<JobQueue>,
    processor: Arc<PostProcessor>,
    cleanup: Arc<CleanupWorker>,
    job_semaphore: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
    cancel: watch::Sender<bool>,
    consumer_name: String,
}

impl WorkerHost {
    pub fn new(
        config: WorkerConfig,
        queue: JobQueue,
        cleanup_queue: JobQueue,
        processor: PostProcessor,
        cleanup: CleanupWorker,
    ) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.concurrency));
        let (shutdown, _) = watch::channel(false);
        let (cancel, _) = watch::channel(false);
        let consumer_name = format!("worker-{}", Uuid::new_v4());

        Self {
            config,
            queue: Arc::new(queue),
            cleanup_queue: Arc::new(cleanup_queue),
            processor: Arc::new(processor),
            cleanup: Arc::new(cleanup),
            job_semaphore,
            shutdown,
            cancel,
            consumer_name,
        }
    }

    /// Run until shutdown is signalled and in-flight jobs have drained.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            consumer = %self.consumer_name,
            concurrency = self.config.concurrency,
            "Starting worker host"
        );

        self.queue.init().await?;
        self.cleanup_queue.init().await?;

        let claim_task = self.spawn_claim_task();
        let cleanup_task = self.spawn_cleanup_task();

        let mut shutdown_rx = self.shutdown.subscribe();
        loop {
            if *shutdown_rx.borrow() {
                info!("Shutdown signal received, draining");
                break;
            }
            tokio::select! {
                _ = shutdown_rx.changed() => {}
                result = self.consume_jobs() => {
                    if let Err(e) = result {
                        error!("Error consuming jobs: {}", e);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }

        claim_task.abort();
        cleanup_task.abort();

        // Let in-flight jobs finish; cancel whatever is left.
        info!("Waiting for in-flight jobs to complete...");
        if tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_jobs())
            .await
            .is_err()
        {
            warn!("Drain timed out, cancelling remaining jobs");
            self.cancel.send_replace(true);
            let _ = tokio::time::timeout(Duration::from_secs(10), self.wait_for_jobs()).await;
        }

        info!("Worker host stopped");
        Ok(())
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    async fn consume_jobs(&self) -> WorkerResult<()> {
        let available = self.job_semaphore.available_permits();
        if available == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let jobs = self
            .queue
            .consume(&self.consumer_name, 1000, available)
            .await?;

        for (message_id, job) in jobs {
            self.dispatch(message_id, job).await?;
        }

        Ok(())
    }

    async fn dispatch(&self, message_id: String, job: QueueJob) -> WorkerResult<()> {
        let permit = self
            .job_semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| WorkerError::invalid_job("semaphore closed"))?;

        let processor = Arc::clone(&self.processor);
        let queue = Arc::clone(&self.queue);
        let cancel = self.cancel.subscribe();

        tokio::spawn(async move {
            let _permit = permit;
            Self::execute_job(processor, queue, message_id, job, cancel).await;
        });

        Ok(())
    }

    /// Execute a single job with retry and DLQ bookkeeping.
    async fn execute_job(
        processor: Arc<PostProcessor>,
        queue: Arc<JobQueue>,
        message_id: String,
        job: QueueJob,
        cancel: watch::Receiver<bool>,
    ) {
        let QueueJob::ProcessPost(post_job) = &job else {
            warn!("Unexpected job kind on the processing stream, dropping");
            queue.ack(&message_id).await.ok();
            queue.clear_dedup(&job).await.ok();
            return;
        };

        // The broker supplies the 1-based attempt ordinal.
        let attempt = queue.retry_count(&message_id).await.unwrap_or(0) + 1;
        info!(post_id = %post_job.post_id, attempt, "Executing job");

        match processor.process(post_job, attempt, cancel).await {
            Ok(_) => {
                if let Err(e) = queue.ack(&message_id).await {
                    error!(post_id = %post_job.post_id, "Failed to ack: {}", e);
                }
                queue.clear_dedup(&job).await.ok();
            }
            Err(e) if e.is_cancelled() => {
                // Not acked: the message stays pending and the broker's
                // visibility timeout hands it to a later attempt.
                info!(post_id = %post_job.post_id, "Job cancelled, leaving for redelivery");
            }
            Err(e) if !e.is_retryable() => {
                warn!(post_id = %post_job.post_id, "Dead-lettering non-retryable job: {}", e);
                if let Err(dlq_err) = queue.dlq(&message_id, &job, &e.to_string()).await {
                    error!(post_id = %post_job.post_id, "DLQ move failed: {}", dlq_err);
                }
                queue.clear_dedup(&job).await.ok();
            }
            Err(e) => {
                let retries = queue.increment_retry(&message_id).await.unwrap_or(u32::MAX);
                if retries >= queue.max_retries() {
                    warn!(
                        post_id = %post_job.post_id,
                        retries,
                        "Retries exhausted, dead-lettering: {}",
                        e
                    );
                    if let Err(dlq_err) = queue.dlq(&message_id, &job, &e.to_string()).await {
                        error!(post_id = %post_job.post_id, "DLQ move failed: {}", dlq_err);
                    }
                    queue.clear_dedup(&job).await.ok();
                } else {
                    info!(
                        post_id = %post_job.post_id,
                        retries,
                        max_retries = queue.max_retries(),
                        "Job failed, will be redelivered"
                    );
                }
            }
        }
    }

    /// Periodically adopt jobs whose worker died mid-attempt.
    fn spawn_claim_task(&self) -> tokio::task::JoinHandle<()> {
        let queue = Arc::clone(&self.queue);
        let processor = Arc::clone(&self.processor);
        let semaphore = Arc::clone(&self.job_semaphore);
        let cancel_rx = self.cancel.subscribe();
        let consumer_name = self.consumer_name.clone();
        let claim_interval = self.config.claim_interval;
        let min_idle_ms = self.config.claim_min_idle.as_millis() as u64;
        let mut shutdown_rx = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(claim_interval);
            loop {
                if *shutdown_rx.borrow() {
                    break;
                }
                tokio::select! {
                    _ = shutdown_rx.changed() => {}
                    _ = interval.tick() => {
                        match queue.claim_pending(&consumer_name, min_idle_ms, 5).await {
                            Ok(jobs) if !jobs.is_empty() => {
                                info!("Claimed {} stalled jobs", jobs.len());
                                for (message_id, job) in jobs {
                                    let Ok(permit) = semaphore.clone().acquire_owned().await else {
                                        return;
                                    };
                                    let processor = Arc::clone(&processor);
                                    let queue = Arc::clone(&queue);
                                    let cancel = cancel_rx.clone();
                                    tokio::spawn(async move {
                                        let _permit = permit;
                                        Self::execute_job(processor, queue, message_id, job, cancel)
                                            .await;
                                    });
                                }
                            }
                            Ok(_) => {}
                            Err(e) => warn!("Failed to claim stalled jobs: {}", e),
                        }
                    }
                }
            }
        })
    }

    /// Single-concurrency consumer for cleanup jobs.
    fn spawn_cleanup_task(&self) -> tokio::task::JoinHandle<()> {
        let queue = Arc::clone(&self.cleanup_queue);
        let cleanup = Arc::clone(&self.cleanup);
        let consumer_name = format!("cleaner-{}", Uuid::new_v4());
        let mut shutdown_rx = self.shutdown.subscribe();

        tokio::spawn(async move {
            loop {
                if *shutdown_rx.borrow() {
                    break;
                }
                tokio::select! {
                    _ = shutdown_rx.changed() => {}
                    result = queue.consume(&consumer_name, 5000, 1) => {
                        match result {
                            Ok(jobs) => {
                                for (message_id, job) in jobs {
                                    match &job {
                                        QueueJob::CleanupFailedMedia(cleanup_job) => {
                                            if let Err(e) = cleanup.process(cleanup_job).await {
                                                warn!(
                                                    post_id = %cleanup_job.post_id,
                                                    "Cleanup job failed: {}",
                                                    e
                                                );
                                            }
                                        }
                                        _ => {
                                            warn!("Unexpected job kind on the cleanup stream");
                                        }
                                    }
                                    queue.ack(&message_id).await.ok();
                                    queue.clear_dedup(&job).await.ok();
                                }
                            }
                            Err(e) => {
                                debug!("Cleanup consumer error: {}", e);
                                tokio::time::sleep(Duration::from_secs(5)).await;
                            }
                        }
                    }
                }
            }
        })
    }

    async fn wait_for_jobs(&self) {
        loop {
            if self.job_semaphore.available_permits() == self.config.concurrency {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}
