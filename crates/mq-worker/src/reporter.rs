//! Progress reporting with the monotone max-progress guard.
//!
//! Every reported value is resolved against the stored per-post maximum:
//! higher values are written back, lower ones are replaced by the stored
//! maximum before anything is emitted. Reported progress therefore never
//! regresses, even across attempts (the store itself is last-writer-wins;
//! attempts of one post are serialised by the broker's stalled policy).

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::warn;

use mq_models::{CallbackPayload, ItemResult, PostStatus, ProgressSnapshot};
use mq_queue::ProgressStore;

use crate::notifier::Notifier;

/// Emits snapshots and callbacks for one post attempt.
pub struct ProgressReporter {
    store: Arc<ProgressStore>,
    notifier: Arc<dyn Notifier>,
    callback_url: Option<String>,
    post_id: String,
    attempt: u32,
    total_media: u32,
    coalescer: Coalescer,
}

impl ProgressReporter {
    pub fn new(
        store: Arc<ProgressStore>,
        notifier: Arc<dyn Notifier>,
        callback_url: Option<String>,
        post_id: impl Into<String>,
        attempt: u32,
        total_media: u32,
        min_interval: Duration,
    ) -> Self {
        Self {
            store,
            notifier,
            callback_url,
            post_id: post_id.into(),
            attempt,
            total_media,
            coalescer: Coalescer::new(min_interval),
        }
    }

    /// Report a calculated percentage; returns the value actually reported.
    ///
    /// The max-progress guard always runs. Snapshot and callback emission is
    /// rate-limited unless `force` is set (item transitions, finalisation).
    pub async fn update(
        &self,
        percentage: f64,
        message: &str,
        current_media: u32,
        force: bool,
    ) -> f64 {
        let stored = self.store.max_progress(&self.post_id).await;
        let (reported, advanced) = resolve_monotone(percentage, stored);
        if advanced {
            self.store.set_max_progress(&self.post_id, reported).await;
        }

        if !self.coalescer.should_emit(force) {
            return reported;
        }

        self.store
            .snapshot_progress(
                &self.post_id,
                &ProgressSnapshot {
                    percentage: reported,
                    message: message.to_string(),
                    status: PostStatus::Processing,
                    current_media,
                    total_media: self.total_media,
                    updated_at: Utc::now(),
                },
            )
            .await;

        if let Some(url) = &self.callback_url {
            let payload = CallbackPayload::progress(
                &self.post_id,
                reported,
                message,
                self.attempt,
                current_media,
                self.total_media,
            );
            if let Err(e) = self.notifier.notify(url, &payload).await {
                warn!(post_id = %self.post_id, "Progress callback failed: {}", e);
            }
        }

        reported
    }

    /// Snapshot the failed state at the stored maximum; returns that maximum.
    pub async fn mark_failed(&self, message: &str, current_media: u32) -> f64 {
        let max = self.store.max_progress(&self.post_id).await;
        self.store
            .snapshot_progress(
                &self.post_id,
                &ProgressSnapshot {
                    percentage: max,
                    message: message.to_string(),
                    status: PostStatus::Failed,
                    current_media,
                    total_media: self.total_media,
                    updated_at: Utc::now(),
                },
            )
            .await;
        max
    }

    /// Terminal failure callback at the given (unchanged) progress.
    pub async fn notify_failure(&self, error: &str, progress: f64) {
        let Some(url) = &self.callback_url else {
            return;
        };
        let payload = CallbackPayload::failed(
            &self.post_id,
            error,
            self.attempt,
            progress,
            "Media processing failed",
        );
        if let Err(e) = self.notifier.notify(url, &payload).await {
            warn!(post_id = %self.post_id, "Failure callback failed: {}", e);
        }
    }

    /// Terminal success callback; skipped without a URL or results.
    pub async fn notify_success(&self, results: &[ItemResult]) {
        let Some(url) = &self.callback_url else {
            return;
        };
        if results.is_empty() {
            return;
        }
        let payload = CallbackPayload::complete(&self.post_id, results.to_vec(), self.attempt);
        if let Err(e) = self.notifier.notify(url, &payload).await {
            warn!(post_id = %self.post_id, "Success callback failed: {}", e);
        }
    }
}

/// Resolve a calculated value against the stored maximum.
/// Returns the value to report and whether the store should advance.
fn resolve_monotone(calculated: f64, stored: f64) -> (f64, bool) {
    if calculated > stored {
        (calculated, true)
    } else {
        (stored, false)
    }
}

/// Rate limiter for outbound progress traffic.
struct Coalescer {
    min_interval: Duration,
    last_emit: Mutex<Option<Instant>>,
}

impl Coalescer {
    fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_emit: Mutex::new(None),
        }
    }

    /// Whether to emit now; forced emissions also reset the window.
    fn should_emit(&self, force: bool) -> bool {
        let mut last = self.last_emit.lock().unwrap();
        let now = Instant::now();
        let due = last.map_or(true, |t| now.duration_since(t) >= self.min_interval);
        if force || due {
            *last = Some(now);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotone_resolution() {
        assert_eq!(resolve_monotone(42.0, 30.0), (42.0, true));
        assert_eq!(resolve_monotone(42.0, 60.0), (60.0, false));
        assert_eq!(resolve_monotone(60.0, 60.0), (60.0, false));
    }

    #[test]
    fn test_coalescer_suppresses_bursts() {
        let coalescer = Coalescer::new(Duration::from_secs(60));
        assert!(coalescer.should_emit(false));
        assert!(!coalescer.should_emit(false));
        assert!(!coalescer.should_emit(false));
    }

    #[test]
    fn test_coalescer_forced_emission() {
        let coalescer = Coalescer::new(Duration::from_secs(60));
        assert!(coalescer.should_emit(false));
        assert!(coalescer.should_emit(true));
    }

    #[test]
    fn test_coalescer_zero_interval_always_emits() {
        let coalescer = Coalescer::new(Duration::ZERO);
        assert!(coalescer.should_emit(false));
        assert!(coalescer.should_emit(false));
    }
}
