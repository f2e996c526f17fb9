//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Concurrent jobs
    pub concurrency: usize,
    /// Root for per-post encoder output directories
    pub output_dir: PathBuf,
    /// Root for per-post download directories
    pub download_dir: PathBuf,
    /// Lifetime of presigned input URLs
    pub signed_url_ttl: Duration,
    /// Minimum gap between outbound progress notifications per post
    pub progress_interval: Duration,
    /// How often to scan for stalled pending jobs
    pub claim_interval: Duration,
    /// Minimum idle time before a pending job is considered stalled
    pub claim_min_idle: Duration,
    /// How long to let in-flight jobs drain on shutdown before cancelling
    pub shutdown_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            output_dir: PathBuf::from("output"),
            download_dir: PathBuf::from("downloads"),
            signed_url_ttl: Duration::from_secs(3600),
            progress_interval: Duration::from_millis(250),
            claim_interval: Duration::from_secs(60),
            claim_min_idle: Duration::from_secs(1800),
            shutdown_timeout: Duration::from_secs(60),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            concurrency: std::env::var("WORKER_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&n| n > 0)
                .unwrap_or(2),
            output_dir: std::env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("output")),
            download_dir: std::env::var("DOWNLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("downloads")),
            signed_url_ttl: Duration::from_secs(
                std::env::var("SIGNED_URL_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3600),
            ),
            progress_interval: Duration::from_millis(
                std::env::var("PROGRESS_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(250),
            ),
            claim_interval: Duration::from_secs(
                std::env::var("WORKER_CLAIM_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            claim_min_idle: Duration::from_secs(
                std::env::var("WORKER_CLAIM_MIN_IDLE_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1800),
            ),
            shutdown_timeout: Duration::from_secs(
                std::env::var("WORKER_SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
        }
    }
}
