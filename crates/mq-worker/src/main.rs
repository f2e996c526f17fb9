//! Media processing worker binary.

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mq_queue::{JobQueue, ProgressStore, QueueConfig};
use mq_storage::BlobClient;
use mq_worker::cleanup::CleanupWorker;
use mq_worker::{HttpNotifier, PostProcessor, WorkerConfig, WorkerHost};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    dotenvy::dotenv().ok();

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("mq_worker=info".parse().unwrap())
        .add_directive("mq_queue=info".parse().unwrap())
        .add_directive("mq_storage=info".parse().unwrap())
        .add_directive("mq_media=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting mq-worker");

    if let Err(e) = mq_media::check_ffmpeg() {
        warn!("ffmpeg preflight failed, encodes will not run: {}", e);
    }

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let queue_config = QueueConfig::from_env();
    let cleanup_config = queue_config.for_cleanup();

    let queue = match JobQueue::new(queue_config.clone()) {
        Ok(q) => q,
        Err(e) => {
            error!("Failed to create job queue: {}", e);
            std::process::exit(1);
        }
    };
    let cleanup_queue = match JobQueue::new(cleanup_config) {
        Ok(q) => q,
        Err(e) => {
            error!("Failed to create cleanup queue: {}", e);
            std::process::exit(1);
        }
    };

    let store = match ProgressStore::new(&queue_config.redis_url) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!("Failed to create progress store: {}", e);
            std::process::exit(1);
        }
    };

    let blob = match BlobClient::from_env() {
        Ok(b) => Arc::new(b),
        Err(e) => {
            error!("Failed to create blob client: {}", e);
            std::process::exit(1);
        }
    };

    let notifier = Arc::new(HttpNotifier::new());
    let processor = PostProcessor::new(
        config.clone(),
        Arc::clone(&store),
        Arc::clone(&blob),
        notifier,
    );
    let cleanup = CleanupWorker::new(Arc::clone(&blob));

    let host = Arc::new(WorkerHost::new(
        config,
        queue,
        cleanup_queue,
        processor,
        cleanup,
    ));

    let signal_host = Arc::clone(&host);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Received shutdown signal");
        signal_host.shutdown();
    });

    if let Err(e) = host.run().await {
        error!("Worker host error: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}

/// Resolve on SIGTERM or SIGINT.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
}
