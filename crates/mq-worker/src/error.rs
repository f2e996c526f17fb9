//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid job: {0}")]
    InvalidJob(String),

    #[error("No master playlist produced for media {0}")]
    MasterPlaylistMissing(String),

    #[error("Job cancelled")]
    Cancelled,

    #[error("Storage error: {0}")]
    Storage(#[from] mq_storage::StorageError),

    #[error("Media error: {0}")]
    Media(#[from] mq_media::MediaError),

    #[error("Queue error: {0}")]
    Queue(#[from] mq_queue::QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn invalid_job(msg: impl Into<String>) -> Self {
        Self::InvalidJob(msg.into())
    }

    /// Cancelled attempts revert to the broker's redelivery semantics and
    /// emit no terminal callback.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, WorkerError::Cancelled)
            || matches!(self, WorkerError::Media(mq_media::MediaError::Cancelled))
    }

    /// Contract violations gain nothing from a retry.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, WorkerError::InvalidJob(_))
    }
}
