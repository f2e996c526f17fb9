//! Error types for media operations.

use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while driving ffmpeg.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("ffmpeg unavailable: {0}")]
    FfmpegUnavailable(String),

    #[error("ffmpeg exited with status {exit_code:?}: {stderr_tail}")]
    FfmpegFailed {
        exit_code: Option<i32>,
        stderr_tail: String,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
