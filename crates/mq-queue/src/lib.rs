//! Redis Streams job queue and progress store.
//!
//! This crate provides:
//! - Job enqueueing via Redis Streams with dedup
//! - Worker consumption with retry, stalled-claim and DLQ
//! - The per-post progress store (max progress, completion set, result cache)

pub mod error;
pub mod job;
pub mod queue;
pub mod store;

pub use error::{QueueError, QueueResult};
pub use job::{CleanupFailedMediaJob, ProcessPostJob, QueueJob};
pub use queue::{JobQueue, QueueConfig};
pub use store::ProgressStore;
