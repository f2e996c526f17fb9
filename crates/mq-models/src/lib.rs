//! Shared types for the MediaQueue processing worker.
//!
//! This crate provides:
//! - Media item and per-item result types
//! - The video rendition ladder and selection rule
//! - Progress snapshots and callback payloads

pub mod callback;
pub mod item;
pub mod rendition;
pub mod result;

pub use callback::{CallbackPayload, ProcessingComplete, ProcessingFailed, ProgressUpdate};
pub use item::{ImageItem, MediaItem, VideoItem};
pub use rendition::{select_renditions, Rendition, RENDITION_LADDER};
pub use result::{ImageResult, ItemResult, PostOutcome, PostStatus, ProgressSnapshot, VideoResult};
