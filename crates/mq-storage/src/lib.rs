//! S3-compatible blob storage client.
//!
//! This crate provides:
//! - Presigned GET URL issuance
//! - Streaming download of signed URLs to local files
//! - File and directory upload with public URL derivation
//! - Prefix listing and batch deletion

pub mod client;
pub mod content_type;
pub mod error;

pub use client::{BlobClient, BlobConfig, UploadedFile};
pub use error::{StorageError, StorageResult};
