//! S3-compatible blob storage for X-ray images.
//!
//! This crate provides:
//! - X-ray upload under `xrays/{user_id}/`
//! - Public or presigned retrieval URLs
//! - Deletion by URL

pub mod client;
pub mod error;
pub mod keys;

pub use client::{StorageClient, StorageConfig, PRESIGNED_URL_TTL, XRAY_CONTENT_TYPE};
pub use error::{StorageError, StorageResult};
pub use keys::{key_from_url, xray_key};
