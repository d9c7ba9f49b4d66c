//! Storage error types.

use csense_models::PayloadError;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to configure storage client: {0}")]
    ConfigError(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Presign failed: {0}")]
    PresignFailed(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error(transparent)]
    Payload(#[from] PayloadError),
}

impl StorageError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn upload_failed(msg: impl Into<String>) -> Self {
        Self::UploadFailed(msg.into())
    }

    pub fn delete_failed(msg: impl Into<String>) -> Self {
        Self::DeleteFailed(msg.into())
    }

    pub fn invalid_key(msg: impl Into<String>) -> Self {
        Self::InvalidKey(msg.into())
    }
}
