//! Pipeline error types.

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Storage error: {0}")]
    Storage(#[from] csense_storage::StorageError),

    #[error("Firestore error: {0}")]
    Firestore(#[from] csense_firestore::FirestoreError),

    #[error("Payload error: {0}")]
    Payload(#[from] csense_models::PayloadError),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}
