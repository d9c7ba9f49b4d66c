//! Image payloads.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("Failed to read image {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Image payload is empty")]
    Empty,
}

/// An X-ray image as handed over by a client.
///
/// Native clients hold a file on disk, browser clients hold the bytes in memory.
/// Callers resolve the payload to bytes before talking to storage or the
/// analysis service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePayload {
    FileHandle(PathBuf),
    InMemoryBytes(Vec<u8>),
}

impl ImagePayload {
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self::FileHandle(path.as_ref().to_path_buf())
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::InMemoryBytes(bytes.into())
    }

    /// Resolve to the image bytes. Empty images are rejected.
    pub async fn into_bytes(self) -> Result<Vec<u8>, PayloadError> {
        let bytes = match self {
            ImagePayload::FileHandle(path) => tokio::fs::read(&path)
                .await
                .map_err(|source| PayloadError::Read { path, source })?,
            ImagePayload::InMemoryBytes(bytes) => bytes,
        };

        if bytes.is_empty() {
            return Err(PayloadError::Empty);
        }
        Ok(bytes)
    }
}

impl From<Vec<u8>> for ImagePayload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::InMemoryBytes(bytes)
    }
}

impl From<PathBuf> for ImagePayload {
    fn from(path: PathBuf) -> Self {
        Self::FileHandle(path)
    }
}
