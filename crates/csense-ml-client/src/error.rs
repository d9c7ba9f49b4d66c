//! ML client error types.

use thiserror::Error;

pub type MlResult<T> = Result<T, MlError>;

#[derive(Debug, Error)]
pub enum MlError {
    /// DNS or connect failure; the service could not be reached at all.
    #[error("ML service unreachable: {0}")]
    Unreachable(String),

    /// No response within the configured timeout.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Any other failure while sending or receiving.
    #[error("{0}")]
    Transport(String),

    #[error("Server returned {0}. Check your ML endpoint.")]
    Status(u16),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for MlError {
    fn from(e: reqwest::Error) -> Self {
        let message = error_chain(&e);
        if e.is_connect() {
            MlError::Unreachable(message)
        } else if e.is_timeout() {
            MlError::Timeout(message)
        } else {
            MlError::Transport(message)
        }
    }
}

/// Render an error and all of its sources, outermost first.
fn error_chain(e: &dyn std::error::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
