//! Authentication error types and user-facing messages.

use csense_firestore::FirestoreError;
use thiserror::Error;

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Fallback message for codes without a dedicated explanation.
pub const GENERIC_AUTH_MESSAGE: &str = "Authentication failed. Please try again.";

/// Errors that can occur while authenticating.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Rejected by the identity provider. `code` is the kebab-case provider code.
    #[error("Identity provider error ({code}): {detail}")]
    Provider { code: String, detail: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Profile store error: {0}")]
    Store(#[from] FirestoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not signed in")]
    NotSignedIn,
}

impl AuthError {
    pub fn provider(code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Provider {
            code: code.into(),
            detail: detail.into(),
        }
    }

    /// Build from a REST error message such as `WEAK_PASSWORD : Password should be ...`.
    pub fn from_rest_message(message: &str) -> Self {
        let (reason, detail) = match message.split_once(" : ") {
            Some((reason, detail)) => (reason.trim(), detail.trim()),
            None => (message.trim(), ""),
        };
        Self::provider(provider_code(reason), detail)
    }

    /// Provider code, or a stable code for local failures.
    pub fn code(&self) -> &str {
        match self {
            AuthError::Provider { code, .. } => code,
            AuthError::Network(_) => "network-request-failed",
            AuthError::NotSignedIn => "no-current-user",
            _ => "internal-error",
        }
    }

    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> &'static str {
        user_message(self.code())
    }
}

/// Map a REST reason (`EMAIL_NOT_FOUND`) to a provider code (`user-not-found`).
pub fn provider_code(reason: &str) -> String {
    match reason {
        "EMAIL_NOT_FOUND" => "user-not-found".to_string(),
        "INVALID_PASSWORD" => "wrong-password".to_string(),
        "INVALID_LOGIN_CREDENTIALS" => "invalid-credential".to_string(),
        "EMAIL_EXISTS" => "email-already-in-use".to_string(),
        "WEAK_PASSWORD" => "weak-password".to_string(),
        "INVALID_EMAIL" | "MISSING_EMAIL" => "invalid-email".to_string(),
        "TOO_MANY_ATTEMPTS_TRY_LATER" => "too-many-requests".to_string(),
        other => other.to_ascii_lowercase().replace('_', "-"),
    }
}

/// User-facing text for a provider code.
pub fn user_message(code: &str) -> &'static str {
    match code {
        "user-not-found" => "No account found with this email.",
        "wrong-password" | "invalid-credential" => "Incorrect email or password.",
        "email-already-in-use" => "An account already exists with this email.",
        "weak-password" => "Password must be at least 6 characters.",
        "invalid-email" => "Please enter a valid email address.",
        "too-many-requests" => "Too many attempts. Please try again later.",
        _ => GENERIC_AUTH_MESSAGE,
    }
}
