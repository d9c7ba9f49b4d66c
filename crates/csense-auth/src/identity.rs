//! Firebase Auth REST client for email/password accounts.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info_span, Instrument};

use crate::error::{AuthError, AuthResult};

const IDENTITY_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// Identity client configuration.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    /// Web API key of the Firebase project
    pub api_key: String,
    /// Auth emulator address (`host:port` or full URL)
    pub emulator_host: Option<String>,
    /// Request timeout
    pub timeout: Duration,
}

impl IdentityConfig {
    /// Create config from environment variables.
    pub fn from_env() -> AuthResult<Self> {
        let api_key = std::env::var("FIREBASE_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AuthError::Config("FIREBASE_API_KEY must be set".to_string()))?;

        let timeout_secs: u64 = std::env::var("IDENTITY_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        Ok(Self {
            api_key,
            emulator_host: std::env::var("FIREBASE_AUTH_EMULATOR_HOST")
                .ok()
                .filter(|h| !h.is_empty()),
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Config for a local auth emulator.
    pub fn emulator(host: impl Into<String>) -> Self {
        Self {
            api_key: "fake-api-key".to_string(),
            emulator_host: Some(host.into()),
            timeout: Duration::from_secs(10),
        }
    }

    fn base_url(&self) -> String {
        match &self.emulator_host {
            Some(host) if host.starts_with("http://") || host.starts_with("https://") => {
                format!("{}/identitytoolkit.googleapis.com/v1", host.trim_end_matches('/'))
            }
            Some(host) => format!("http://{}/identitytoolkit.googleapis.com/v1", host),
            None => IDENTITY_BASE_URL.to_string(),
        }
    }
}

/// Signed-in account as returned by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Provider user ID
    pub uid: String,
    pub email: String,
    pub id_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    #[serde(default)]
    email: String,
    id_token: String,
    #[serde(default)]
    refresh_token: String,
}

impl From<AccountResponse> for Session {
    fn from(r: AccountResponse) -> Self {
        Self {
            uid: r.local_id,
            email: r.email,
            id_token: r.id_token,
            refresh_token: r.refresh_token,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Firebase Auth REST client.
#[derive(Clone)]
pub struct IdentityClient {
    http: Client,
    config: IdentityConfig,
    base_url: String,
}

impl IdentityClient {
    pub fn new(config: IdentityConfig) -> AuthResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("csense-auth/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let base_url = config.base_url();

        Ok(Self {
            http,
            config,
            base_url,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> AuthResult<Self> {
        Self::new(IdentityConfig::from_env()?)
    }

    /// Sign in with email and password.
    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<Session> {
        let account: AccountResponse = self
            .post(
                "accounts:signInWithPassword",
                &json!({
                    "email": email.trim(),
                    "password": password,
                    "returnSecureToken": true,
                }),
            )
            .await?;
        Ok(account.into())
    }

    /// Create an email/password account and sign it in.
    pub async fn sign_up(&self, email: &str, password: &str) -> AuthResult<Session> {
        let account: AccountResponse = self
            .post(
                "accounts:signUp",
                &json!({
                    "email": email.trim(),
                    "password": password,
                    "returnSecureToken": true,
                }),
            )
            .await?;
        Ok(account.into())
    }

    /// Set the display name of the signed-in account.
    pub async fn update_display_name(&self, id_token: &str, name: &str) -> AuthResult<()> {
        let _: serde_json::Value = self
            .post(
                "accounts:update",
                &json!({
                    "idToken": id_token,
                    "displayName": name,
                    "returnSecureToken": false,
                }),
            )
            .await?;
        Ok(())
    }

    /// Email a password reset link.
    pub async fn send_password_reset(&self, email: &str) -> AuthResult<()> {
        let _: serde_json::Value = self
            .post(
                "accounts:sendOobCode",
                &json!({
                    "requestType": "PASSWORD_RESET",
                    "email": email.trim(),
                }),
            )
            .await?;
        Ok(())
    }

    async fn post<B, R>(&self, endpoint: &str, body: &B) -> AuthResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, endpoint);
        let span = info_span!("identity_request", endpoint = %endpoint);

        async {
            let response = self
                .http
                .post(&url)
                .query(&[("key", self.config.api_key.as_str())])
                .json(body)
                .send()
                .await?;

            let status = response.status();
            let text = response.text().await?;

            if !status.is_success() {
                debug!(status = status.as_u16(), "Identity request rejected");
                return Err(match serde_json::from_str::<ErrorEnvelope>(&text) {
                    Ok(envelope) => AuthError::from_rest_message(&envelope.error.message),
                    Err(_) => AuthError::InvalidResponse(format!("HTTP {}: {}", status, text)),
                });
            }

            serde_json::from_str(&text).map_err(|e| AuthError::InvalidResponse(e.to_string()))
        }
        .instrument(span)
        .await
    }
}
