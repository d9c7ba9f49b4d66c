//! Access tokens for Firestore requests.
//!
//! Service-account tokens are cached and refreshed shortly before they
//! expire; concurrent callers share one refresh. The emulator gets a fixed
//! token instead.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use gcp_auth::TokenProvider;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{FirestoreError, FirestoreResult};

/// Tokens are refreshed this long before they expire.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// OAuth scope for Firestore/Datastore access.
pub const FIRESTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

/// Token the Firestore emulator accepts as an admin credential.
pub const EMULATOR_TOKEN: &str = "owner";

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn issued(access_token: String, expires_at: DateTime<Utc>) -> Self {
        // Already expired: zero lifetime forces a refresh on next use
        let ttl = (expires_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        Self {
            access_token,
            expires_at: Instant::now() + ttl,
        }
    }

    /// Fresh enough that no refresh is due.
    fn is_fresh(&self) -> bool {
        Instant::now() + TOKEN_REFRESH_MARGIN < self.expires_at
    }

    /// Not yet expired, even if a refresh is due.
    fn is_live(&self) -> bool {
        Instant::now() < self.expires_at
    }

    fn fresh_token(slot: &Option<Self>) -> Option<String> {
        slot.as_ref()
            .filter(|t| t.is_fresh())
            .map(|t| t.access_token.clone())
    }
}

enum TokenSource {
    Provider(Arc<dyn TokenProvider>),
    Fixed(String),
}

/// Shared access-token cache.
pub struct TokenCache {
    source: TokenSource,
    cache: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    /// Cache tokens issued by a service account provider.
    pub fn new(auth: Arc<dyn TokenProvider>) -> Self {
        Self {
            source: TokenSource::Provider(auth),
            cache: RwLock::new(None),
        }
    }

    /// Always hand out the same token (emulator).
    pub fn fixed(token: impl Into<String>) -> Self {
        Self {
            source: TokenSource::Fixed(token.into()),
            cache: RwLock::new(None),
        }
    }

    /// Drop the cached token so the next call fetches a new one.
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    /// Current access token, refreshing it when due.
    pub async fn get_token(&self) -> FirestoreResult<String> {
        let auth = match &self.source {
            TokenSource::Fixed(token) => return Ok(token.clone()),
            TokenSource::Provider(auth) => auth,
        };

        if let Some(token) = CachedToken::fresh_token(&*self.cache.read().await) {
            return Ok(token);
        }

        let mut slot = self.cache.write().await;
        // Re-check: a concurrent caller may have refreshed already
        if let Some(token) = CachedToken::fresh_token(&slot) {
            return Ok(token);
        }

        match auth.token(&[FIRESTORE_SCOPE]).await {
            Ok(token) => {
                let cached = CachedToken::issued(token.as_str().to_string(), token.expires_at());
                let access_token = cached.access_token.clone();
                *slot = Some(cached);
                debug!("Refreshed Firestore auth token");
                Ok(access_token)
            }
            Err(e) => match slot.as_ref().filter(|t| t.is_live()) {
                Some(stale) => {
                    warn!("Token refresh failed, using existing token: {}", e);
                    Ok(stale.access_token.clone())
                }
                None => Err(FirestoreError::auth_error(format!(
                    "Failed to obtain auth token: {}",
                    e
                ))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issued_token_freshness() {
        let long = CachedToken::issued("a".into(), Utc::now() + chrono::Duration::minutes(30));
        assert!(long.is_fresh());
        assert!(long.is_live());

        // Inside the refresh margin: still usable but due for refresh
        let closing = CachedToken::issued("b".into(), Utc::now() + chrono::Duration::seconds(30));
        assert!(!closing.is_fresh());
        assert!(closing.is_live());

        let expired = CachedToken::issued("c".into(), Utc::now() - chrono::Duration::seconds(5));
        assert!(!expired.is_live());
        assert_eq!(CachedToken::fresh_token(&Some(expired)), None);
    }

    #[test]
    fn test_firestore_scope() {
        assert!(FIRESTORE_SCOPE.contains("datastore"));
    }

    #[tokio::test]
    async fn test_fixed_token_survives_invalidate() {
        let cache = TokenCache::fixed(EMULATOR_TOKEN);
        assert_eq!(cache.get_token().await.unwrap(), "owner");
        cache.invalidate().await;
        assert_eq!(cache.get_token().await.unwrap(), "owner");
    }
}
