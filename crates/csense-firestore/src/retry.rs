//! Backoff for transient Firestore failures.

use std::time::Duration;

use rand::Rng;
use tracing::{info_span, warn, Instrument};

use crate::error::FirestoreResult;
use crate::metrics::record_retry;

/// How often and how patiently transient failures are retried.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// First backoff step, also the floor for every wait (ms).
    pub base_delay_ms: u64,
    /// Ceiling for the exponential step (ms).
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
        }
    }
}

impl RetryConfig {
    /// Read `FIRESTORE_MAX_RETRIES`, `FIRESTORE_RETRY_BASE_MS` and
    /// `FIRESTORE_RETRY_MAX_MS`, defaulting each one independently.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_retries: env_or("FIRESTORE_MAX_RETRIES", defaults.max_retries),
            base_delay_ms: env_or("FIRESTORE_RETRY_BASE_MS", defaults.base_delay_ms),
            max_delay_ms: env_or("FIRESTORE_RETRY_MAX_MS", defaults.max_delay_ms),
        }
    }

    /// Policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Wait before retry number `attempt` (0-based). A server-supplied hint
    /// wins; otherwise a random point in the capped exponential window.
    fn backoff(&self, attempt: u32, retry_after_ms: Option<u64>) -> Duration {
        if let Some(after) = retry_after_ms {
            return Duration::from_millis(after);
        }

        let window = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt))
            .min(self.max_delay_ms);
        let jittered = rand::rng().random_range(0..=window);

        Duration::from_millis(jittered.max(self.base_delay_ms))
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Run `op` until it succeeds, fails permanently, or retries run out.
///
/// Only errors whose [`is_retryable`](crate::FirestoreError::is_retryable)
/// holds are retried: network failures, 429 and 5xx.
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    operation: &str,
    op: F,
) -> FirestoreResult<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = FirestoreResult<T>>,
{
    let mut attempt = 0;
    loop {
        let span = info_span!("firestore_retry", operation = %operation, attempt = attempt + 1);
        let err = match op().instrument(span).await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !err.is_retryable() || attempt >= config.max_retries {
            return Err(err);
        }

        let delay = config.backoff(attempt, err.retry_after_ms());
        warn!(
            operation = %operation,
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            "Firestore operation failed, retrying: {}",
            err
        );
        record_retry(operation);

        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
