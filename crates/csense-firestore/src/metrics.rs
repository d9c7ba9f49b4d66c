//! Firestore metrics collection.
//!
//! - Request counters by operation and status
//! - Latency histograms
//! - Retry counters

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Total Firestore requests by operation and status.
    pub const REQUESTS_TOTAL: &str = "firestore_requests_total";

    /// Total retry attempts by operation.
    pub const RETRIES_TOTAL: &str = "firestore_retries_total";

    /// Request latency in seconds by operation.
    pub const LATENCY_SECONDS: &str = "firestore_latency_seconds";

    /// Subscription polls that published a changed result set.
    pub const SUBSCRIPTION_UPDATES_TOTAL: &str = "firestore_subscription_updates_total";
}

/// Record metrics for a completed Firestore request.
pub fn record_request(operation: &str, status: u16, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "operation" => operation.to_string()
    )
    .record(latency_ms / 1000.0);
}

/// Record a retry attempt.
pub fn record_retry(operation: &str) {
    counter!(
        names::RETRIES_TOTAL,
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Record a subscription publishing new data.
pub fn record_subscription_update(collection: &str) {
    counter!(
        names::SUBSCRIPTION_UPDATES_TOTAL,
        "collection" => collection.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::REQUESTS_TOTAL.contains("requests"));
        assert!(names::RETRIES_TOTAL.contains("retries"));
        assert!(names::LATENCY_SECONDS.contains("latency"));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_request("get_document", 200, 12.5);
        record_retry("get_document");
        record_subscription_update("analyses");
    }
}
