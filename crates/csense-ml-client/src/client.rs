//! ML service HTTP client.

use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, info, info_span, warn, Instrument};

use csense_models::{AnalysisResult, Diagnosis};

use crate::error::{MlError, MlResult};
use crate::types::{parse_diagnosis, AnalysisRequest, FILE_FIELD, FILE_NAME};

/// Failure message shown when the service cannot be reached at all.
pub const UNREACHABLE_MESSAGE: &str = "Cannot reach ML server. Check your network or endpoint URL.";

const DEFAULT_BASE_URL: &str = "http://localhost:8001";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Configuration for ML client.
#[derive(Debug, Clone)]
pub struct MlClientConfig {
    /// Base URL of ML service
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for MlClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl MlClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("ML_SERVICE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            timeout: Duration::from_secs(
                std::env::var("ML_SERVICE_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
        }
    }
}

/// Client for the chest X-ray classification service.
///
/// Cheap to clone; clones share the underlying connection pool. Each call
/// makes exactly one request and keeps no state between calls.
#[derive(Clone)]
pub struct MlClient {
    http: Client,
    config: MlClientConfig,
}

impl MlClient {
    /// Create a new ML client.
    pub fn new(config: MlClientConfig) -> MlResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("csense-ml-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MlError::Config(e.to_string()))?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> MlResult<Self> {
        Self::new(MlClientConfig::from_env())
    }

    pub fn config(&self) -> &MlClientConfig {
        &self.config
    }

    fn analyze_url(&self) -> String {
        format!("{}/analyze", self.config.base_url.trim_end_matches('/'))
    }

    /// Submit an image for classification.
    pub async fn submit(
        &self,
        image: Vec<u8>,
        image_url: impl Into<String>,
        request_heatmap: bool,
    ) -> AnalysisResult {
        self.analyze(AnalysisRequest::new(image, image_url).with_heatmap(request_heatmap))
            .await
    }

    /// Classify an X-ray and normalize every outcome into an [`AnalysisResult`].
    ///
    /// Never fails: unreachable service, transport errors, non-200 statuses and
    /// unparseable bodies all become [`AnalysisResult::Failure`].
    pub async fn analyze(&self, request: AnalysisRequest) -> AnalysisResult {
        let span = info_span!(
            "ml_analyze",
            image_url = %request.image_url,
            heatmap = request.request_heatmap,
            bytes = request.image.len()
        );

        let start = Instant::now();
        let outcome = self.try_analyze(request).instrument(span).await;
        let elapsed = start.elapsed();

        let result = match outcome {
            Ok(diagnosis) => {
                info!(
                    diagnosis = %diagnosis.label,
                    confidence = diagnosis.confidence,
                    latency_ms = elapsed.as_millis() as u64,
                    "ML analysis complete"
                );
                AnalysisResult::Success(diagnosis)
            }
            Err(e) => {
                warn!(latency_ms = elapsed.as_millis() as u64, "ML analysis failed: {}", e);
                AnalysisResult::failure(failure_message(&e))
            }
        };

        record_analysis(&result, elapsed);
        result
    }

    /// Single request to `/analyze`, surfacing the typed error.
    pub async fn try_analyze(&self, request: AnalysisRequest) -> MlResult<Diagnosis> {
        let url = self.analyze_url();
        let heatmap = request.heatmap_field();

        let part = Part::bytes(request.image)
            .file_name(FILE_NAME)
            .mime_str("image/jpeg")?;
        let form = Form::new()
            .text("image_url", request.image_url)
            .text("heatmap", heatmap)
            .part(FILE_FIELD, part);

        debug!("Sending analysis request to {}", url);

        let response = self.http.post(&url).multipart(form).send().await?;
        let status = response.status();

        if status != StatusCode::OK {
            return Err(MlError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let json: Value = serde_json::from_slice(&body)
            .map_err(|e| MlError::InvalidResponse(e.to_string()))?;

        parse_diagnosis(&json)
    }
}

fn failure_message(e: &MlError) -> String {
    match e {
        MlError::Unreachable(_) => UNREACHABLE_MESSAGE.to_string(),
        other => other.to_string(),
    }
}

fn record_analysis(result: &AnalysisResult, elapsed: Duration) {
    let outcome = if result.is_success() { "success" } else { "failure" };
    counter!("ml_analyze_requests_total", "outcome" => outcome).increment(1);
    histogram!("ml_analyze_latency_seconds").record(elapsed.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_config_defaults() {
        let config = MlClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8001");
        assert_eq!(config.timeout, Duration::from_secs(60));
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        std::env::set_var("ML_SERVICE_URL", "https://ml.internal");
        std::env::set_var("ML_SERVICE_TIMEOUT", "15");
        let config = MlClientConfig::from_env();
        std::env::remove_var("ML_SERVICE_URL");
        std::env::remove_var("ML_SERVICE_TIMEOUT");

        assert_eq!(config.base_url, "https://ml.internal");
        assert_eq!(config.timeout, Duration::from_secs(15));
    }

    #[test]
    #[serial]
    fn test_config_from_env_ignores_bad_timeout() {
        std::env::set_var("ML_SERVICE_TIMEOUT", "soon");
        let config = MlClientConfig::from_env();
        std::env::remove_var("ML_SERVICE_TIMEOUT");
        assert_eq!(config.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_analyze_url_trims_slash() {
        let client = MlClient::new(MlClientConfig {
            base_url: "https://ml.example.com/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(client.analyze_url(), "https://ml.example.com/analyze");
    }

    #[test]
    fn test_failure_message() {
        assert_eq!(
            failure_message(&MlError::Unreachable("dns error".into())),
            UNREACHABLE_MESSAGE
        );
        assert_eq!(
            failure_message(&MlError::Status(502)),
            "Server returned 502. Check your ML endpoint."
        );
    }
}
