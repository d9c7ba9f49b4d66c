//! Firestore REST API client.
//!
//! - Token caching with refresh margin
//! - HTTP client tuning (pooling, timeouts)
//! - Exponential backoff with jitter for reads
//! - Observability (tracing spans, metrics)
//! - Local emulator support via `FIRESTORE_EMULATOR_HOST`

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::{debug, info_span, Instrument};

use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::record_request;
use crate::retry::RetryConfig;
use crate::token_cache::{TokenCache, EMULATOR_TOKEN};
use crate::types::{Document, RunQueryRequest, RunQueryResponse, StructuredQuery, Value};

// =============================================================================
// Configuration
// =============================================================================

/// Firestore client configuration.
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    /// GCP project ID
    pub project_id: String,
    /// Database ID (usually "(default)")
    pub database_id: String,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Retry configuration
    pub retry: RetryConfig,
    /// Emulator address (`host:port` or full URL). Disables service account auth.
    pub emulator_host: Option<String>,
}

impl FirestoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> FirestoreResult<Self> {
        let project_id = std::env::var("GCP_PROJECT_ID")
            .or_else(|_| std::env::var("FIREBASE_PROJECT_ID"))
            .map_err(|_| {
                FirestoreError::auth_error(
                    "GCP_PROJECT_ID or FIREBASE_PROJECT_ID must be set to access Firestore",
                )
            })?;

        if project_id.is_empty() {
            return Err(FirestoreError::auth_error(
                "GCP_PROJECT_ID or FIREBASE_PROJECT_ID cannot be empty",
            ));
        }

        let connect_timeout_secs: u64 = std::env::var("FIRESTORE_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        Ok(Self {
            project_id,
            database_id: std::env::var("FIRESTORE_DATABASE_ID")
                .unwrap_or_else(|_| "(default)".to_string()),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            retry: RetryConfig::from_env(),
            emulator_host: std::env::var("FIRESTORE_EMULATOR_HOST")
                .ok()
                .filter(|h| !h.is_empty()),
        })
    }

    /// Config for a local emulator, without credentials.
    pub fn emulator(project_id: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database_id: "(default)".to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            retry: RetryConfig::default(),
            emulator_host: Some(host.into()),
        }
    }

    fn documents_url(&self) -> String {
        let root = match &self.emulator_host {
            Some(host) if host.starts_with("http://") || host.starts_with("https://") => {
                format!("{}/v1", host.trim_end_matches('/'))
            }
            Some(host) => format!("http://{}/v1", host),
            None => "https://firestore.googleapis.com/v1".to_string(),
        };
        format!(
            "{}/projects/{}/databases/{}/documents",
            root, self.project_id, self.database_id
        )
    }
}

// =============================================================================
// Client
// =============================================================================

/// Firestore REST API client.
#[derive(Clone)]
pub struct FirestoreClient {
    http: Client,
    config: FirestoreConfig,
    base_url: String,
    token_cache: Arc<TokenCache>,
}

impl FirestoreClient {
    /// Create a new Firestore client.
    pub async fn new(config: FirestoreConfig) -> FirestoreResult<Self> {
        let token_cache = if config.emulator_host.is_some() {
            TokenCache::fixed(EMULATOR_TOKEN)
        } else {
            TokenCache::new(Self::create_auth_provider()?)
        };

        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("csense-firestore/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FirestoreError::Network)?;

        let base_url = config.documents_url();

        Ok(Self {
            http,
            config,
            base_url,
            token_cache: Arc::new(token_cache),
        })
    }

    fn create_auth_provider() -> FirestoreResult<Arc<dyn TokenProvider>> {
        let service_account = CustomServiceAccount::from_env().map_err(|e| {
            FirestoreError::auth_error(format!("Failed to load service account: {}", e))
        })?;

        match service_account {
            Some(sa) => Ok(Arc::new(sa)),
            None => Err(FirestoreError::auth_error(
                "GOOGLE_APPLICATION_CREDENTIALS not set. \
                 Set it to the path of your service account JSON file.",
            )),
        }
    }

    /// Create from environment variables.
    pub async fn from_env() -> FirestoreResult<Self> {
        let config = FirestoreConfig::from_env()?;
        Self::new(config).await
    }

    pub fn config(&self) -> &FirestoreConfig {
        &self.config
    }

    fn is_access_token_expired(body: &str) -> bool {
        body.contains("ACCESS_TOKEN_EXPIRED") || body.contains("\"UNAUTHENTICATED\"")
    }

    fn document_path(&self, collection: &str, doc_id: &str) -> String {
        format!("{}/{}/{}", self.base_url, collection, doc_id)
    }

    /// Send with a bearer token. A 401 caused by an expired token invalidates
    /// the cache and reissues the request once.
    async fn send_authorized<F>(&self, build: F) -> FirestoreResult<Response>
    where
        F: Fn(&str) -> RequestBuilder,
    {
        let token = self.token_cache.get_token().await?;
        let response = build(&token).send().await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if !Self::is_access_token_expired(&body) {
            return Err(FirestoreError::from_http_status(401, body));
        }

        debug!("Firestore token expired, refreshing");
        self.token_cache.invalidate().await;
        let token = self.token_cache.get_token().await?;
        Ok(build(&token).send().await?)
    }

    // =========================================================================
    // CRUD Operations
    // =========================================================================

    /// Get a document. Missing documents are `Ok(None)`.
    pub async fn get_document(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> FirestoreResult<Option<Document>> {
        self.with_retry("get_document", || self.get_document_once(collection, doc_id))
            .await
    }

    async fn get_document_once(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> FirestoreResult<Option<Document>> {
        let url = self.document_path(collection, doc_id);

        self.execute_request("get_document", collection, Some(doc_id), async {
            let response = self
                .send_authorized(|token| self.http.get(&url).bearer_auth(token))
                .await?;

            match response.status() {
                StatusCode::OK => {
                    let doc: Document = response.json().await?;
                    Ok(Some(doc))
                }
                StatusCode::NOT_FOUND => Ok(None),
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Create a document with an explicit ID. Fails if it already exists.
    pub async fn create_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
    ) -> FirestoreResult<Document> {
        let url = format!(
            "{}/{}?documentId={}",
            self.base_url,
            collection,
            urlencoding::encode(doc_id)
        );
        let body = Document::new(fields);

        self.execute_request("create_document", collection, Some(doc_id), async {
            let response = self
                .send_authorized(|token| self.http.post(&url).bearer_auth(token).json(&body))
                .await?;

            match response.status() {
                StatusCode::OK | StatusCode::CREATED => {
                    let doc: Document = response.json().await?;
                    Ok(doc)
                }
                StatusCode::CONFLICT => Err(FirestoreError::AlreadyExists(format!(
                    "{}/{}",
                    collection, doc_id
                ))),
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Create a document with a server-generated ID. Returns the stored document.
    pub async fn add_document(
        &self,
        collection: &str,
        fields: HashMap<String, Value>,
    ) -> FirestoreResult<Document> {
        let url = format!("{}/{}", self.base_url, collection);
        let body = Document::new(fields);

        self.execute_request("add_document", collection, None, async {
            let response = self
                .send_authorized(|token| self.http.post(&url).bearer_auth(token).json(&body))
                .await?;

            match response.status() {
                StatusCode::OK | StatusCode::CREATED => {
                    let doc: Document = response.json().await?;
                    if doc.id().is_none() {
                        return Err(FirestoreError::invalid_response(
                            "created document has no name",
                        ));
                    }
                    Ok(doc)
                }
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Overwrite a document, creating it when absent.
    pub async fn set_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
    ) -> FirestoreResult<Document> {
        let url = self.document_path(collection, doc_id);
        let body = Document::new(fields);

        self.execute_request("set_document", collection, Some(doc_id), async {
            let response = self
                .send_authorized(|token| self.http.patch(&url).bearer_auth(token).json(&body))
                .await?;

            match response.status() {
                StatusCode::OK => {
                    let doc: Document = response.json().await?;
                    Ok(doc)
                }
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Merge fields into an existing document. Fails with `NotFound` when absent.
    pub async fn update_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
        update_mask: Vec<String>,
    ) -> FirestoreResult<Document> {
        let mut params: Vec<String> = update_mask
            .iter()
            .map(|f| format!("updateMask.fieldPaths={}", urlencoding::encode(f)))
            .collect();
        params.push("currentDocument.exists=true".to_string());
        let url = format!("{}?{}", self.document_path(collection, doc_id), params.join("&"));

        let body = Document::new(fields);

        self.execute_request("update_document", collection, Some(doc_id), async {
            let response = self
                .send_authorized(|token| self.http.patch(&url).bearer_auth(token).json(&body))
                .await?;

            match response.status() {
                StatusCode::OK => {
                    let doc: Document = response.json().await?;
                    Ok(doc)
                }
                StatusCode::NOT_FOUND => Err(FirestoreError::not_found(format!(
                    "{}/{}",
                    collection, doc_id
                ))),
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Delete a document. Deleting a missing document succeeds.
    pub async fn delete_document(&self, collection: &str, doc_id: &str) -> FirestoreResult<()> {
        let url = self.document_path(collection, doc_id);

        self.execute_request("delete_document", collection, Some(doc_id), async {
            let response = self
                .send_authorized(|token| self.http.delete(&url).bearer_auth(token))
                .await?;

            match response.status() {
                StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
                StatusCode::NOT_FOUND => {
                    debug!("Document {}/{} already deleted (idempotent)", collection, doc_id);
                    Ok(())
                }
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    // =========================================================================
    // Query Operations
    // =========================================================================

    /// Run a structured query against top-level collections.
    pub async fn run_query(&self, query: StructuredQuery) -> FirestoreResult<Vec<Document>> {
        self.with_retry("run_query", || self.run_query_once(&query)).await
    }

    async fn run_query_once(&self, query: &StructuredQuery) -> FirestoreResult<Vec<Document>> {
        let url = format!("{}:runQuery", self.base_url);
        let request = RunQueryRequest {
            structured_query: query.clone(),
        };
        let collection = query
            .from
            .first()
            .map(|c| c.collection_id.as_str())
            .unwrap_or("");

        self.execute_request("run_query", collection, None, async {
            let response = self
                .send_authorized(|token| self.http.post(&url).bearer_auth(token).json(&request))
                .await?;

            match response.status() {
                StatusCode::OK => {
                    let body = response.text().await.unwrap_or_default();
                    // runQuery returns a JSON array; entries without a document carry only readTime
                    let responses: Vec<RunQueryResponse> =
                        serde_json::from_str(&body).map_err(|e| {
                            FirestoreError::invalid_response(format!(
                                "Failed to parse runQuery response: {} (body prefix: {})",
                                e,
                                body.chars().take(200).collect::<String>()
                            ))
                        })?;

                    Ok(responses.into_iter().filter_map(|r| r.document).collect())
                }
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Execute with retry.
    pub async fn with_retry<T, F, Fut>(&self, operation: &str, op: F) -> FirestoreResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = FirestoreResult<T>>,
    {
        crate::retry::with_retry(&self.config.retry, operation, op).await
    }

    // =========================================================================
    // Internal Helpers
    // =========================================================================

    /// Execute a request with tracing and metrics.
    async fn execute_request<T, F>(
        &self,
        operation: &str,
        collection: &str,
        doc_id: Option<&str>,
        fut: F,
    ) -> FirestoreResult<T>
    where
        F: std::future::Future<Output = FirestoreResult<T>>,
    {
        let span = if let Some(id) = doc_id {
            info_span!("firestore_request", operation = %operation, collection = %collection, doc_id = %id)
        } else {
            info_span!("firestore_request", operation = %operation, collection = %collection)
        };

        let start = Instant::now();
        let result = fut.instrument(span).await;
        let latency_ms = start.elapsed().as_millis() as f64;

        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status().unwrap_or(500),
        };
        record_request(operation, status, latency_ms);

        result
    }

    async fn handle_error_response(status: StatusCode, url: &str, response: Response) -> FirestoreError {
        let body = response.text().await.unwrap_or_default();
        FirestoreError::from_http_status(status.as_u16(), format!("{} failed: {}", url, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_config_from_env_validates_project_id() {
        std::env::remove_var("GCP_PROJECT_ID");
        std::env::remove_var("FIREBASE_PROJECT_ID");
        let result = FirestoreConfig::from_env();
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_config_default_values() {
        std::env::set_var("GCP_PROJECT_ID", "test-project");
        std::env::remove_var("FIRESTORE_CONNECT_TIMEOUT_SECS");
        std::env::remove_var("FIRESTORE_EMULATOR_HOST");
        let config = FirestoreConfig::from_env().unwrap();
        std::env::remove_var("GCP_PROJECT_ID");

        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.database_id, "(default)");
        assert!(config.emulator_host.is_none());
    }

    #[test]
    fn test_documents_url() {
        let mut config = FirestoreConfig::emulator("demo", "localhost:8080");
        assert_eq!(
            config.documents_url(),
            "http://localhost:8080/v1/projects/demo/databases/(default)/documents"
        );

        config.emulator_host = Some("http://127.0.0.1:9000/".to_string());
        assert_eq!(
            config.documents_url(),
            "http://127.0.0.1:9000/v1/projects/demo/databases/(default)/documents"
        );

        config.emulator_host = None;
        assert!(config.documents_url().starts_with("https://firestore.googleapis.com/v1/"));
    }
}
