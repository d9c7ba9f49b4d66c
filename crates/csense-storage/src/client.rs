//! S3-compatible storage client.

use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Builder;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use aws_types::region::Region;
use chrono::Utc;
use tracing::{debug, info, warn};

use csense_models::ImagePayload;

use crate::error::{StorageError, StorageResult};
use crate::keys::{key_from_url, xray_key};

/// Content type of uploaded X-rays.
pub const XRAY_CONTENT_TYPE: &str = "image/jpeg";

/// Lifetime of presigned image URLs.
pub const PRESIGNED_URL_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Configuration for the storage client.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// S3 API endpoint URL
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket name
    pub bucket_name: String,
    /// Region ("auto" for R2)
    pub region: String,
    /// Public base URL serving the bucket. Presigned URLs are used when unset.
    pub public_url: Option<String>,
}

impl StorageConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: required("STORAGE_ENDPOINT_URL")?,
            access_key_id: required("STORAGE_ACCESS_KEY_ID")?,
            secret_access_key: required("STORAGE_SECRET_ACCESS_KEY")?,
            bucket_name: required("STORAGE_BUCKET")?,
            region: std::env::var("STORAGE_REGION").unwrap_or_else(|_| "auto".to_string()),
            public_url: std::env::var("STORAGE_PUBLIC_URL")
                .ok()
                .filter(|u| !u.is_empty()),
        })
    }
}

fn required(name: &str) -> StorageResult<String> {
    std::env::var(name).map_err(|_| StorageError::config_error(format!("{} not set", name)))
}

/// Blob store for X-ray images.
#[derive(Clone)]
pub struct StorageClient {
    client: Client,
    bucket: String,
    public_url: Option<String>,
}

impl StorageClient {
    /// Create a new client from configuration.
    pub fn new(config: StorageConfig) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "csense-storage",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket_name,
            public_url: config.public_url,
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self::new(StorageConfig::from_env()?))
    }

    /// Upload an X-ray and return a URL the analysis service can fetch.
    ///
    /// With `existing_path` the object at that key is overwritten; otherwise a
    /// fresh key under `xrays/{user_id}/` is used.
    pub async fn upload_xray(
        &self,
        user_id: &str,
        payload: ImagePayload,
        existing_path: Option<&str>,
    ) -> StorageResult<String> {
        let key = match existing_path {
            Some(path) => path.trim_start_matches('/').to_string(),
            None => xray_key(user_id, Utc::now().timestamp_millis()),
        };
        if key.is_empty() {
            return Err(StorageError::invalid_key("empty upload path"));
        }

        let data = payload.into_bytes().await?;
        debug!(user_id = %user_id, key = %key, bytes = data.len(), "Uploading X-ray");

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(data))
            .content_type(XRAY_CONTENT_TYPE)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        info!(user_id = %user_id, key = %key, "Uploaded X-ray");
        self.object_url(&key).await
    }

    /// Retrievable URL for a key.
    pub async fn object_url(&self, key: &str) -> StorageResult<String> {
        match &self.public_url {
            Some(base) => Ok(format!("{}/{}", base.trim_end_matches('/'), key)),
            None => self.presign_get(key, PRESIGNED_URL_TTL).await,
        }
    }

    /// Generate a presigned GET URL.
    pub async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        let presign_config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }

    /// Object key behind a URL returned by [`upload_xray`](Self::upload_xray).
    pub fn key_from_url(&self, url: &str) -> StorageResult<String> {
        key_from_url(url, &self.bucket, self.public_url.as_deref())
    }

    /// Delete an object.
    pub async fn delete_object(&self, key: &str) -> StorageResult<()> {
        debug!("Deleting {}", key);

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::delete_failed(e.to_string()))?;

        Ok(())
    }

    /// Delete the object behind `url`. Failures are logged, never returned.
    pub async fn delete_by_url(&self, url: &str) {
        let key = match self.key_from_url(url) {
            Ok(key) => key,
            Err(e) => {
                warn!(url = %url, "Cannot delete image: {}", e);
                return;
            }
        };

        match self.delete_object(&key).await {
            Ok(()) => info!(key = %key, "Deleted image"),
            Err(e) => warn!(key = %key, "Failed to delete image: {}", e),
        }
    }
}
