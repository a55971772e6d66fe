//! Object storage for binary assets (product photos).

use async_trait::async_trait;
use core_config::BackendConfig;
use serde::Deserialize;
use tracing::{instrument, warn};

use crate::store::{StoreError, StoreResult};

/// Per-upload options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    /// Seconds a CDN or browser may cache the object
    pub cache_control: u32,
    /// Replace an existing object at the same path
    pub upsert: bool,
    pub content_type: Option<String>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            cache_control: 3600,
            upsert: false,
            content_type: None,
        }
    }
}

/// Bucket-scoped object storage
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Write `payload` at `path`. With `upsert: false` an existing object
    /// yields [`StoreError::Conflict`].
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        payload: Vec<u8>,
        options: UploadOptions,
    ) -> StoreResult<()>;

    /// Publicly resolvable URL of an object
    fn public_url(&self, bucket: &str, path: &str) -> String;

    async fn remove(&self, bucket: &str, paths: Vec<String>) -> StoreResult<()>;
}

/// Object storage over the backend's storage REST API
#[derive(Clone)]
pub struct HttpObjectStorage {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct StorageErrorBody {
    #[serde(rename = "statusCode")]
    status_code: Option<String>,
    error: Option<String>,
    message: Option<String>,
}

impl HttpObjectStorage {
    pub fn new(client: reqwest::Client, config: &BackendConfig) -> Self {
        Self {
            client,
            base_url: config.storage_url(),
            api_key: config.api_key.clone(),
        }
    }

    fn object_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/object/{}/{}",
            self.base_url,
            urlencoding::encode(bucket),
            encode_path(path)
        )
    }

    async fn error_from_response(response: reqwest::Response) -> StoreError {
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        let body: Option<StorageErrorBody> = serde_json::from_str(&text).ok();

        let reported_status = body
            .as_ref()
            .and_then(|b| b.status_code.as_deref())
            .and_then(|code| code.parse::<u16>().ok());
        let message = body
            .as_ref()
            .and_then(|b| b.message.clone().or_else(|| b.error.clone()))
            .unwrap_or(text);

        if status == 409 || reported_status == Some(409) {
            return StoreError::Conflict(message);
        }

        warn!(status, message = %message, "Object storage request failed");
        StoreError::Backend {
            status,
            code: body.and_then(|b| b.error),
            message,
        }
    }
}

/// Percent-encode each path segment, keeping the separators
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl ObjectStorage for HttpObjectStorage {
    #[instrument(skip(self, payload, options), fields(bytes = payload.len()))]
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        payload: Vec<u8>,
        options: UploadOptions,
    ) -> StoreResult<()> {
        let content_type = options
            .content_type
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let response = self
            .client
            .post(self.object_url(bucket, path))
            .bearer_auth(&self.api_key)
            .header("apikey", &self.api_key)
            .header("cache-control", format!("max-age={}", options.cache_control))
            .header("x-upsert", options.upsert.to_string())
            .header("content-type", content_type)
            .body(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/object/public/{}/{}",
            self.base_url,
            urlencoding::encode(bucket),
            encode_path(path)
        )
    }

    #[instrument(skip(self))]
    async fn remove(&self, bucket: &str, paths: Vec<String>) -> StoreResult<()> {
        let response = self
            .client
            .delete(format!("{}/object/{}", self.base_url, urlencoding::encode(bucket)))
            .bearer_auth(&self.api_key)
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "prefixes": paths }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        Ok(())
    }
}
