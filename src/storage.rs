//! Blob staging and artifact storage integration.
//!
//! Paginated documents must be staged in the blob store before the OCR provider will accept a
//! job for them, and the pipeline persists its artifacts (extracted text, results CSV, raw
//! model replies) to the same store. Objects are addressed path-style as `/{bucket}/{key}`.

use reqwest::{Client, StatusCode};
use thiserror::Error;

use crate::config::get_config;

/// Errors returned while interacting with the blob store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid blob store URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Store responded with an unexpected status code.
    #[error("Unexpected blob store response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the store.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// Lightweight HTTP client for blob store operations.
pub struct BlobStore {
    pub(crate) client: Client,
    pub(crate) base_url: String,
}

impl BlobStore {
    /// Construct a new client using configuration derived from the environment.
    pub fn new() -> Result<Self, StorageError> {
        let config = get_config();
        let client = Client::builder()
            .user_agent("labtract/0.1")
            .connect_timeout(config.provider_timeout())
            .timeout(config.provider_timeout())
            .build()?;

        let base_url = normalize_base_url(&config.storage_url).map_err(StorageError::InvalidUrl)?;
        tracing::debug!(url = %base_url, "Initialized blob store client");

        Ok(Self { client, base_url })
    }

    /// Store an object under `bucket/key`, replacing any existing content.
    pub async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), StorageError> {
        let size = bytes.len();
        let mut request = self.client.put(self.object_url(bucket, key)).body(bytes);
        if let Some(content_type) = content_type {
            request = request.header("content-type", content_type);
        }

        let response = request.send().await?;
        if response.status().is_success() {
            tracing::debug!(bucket, key, size, "Object stored");
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = StorageError::UnexpectedStatus { status, body };
            tracing::error!(bucket, key, error = %error, "Blob store put failed");
            Err(error)
        }
    }

    /// Fetch an object's bytes from `bucket/key`.
    pub async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let response = self.client.get(self.object_url(bucket, key)).send().await?;

        if response.status().is_success() {
            Ok(response.bytes().await?.to_vec())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = StorageError::UnexpectedStatus { status, body };
            tracing::error!(bucket, key, error = %error, "Blob store get failed");
            Err(error)
        }
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!(
            "{}/{bucket}/{key}",
            self.base_url.trim_end_matches('/')
        )
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}
