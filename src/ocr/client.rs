//! HTTP client wrapper for the OCR provider.

use crate::config::get_config;
use crate::ocr::types::{
    DetectResponse, DocumentLocation, OcrError, PollResponse, SubmitResponse, TextBlock,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::{Client, Method};
use serde_json::json;

/// Lightweight HTTP client for OCR provider operations.
pub struct OcrClient {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    pub(crate) attempts: u32,
}

impl OcrClient {
    /// Construct a new client using configuration derived from the environment.
    pub fn new() -> Result<Self, OcrError> {
        let config = get_config();
        let client = Client::builder()
            .user_agent("labtract/0.1")
            .connect_timeout(config.provider_timeout())
            .timeout(config.provider_timeout())
            .build()?;

        let base_url = normalize_base_url(&config.ocr_url).map_err(OcrError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            has_api_key = %config
                .ocr_api_key
                .as_deref()
                .map(|value| !value.is_empty())
                .unwrap_or(false),
            "Initialized OCR HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key: config.ocr_api_key.clone(),
            attempts: config.retry_attempts(),
        })
    }

    /// Run synchronous text detection over a single image, returning the complete block list.
    pub async fn detect(&self, image: &[u8]) -> Result<Vec<TextBlock>, OcrError> {
        let body = json!({ "document": BASE64.encode(image) });
        let response = self
            .send_with_retry(|| self.request(Method::POST, "detect").json(&body))
            .await?;
        let response = self.ensure_success(response).await?;

        let payload: DetectResponse = response.json().await?;
        tracing::debug!(blocks = payload.blocks.len(), "Synchronous detection finished");
        Ok(payload.blocks)
    }

    /// Submit a staged document for asynchronous extraction, returning the provider's job id.
    pub async fn start_job(&self, location: &DocumentLocation) -> Result<String, OcrError> {
        let response = self
            .send_with_retry(|| self.request(Method::POST, "jobs").json(location))
            .await?;
        let response = self.ensure_success(response).await?;

        let payload: SubmitResponse = response.json().await?;
        tracing::debug!(
            job_id = %payload.job_id,
            bucket = %location.bucket,
            key = %location.key,
            "OCR job submitted"
        );
        Ok(payload.job_id)
    }

    /// Query job status, optionally continuing result pagination with a provider token.
    pub async fn poll_job(
        &self,
        job_id: &str,
        next_token: Option<&str>,
    ) -> Result<PollResponse, OcrError> {
        let mut body = json!({ "job_id": job_id });
        if let Some(token) = next_token {
            body.as_object_mut()
                .expect("poll body should remain an object")
                .insert("next_token".into(), token.into());
        }

        let response = self
            .send_with_retry(|| self.request(Method::POST, "poll").json(&body))
            .await?;
        let response = self.ensure_success(response).await?;

        Ok(response.json().await?)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        req
    }

    /// Issue a request, retrying transient transport errors up to the configured attempt count.
    async fn send_with_retry<F>(&self, build: F) -> Result<reqwest::Response, OcrError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 1;
        loop {
            match build().send().await {
                Ok(response) => return Ok(response),
                Err(error) if transient(&error) && attempt < self.attempts => {
                    tracing::debug!(attempt, error = %error, "Transient OCR transport error; retrying");
                    attempt += 1;
                }
                Err(error) => return Err(error.into()),
            }
        }
    }

    async fn ensure_success(
        &self,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, OcrError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = OcrError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "OCR provider request failed");
            Err(error)
        }
    }
}

fn transient(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout()
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
