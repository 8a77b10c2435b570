//! LLM provider invocation for structured extraction and narrative analysis.
//!
//! The pipeline talks to the model through the [`LlmClient`] trait so tests can substitute a
//! double; [`HttpLlmClient`] is the production adapter, issuing one single-turn request per
//! chunk against the provider's invoke endpoint. Replies are decoded once at the boundary into
//! [`ModelResponse`], a union of the two envelope shapes the provider is known to produce, so
//! downstream code never inspects raw JSON shapes.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::get_config;

/// Generation budget requested for every invocation.
pub const MAX_GENERATION_TOKENS: u32 = 8000;
/// Near-zero sampling temperature, biasing structured output toward determinism.
pub const SAMPLING_TEMPERATURE: f32 = 0.1;

/// Errors surfaced while invoking the model.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Provider endpoint was unreachable or missing.
    #[error("LLM provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Model invocation failed: {0}")]
    InvocationFailed(String),
    /// Provider response could not be decoded.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Single-turn request assembled by the extraction pipeline.
#[derive(Debug, Clone)]
pub struct InvokeRequest {
    /// Fixed task instructions placed ahead of the chunk content.
    pub instructions: String,
    /// The chunk of report text the model should work on.
    pub input_text: String,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Sampling temperature for the invocation.
    pub temperature: f32,
}

/// One text segment of a provider reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentBlock {
    /// Segment kind as reported by the provider (`text` for narrative segments).
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Segment payload.
    #[serde(default)]
    pub text: String,
}

/// Decoded provider reply.
///
/// The provider envelope normally carries an ordered `content` array with exactly one text
/// segment, but some deployments return the narrative directly under a top-level `text` field.
/// Both shapes are decoded here so the rest of the pipeline reads text through
/// [`ModelResponse::first_text`] without shape-sniffing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelResponse {
    /// Flat reply carrying the text directly.
    Text {
        /// The reply text.
        text: String,
    },
    /// Envelope reply with an ordered content array.
    Content {
        /// Ordered reply segments; the first text segment is authoritative.
        content: Vec<ContentBlock>,
    },
}

impl ModelResponse {
    /// The reply's human-readable text: the top-level field, or the first content segment.
    pub fn first_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text.as_str()),
            Self::Content { content } => content.first().map(|block| block.text.as_str()),
        }
    }
}

/// Interface implemented by LLM backends.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Invoke the model once and return the decoded reply.
    async fn invoke(&self, request: InvokeRequest) -> Result<ModelResponse, LlmError>;
}

/// Production adapter invoking the model over HTTP.
pub struct HttpLlmClient {
    http: Client,
    base_url: String,
    model: String,
    attempts: u32,
}

#[derive(Serialize)]
struct InvokeBody<'a> {
    instructions: &'a str,
    input_text: &'a str,
    max_tokens: u32,
    temperature: f32,
}

impl HttpLlmClient {
    /// Construct a client from the environment-derived configuration.
    pub fn new() -> Self {
        let config = get_config();
        let http = Client::builder()
            .user_agent("labtract/0.1")
            .connect_timeout(config.provider_timeout())
            .timeout(config.provider_timeout())
            .build()
            .expect("Failed to construct reqwest::Client for LLM invocation");
        Self {
            http,
            base_url: config.llm_url.clone(),
            model: config.llm_model.clone(),
            attempts: config.retry_attempts(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/model/{}/invoke",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

impl Default for HttpLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn invoke(&self, request: InvokeRequest) -> Result<ModelResponse, LlmError> {
        let body = InvokeBody {
            instructions: &request.instructions,
            input_text: &request.input_text,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let mut attempt = 1;
        let response = loop {
            let result = self.http.post(self.endpoint()).json(&body).send().await;
            match result {
                Ok(response) => break response,
                Err(error) if (error.is_connect() || error.is_timeout()) && attempt < self.attempts => {
                    tracing::debug!(attempt, error = %error, "Transient LLM transport error; retrying");
                    attempt += 1;
                }
                Err(error) => {
                    return Err(LlmError::ProviderUnavailable(format!(
                        "failed to reach LLM provider at {}: {error}",
                        self.base_url
                    )));
                }
            }
        };

        if response.status() == StatusCode::NOT_FOUND {
            return Err(LlmError::ProviderUnavailable(format!(
                "LLM endpoint {} returned 404",
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::InvocationFailed(format!(
                "provider returned {status}: {body}"
            )));
        }

        let reply: ModelResponse = response.json().await.map_err(|error| {
            LlmError::InvalidResponse(format!("failed to decode provider reply: {error}"))
        })?;

        if reply.first_text().is_none() {
            return Err(LlmError::InvalidResponse(
                "provider reply carried no text segment".into(),
            ));
        }

        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    fn client_for(server: &MockServer) -> HttpLlmClient {
        HttpLlmClient {
            http: Client::builder()
                .user_agent("labtract-test")
                .build()
                .expect("client"),
            base_url: server.base_url(),
            model: "extractor-1".into(),
            attempts: 1,
        }
    }

    fn request() -> InvokeRequest {
        InvokeRequest {
            instructions: "Extract the results.".into(),
            input_text: "Hemoglobin 13.5 g/dL".into(),
            max_tokens: MAX_GENERATION_TOKENS,
            temperature: SAMPLING_TEMPERATURE,
        }
    }

    #[tokio::test]
    async fn decodes_content_envelope() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/model/extractor-1/invoke")
                    .json_body(json!({
                        "instructions": "Extract the results.",
                        "input_text": "Hemoglobin 13.5 g/dL",
                        "max_tokens": 8000,
                        "temperature": 0.1
                    }));
                then.status(200).json_body(json!({
                    "content": [{ "type": "text", "text": "{\"test_groups\": []}" }]
                }));
            })
            .await;

        let reply = client_for(&server).invoke(request()).await.expect("reply");

        mock.assert();
        assert_eq!(reply.first_text(), Some("{\"test_groups\": []}"));
    }

    #[tokio::test]
    async fn decodes_flat_text_reply() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/model/extractor-1/invoke");
                then.status(200)
                    .json_body(json!({ "text": "Summary: all values are in range." }));
            })
            .await;

        let reply = client_for(&server).invoke(request()).await.expect("reply");

        assert_eq!(reply.first_text(), Some("Summary: all values are in range."));
    }

    #[tokio::test]
    async fn error_status_becomes_invocation_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/model/extractor-1/invoke");
                then.status(500).body("throttled");
            })
            .await;

        let error = client_for(&server)
            .invoke(request())
            .await
            .expect_err("error response");

        assert!(matches!(error, LlmError::InvocationFailed(message) if message.contains("500")));
    }

    #[tokio::test]
    async fn reply_without_text_segment_is_invalid() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/model/extractor-1/invoke");
                then.status(200).json_body(json!({ "content": [] }));
            })
            .await;

        let error = client_for(&server)
            .invoke(request())
            .await
            .expect_err("invalid reply");

        assert!(matches!(error, LlmError::InvalidResponse(_)));
    }
}
