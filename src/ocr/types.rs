//! Shared types used by the OCR client and polling driver.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors returned while interacting with the OCR provider.
#[derive(Debug, Error)]
pub enum OcrError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid OCR provider URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Provider responded with an unexpected status code.
    #[error("Unexpected OCR provider response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the provider.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Job reached the terminal `FAILED` status.
    #[error("OCR job failed: {message}")]
    JobFailed {
        /// Provider-supplied status message, or a placeholder when none was given.
        message: String,
    },
    /// Caller-specified deadline elapsed before the job reached a terminal status.
    #[error("OCR job {job_id} did not complete within {waited:?}")]
    TimedOut {
        /// Identifier of the abandoned job.
        job_id: String,
        /// Total time spent polling before giving up.
        waited: Duration,
    },
}

/// Semantic role the provider assigns to a text block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockType {
    /// A full line of recognized text; the only role the pipeline retains.
    Line,
    /// A single recognized word.
    Word,
    /// A page marker.
    Page,
    /// Any block role this client does not model.
    #[serde(other)]
    Other,
}

/// An ordered text fragment returned by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct TextBlock {
    /// Role of the fragment within the page.
    #[serde(rename = "type")]
    pub kind: BlockType,
    /// Recognized text; empty for non-text blocks.
    #[serde(default)]
    pub text: String,
}

/// Lifecycle state reported for an asynchronous OCR job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Job accepted and still processing.
    Running,
    /// Job finished and results are ready for pagination.
    Succeeded,
    /// Job terminated without producing results.
    Failed,
}

/// Stored-document reference submitted for asynchronous extraction.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentLocation {
    /// Bucket the staged document lives in.
    pub bucket: String,
    /// Object key of the staged document.
    pub key: String,
}

/// One page of job output returned by the poll endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct PollResponse {
    /// Current job lifecycle state.
    pub status: JobStatus,
    /// Blocks carried by this page; empty while the job is running.
    #[serde(default)]
    pub blocks: Vec<TextBlock>,
    /// Continuation token for the next page, when more output remains.
    #[serde(default)]
    pub next_token: Option<String>,
    /// Provider-supplied detail accompanying a `FAILED` status.
    #[serde(default)]
    pub status_message: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct DetectResponse {
    pub(crate) blocks: Vec<TextBlock>,
}

#[derive(Deserialize)]
pub(crate) struct SubmitResponse {
    pub(crate) job_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn poll_response_decodes_terminal_failure() {
        let response: PollResponse = serde_json::from_value(json!({
            "status": "FAILED",
            "status_message": "document too large"
        }))
        .expect("poll response decodes");

        assert_eq!(response.status, JobStatus::Failed);
        assert!(response.blocks.is_empty());
        assert!(response.next_token.is_none());
        assert_eq!(response.status_message.as_deref(), Some("document too large"));
    }

    #[test]
    fn poll_response_defaults_optional_fields() {
        let response: PollResponse = serde_json::from_value(json!({ "status": "RUNNING" }))
            .expect("poll response decodes");

        assert_eq!(response.status, JobStatus::Running);
        assert!(response.blocks.is_empty());
    }
}
