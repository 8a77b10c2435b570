//! HTTP surface for Labtract.
//!
//! This module exposes a compact Axum router with three endpoints:
//!
//! - `POST /extract` – Run one document through structured extraction. Accepts a JSON body with
//!   the declared `filename` and the document bytes as `content_base64`; returns the flattened
//!   rows, the rendered CSV, patient name/date, fan-out counters, and the stored artifact keys.
//! - `POST /analyze` – Same transport, narrative-analysis path; returns the display text.
//! - `GET /metrics` – Observe the extraction counters.
//!
//! Handlers are generic over [`ReportApi`], so tests can drive the router with a stub service.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::pipeline::{PipelineError, ReportApi};

/// Build the HTTP router exposing the extraction API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: ReportApi + 'static,
{
    Router::new()
        .route("/extract", post(extract_document::<S>))
        .route("/analyze", post(analyze_document::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .with_state(service)
}

/// Request body shared by the `POST /extract` and `POST /analyze` endpoints.
#[derive(Deserialize)]
struct DocumentRequest {
    /// Declared filename; the extension selects the OCR path.
    filename: String,
    /// Document bytes, base64-encoded.
    content_base64: String,
}

enum ApiError {
    BadPayload(String),
    Pipeline(PipelineError),
}

impl From<PipelineError> for ApiError {
    fn from(error: PipelineError) -> Self {
        Self::Pipeline(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadPayload(message) => (StatusCode::BAD_REQUEST, message),
            Self::Pipeline(error) => {
                let status = match &error {
                    PipelineError::UnsupportedMedia { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                    PipelineError::Ocr(_) | PipelineError::Storage(_) => StatusCode::BAD_GATEWAY,
                };
                (status, error.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

async fn extract_document<S: ReportApi>(
    State(service): State<Arc<S>>,
    Json(request): Json<DocumentRequest>,
) -> Result<Response, ApiError> {
    let request_id = Uuid::new_v4();
    let bytes = decode_content(&request.content_base64)?;
    tracing::info!(
        %request_id,
        filename = %request.filename,
        bytes = bytes.len(),
        "Extraction requested"
    );

    let outcome = service.extract(&request.filename, bytes).await?;
    Ok(Json(outcome).into_response())
}

async fn analyze_document<S: ReportApi>(
    State(service): State<Arc<S>>,
    Json(request): Json<DocumentRequest>,
) -> Result<Response, ApiError> {
    let request_id = Uuid::new_v4();
    let bytes = decode_content(&request.content_base64)?;
    tracing::info!(
        %request_id,
        filename = %request.filename,
        bytes = bytes.len(),
        "Analysis requested"
    );

    let outcome = service.analyze(&request.filename, bytes).await?;
    Ok(Json(outcome).into_response())
}

async fn get_metrics<S: ReportApi>(State(service): State<Arc<S>>) -> Response {
    Json(service.metrics_snapshot()).into_response()
}

fn decode_content(content_base64: &str) -> Result<Vec<u8>, ApiError> {
    BASE64
        .decode(content_base64)
        .map_err(|error| ApiError::BadPayload(format!("content_base64 is not valid base64: {error}")))
}
