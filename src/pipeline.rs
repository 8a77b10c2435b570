//! Document-to-table extraction pipeline.
//!
//! Data flows one document at a time: raw bytes → OCR (synchronous for images, polled job for
//! paginated documents) → plain text → bounded chunks → one model invocation per chunk →
//! reconciliation into tabular rows (structured path) or narrative normalization (analysis
//! path). Document-level failures propagate; chunk- and reply-level failures are contained and
//! surfaced as counters, so partial success is the normal outcome.

mod chunking;
mod export;
mod invoker;
mod normalize;
mod prompts;
mod reconcile;

pub use chunking::chunk_text;
pub use export::{csv_artifact_name, render_csv};
pub use invoker::{ChunkInvocation, failure_count, invoke_chunks, successes};
pub use normalize::{NO_CONTENT_PLACEHOLDER, narrative_text};
pub use prompts::ExtractionTask;
pub use reconcile::{Reconciliation, ReportRow, TestGroup, TestRecord, reconcile};

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::config::get_config;
use crate::llm::{HttpLlmClient, LlmClient};
use crate::metrics::{MetricsSnapshot, PipelineMetrics};
use crate::ocr::{self, DocumentLocation, OcrClient, OcrError};
use crate::storage::{BlobStore, StorageError};

/// Errors emitted by the document pipeline.
///
/// Only document-level failures appear here. Chunk and reply failures are contained inside the
/// fan-out and reported as counters on the outcome types.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Document extension was not recognized.
    #[error("Unsupported file type: {extension}")]
    UnsupportedMedia {
        /// The rejected extension, lowercased, possibly empty.
        extension: String,
    },
    /// OCR stage failed terminally for this document.
    #[error("OCR extraction failed: {0}")]
    Ocr(#[from] OcrError),
    /// Staging or artifact storage failed.
    #[error("Blob store operation failed: {0}")]
    Storage(#[from] StorageError),
}

/// Document classes the OCR provider distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Single image, extracted in one synchronous call.
    Image,
    /// Paginated document, extracted through an asynchronous job.
    PaginatedDocument,
}

impl MediaKind {
    /// Classify a document by its filename extension.
    pub fn from_filename(filename: &str) -> Result<Self, PipelineError> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match extension.as_str() {
            "png" | "jpg" | "jpeg" => Ok(Self::Image),
            "pdf" => Ok(Self::PaginatedDocument),
            _ => Err(PipelineError::UnsupportedMedia { extension }),
        }
    }
}

/// Keys of the artifacts persisted for one extraction.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ArtifactKeys {
    /// Plain-text OCR output.
    pub extracted_text: String,
    /// Flattened results table.
    pub results_csv: String,
    /// Raw model replies, for debugging extraction quality.
    pub raw_responses: String,
}

/// Outcome of a structured extraction run.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExtractionOutcome {
    /// Flattened rows across all parseable replies.
    pub rows: Vec<ReportRow>,
    /// CSV rendering of `rows`, header included.
    pub csv: String,
    /// Patient name of the last parsed group; empty when nothing parsed.
    pub patient_name: String,
    /// Test date of the last parsed group; empty when nothing parsed.
    pub test_date: String,
    /// Number of chunks submitted to the model.
    pub chunk_count: usize,
    /// Chunks whose invocation failed and were skipped.
    pub failed_chunks: usize,
    /// Replies that contributed zero rows due to missing or malformed JSON.
    pub skipped_responses: usize,
    /// Where the artifacts were stored.
    pub artifacts: ArtifactKeys,
    /// Completion timestamp, RFC 3339.
    pub completed_at: String,
}

/// Outcome of a narrative analysis run.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AnalysisOutcome {
    /// Display text for the caller; the placeholder when no reply survived.
    pub narrative: String,
    /// Number of chunks submitted to the model.
    pub chunk_count: usize,
    /// Chunks whose invocation failed and were skipped.
    pub failed_chunks: usize,
    /// Completion timestamp, RFC 3339.
    pub completed_at: String,
}

/// Operations the HTTP surface and CLI need from the pipeline.
#[async_trait]
pub trait ReportApi: Send + Sync {
    /// Run structured extraction over one uploaded document.
    async fn extract(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<ExtractionOutcome, PipelineError>;

    /// Run narrative analysis over one uploaded document.
    async fn analyze(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<AnalysisOutcome, PipelineError>;

    /// Current extraction counters.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Coordinates the full pipeline: OCR, chunking, model invocation, and reconciliation.
///
/// The service owns long-lived handles to the OCR client, the LLM client, the blob store, and
/// the metrics registry so that the HTTP surface and the CLI reuse the same components.
/// Construct it once near process start and share it through an `Arc`. Processing is strictly
/// serial: one document, one OCR job, one model call at a time.
pub struct ReportService {
    ocr: OcrClient,
    llm: Box<dyn LlmClient>,
    store: BlobStore,
    metrics: Arc<PipelineMetrics>,
}

impl ReportService {
    /// Build a new pipeline service from the environment-derived configuration.
    pub fn new() -> Self {
        tracing::info!("Initializing pipeline service");
        let ocr = OcrClient::new().expect("Failed to initialize OCR client");
        let store = BlobStore::new().expect("Failed to initialize blob store client");
        Self {
            ocr,
            llm: Box::new(HttpLlmClient::new()),
            store,
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    /// Run structured extraction: OCR, chunk, invoke, reconcile, render, and persist artifacts.
    pub async fn extract(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<ExtractionOutcome, PipelineError> {
        let config = get_config();
        let text = self.ocr_text(filename, bytes).await?;
        let chunks = chunk_text(&text, config.chunk_budget());

        let invocations =
            invoke_chunks(self.llm.as_ref(), ExtractionTask::Structured, &chunks).await;
        let failed_chunks = failure_count(&invocations);
        let responses = successes(&invocations);

        let reconciliation = reconcile(&responses);
        let csv = render_csv(&reconciliation.rows);

        let stem = sanitized_stem(filename);
        let artifacts = ArtifactKeys {
            extracted_text: format!("{stem}_ocr.txt"),
            results_csv: csv_artifact_name(
                &reconciliation.last_patient_name,
                &reconciliation.last_test_date,
                &stem,
            ),
            raw_responses: format!("{stem}_responses.json"),
        };

        self.store
            .put(
                &config.artifact_bucket,
                &artifacts.extracted_text,
                text.into_bytes(),
                Some("text/plain"),
            )
            .await?;
        self.store
            .put(
                &config.artifact_bucket,
                &artifacts.results_csv,
                csv.clone().into_bytes(),
                Some("text/csv"),
            )
            .await?;
        let raw =
            serde_json::to_vec_pretty(&responses).expect("model replies serialize to JSON");
        self.store
            .put(
                &config.artifact_bucket,
                &artifacts.raw_responses,
                raw,
                Some("application/json"),
            )
            .await?;

        self.metrics.record_document(
            chunks.len() as u64,
            failed_chunks as u64,
            reconciliation.rows.len() as u64,
        );
        tracing::info!(
            filename,
            chunks = chunks.len(),
            failed_chunks,
            rows = reconciliation.rows.len(),
            skipped_responses = reconciliation.skipped_responses,
            "Document extracted"
        );

        Ok(ExtractionOutcome {
            rows: reconciliation.rows,
            csv,
            patient_name: reconciliation.last_patient_name,
            test_date: reconciliation.last_test_date,
            chunk_count: chunks.len(),
            failed_chunks,
            skipped_responses: reconciliation.skipped_responses,
            artifacts,
            completed_at: timestamp_rfc3339(),
        })
    }

    /// Run narrative analysis: OCR, chunk, invoke, and normalize the first surviving reply.
    pub async fn analyze(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<AnalysisOutcome, PipelineError> {
        let config = get_config();
        let text = self.ocr_text(filename, bytes).await?;
        let chunks = chunk_text(&text, config.chunk_budget());

        let invocations =
            invoke_chunks(self.llm.as_ref(), ExtractionTask::Narrative, &chunks).await;
        let failed_chunks = failure_count(&invocations);
        let responses = successes(&invocations);
        let narrative = narrative_text(&responses);

        self.metrics
            .record_document(chunks.len() as u64, failed_chunks as u64, 0);
        tracing::info!(
            filename,
            chunks = chunks.len(),
            failed_chunks,
            "Document analyzed"
        );

        Ok(AnalysisOutcome {
            narrative,
            chunk_count: chunks.len(),
            failed_chunks,
            completed_at: timestamp_rfc3339(),
        })
    }

    /// Return the current extraction metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// OCR a document into newline-joined plain text, selecting the path by media type.
    async fn ocr_text(&self, filename: &str, bytes: Vec<u8>) -> Result<String, PipelineError> {
        let media = MediaKind::from_filename(filename)?;
        let config = get_config();

        let lines = match media {
            MediaKind::Image => {
                let blocks = self.ocr.detect(&bytes).await?;
                ocr::lines_from_blocks(&blocks)
            }
            MediaKind::PaginatedDocument => {
                let key = staged_key(filename);
                self.store
                    .put(&config.staging_bucket, &key, bytes, Some("application/pdf"))
                    .await?;
                let location = DocumentLocation {
                    bucket: config.staging_bucket.clone(),
                    key,
                };
                let job_id = self.ocr.start_job(&location).await?;
                tracing::info!(filename, job_id = %job_id, "Waiting for OCR job to complete");
                ocr::wait_for_completion(
                    &self.ocr,
                    &job_id,
                    config.poll_interval(),
                    config.poll_deadline(),
                )
                .await?
            }
        };

        tracing::debug!(filename, lines = lines.len(), "OCR text collected");
        Ok(lines.join("\n"))
    }
}

impl Default for ReportService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReportApi for ReportService {
    async fn extract(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<ExtractionOutcome, PipelineError> {
        ReportService::extract(self, filename, bytes).await
    }

    async fn analyze(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<AnalysisOutcome, PipelineError> {
        ReportService::analyze(self, filename, bytes).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        ReportService::metrics_snapshot(self)
    }
}

/// Filename stem with spaces flattened, used to derive artifact keys.
fn sanitized_stem(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("document")
        .replace(' ', "_")
}

/// Full staging key for a submitted document, spaces flattened.
fn staged_key(filename: &str) -> String {
    filename.replace(' ', "_")
}

fn timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_kind_recognizes_known_extensions() {
        assert_eq!(MediaKind::from_filename("scan.png").unwrap(), MediaKind::Image);
        assert_eq!(MediaKind::from_filename("scan.JPG").unwrap(), MediaKind::Image);
        assert_eq!(
            MediaKind::from_filename("report.pdf").unwrap(),
            MediaKind::PaginatedDocument
        );
    }

    #[test]
    fn unknown_extension_is_rejected_with_detail() {
        let error = MediaKind::from_filename("notes.docx").unwrap_err();
        assert!(matches!(
            &error,
            PipelineError::UnsupportedMedia { extension } if extension.as_str() == "docx"
        ));
        assert!(error.to_string().contains("docx"));
    }

    #[test]
    fn missing_extension_is_rejected() {
        assert!(MediaKind::from_filename("README").is_err());
    }

    #[test]
    fn artifact_stems_flatten_spaces() {
        assert_eq!(sanitized_stem("blood panel 2024.pdf"), "blood_panel_2024");
        assert_eq!(staged_key("blood panel 2024.pdf"), "blood_panel_2024.pdf");
    }
}
