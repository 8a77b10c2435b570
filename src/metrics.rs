use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing extraction activity.
#[derive(Default)]
pub struct PipelineMetrics {
    documents_processed: AtomicU64,
    chunks_submitted: AtomicU64,
    chunks_failed: AtomicU64,
    rows_extracted: AtomicU64,
}

impl PipelineMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a processed document together with its chunk and row counters.
    pub fn record_document(&self, chunks: u64, failed_chunks: u64, rows: u64) {
        self.documents_processed.fetch_add(1, Ordering::Relaxed);
        self.chunks_submitted.fetch_add(chunks, Ordering::Relaxed);
        self.chunks_failed.fetch_add(failed_chunks, Ordering::Relaxed);
        self.rows_extracted.fetch_add(rows, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_processed: self.documents_processed.load(Ordering::Relaxed),
            chunks_submitted: self.chunks_submitted.load(Ordering::Relaxed),
            chunks_failed: self.chunks_failed.load(Ordering::Relaxed),
            rows_extracted: self.rows_extracted.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of extraction counters used for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Number of documents run through the pipeline since startup.
    pub documents_processed: u64,
    /// Total chunks submitted to the LLM across all documents.
    pub chunks_submitted: u64,
    /// Chunks whose LLM invocation failed and was skipped.
    pub chunks_failed: u64,
    /// Total tabular rows produced by reconciliation.
    pub rows_extracted: u64,
}
