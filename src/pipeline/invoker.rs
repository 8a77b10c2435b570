//! Per-chunk model invocation with fault isolation.
//!
//! One bad chunk must never abort the batch: each chunk's outcome is recorded individually, a
//! failure is logged and skipped, and an all-failed batch yields an empty success sequence
//! rather than an error. Submission order is preserved throughout.

use crate::llm::{
    InvokeRequest, LlmClient, LlmError, MAX_GENERATION_TOKENS, ModelResponse,
    SAMPLING_TEMPERATURE,
};
use crate::pipeline::prompts::ExtractionTask;

/// Outcome of one chunk's model invocation.
#[derive(Debug)]
pub struct ChunkInvocation {
    /// Zero-based position of the chunk in submission order.
    pub index: usize,
    /// Decoded reply, or the reason this chunk was skipped.
    pub outcome: Result<ModelResponse, LlmError>,
}

/// Invoke the model once per chunk, recording each outcome in submission order.
pub async fn invoke_chunks(
    client: &dyn LlmClient,
    task: ExtractionTask,
    chunks: &[String],
) -> Vec<ChunkInvocation> {
    let mut invocations = Vec::with_capacity(chunks.len());

    for (index, chunk) in chunks.iter().enumerate() {
        tracing::info!(
            chunk = index + 1,
            total = chunks.len(),
            task = ?task,
            "Invoking model for chunk"
        );

        let outcome = client
            .invoke(InvokeRequest {
                instructions: task.instructions().to_string(),
                input_text: chunk.clone(),
                max_tokens: MAX_GENERATION_TOKENS,
                temperature: SAMPLING_TEMPERATURE,
            })
            .await;

        if let Err(error) = &outcome {
            tracing::warn!(chunk = index + 1, error = %error, "Chunk invocation failed; skipping");
        }

        invocations.push(ChunkInvocation { index, outcome });
    }

    invocations
}

/// Successful replies in submission order.
pub fn successes(invocations: &[ChunkInvocation]) -> Vec<ModelResponse> {
    invocations
        .iter()
        .filter_map(|invocation| invocation.outcome.as_ref().ok().cloned())
        .collect()
}

/// Number of chunks whose invocation failed.
pub fn failure_count(invocations: &[ChunkInvocation]) -> usize {
    invocations
        .iter()
        .filter(|invocation| invocation.outcome.is_err())
        .count()
}
