//! Narrative reply normalization for display.

use crate::llm::ModelResponse;

/// Placeholder shown when no reply carries displayable text.
pub const NO_CONTENT_PLACEHOLDER: &str = "No content found.";

/// Extract display text from the first reply in a batch.
///
/// Falls back to the fixed placeholder when the batch is empty, the reply carries no text
/// segment, or the segment is empty. Always produces displayable text; never panics.
pub fn narrative_text(responses: &[ModelResponse]) -> String {
    responses
        .first()
        .and_then(|response| response.first_text())
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| NO_CONTENT_PLACEHOLDER.to_string())
}
