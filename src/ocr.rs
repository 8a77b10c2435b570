//! OCR provider integration and job lifecycle management.
//!
//! Two extraction paths are exposed, selected by the document's media type:
//!
//! - Single images go through [`OcrClient::detect`], which returns the complete block list in
//!   one blocking call.
//! - Paginated documents are submitted with [`OcrClient::start_job`] and driven to completion
//!   by [`wait_for_completion`], which polls at a fixed interval and drains the provider's
//!   continuation-token pagination once the job succeeds.
//!
//! Only `LINE` blocks carry text the pipeline cares about; every other block type the provider
//! emits is discarded by [`lines_from_blocks`].

mod client;
mod poller;
mod types;

pub use client::OcrClient;
pub use poller::wait_for_completion;
pub use types::{BlockType, DocumentLocation, JobStatus, OcrError, PollResponse, TextBlock};

/// Collect the text of `LINE` blocks, preserving provider order.
pub fn lines_from_blocks(blocks: &[TextBlock]) -> Vec<String> {
    blocks
        .iter()
        .filter(|block| block.kind == BlockType::Line)
        .map(|block| block.text.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_line_blocks_in_order() {
        let blocks = vec![
            TextBlock {
                kind: BlockType::Page,
                text: String::new(),
            },
            TextBlock {
                kind: BlockType::Line,
                text: "Hemoglobin 13.5".into(),
            },
            TextBlock {
                kind: BlockType::Word,
                text: "Hemoglobin".into(),
            },
            TextBlock {
                kind: BlockType::Line,
                text: "Glucose 95".into(),
            },
        ];

        assert_eq!(
            lines_from_blocks(&blocks),
            vec!["Hemoglobin 13.5".to_string(), "Glucose 95".to_string()]
        );
    }

    #[test]
    fn unknown_block_types_are_discarded() {
        let decoded: Vec<TextBlock> = serde_json::from_value(serde_json::json!([
            { "type": "SELECTION_ELEMENT", "text": "x" },
            { "type": "LINE", "text": "kept" }
        ]))
        .expect("blocks decode");

        assert_eq!(lines_from_blocks(&decoded), vec!["kept".to_string()]);
    }
}
