//! Polling driver that carries an OCR job from submission to drained output.

use std::time::Duration;

use tokio::time::Instant;

use crate::ocr::client::OcrClient;
use crate::ocr::types::{JobStatus, OcrError};
use crate::ocr::lines_from_blocks;

const NO_MESSAGE_PLACEHOLDER: &str = "No error message provided";

/// Poll an OCR job until it reaches a terminal status, then collect every page of output.
///
/// The calling task sleeps `poll_interval` between status probes and is blocked for the job's
/// entire duration; processing is strictly serial. When `deadline` is set and elapses before a
/// terminal status is observed, the job is abandoned with [`OcrError::TimedOut`]. On `FAILED`
/// the provider's status message is surfaced verbatim. On `SUCCEEDED` the `LINE` text of the
/// terminal response is collected first, and the provider's continuation-token pagination is
/// followed until no token remains, appending each page's lines in provider order.
pub async fn wait_for_completion(
    client: &OcrClient,
    job_id: &str,
    poll_interval: Duration,
    deadline: Option<Duration>,
) -> Result<Vec<String>, OcrError> {
    let started = Instant::now();

    let terminal = loop {
        let response = client.poll_job(job_id, None).await?;
        match response.status {
            JobStatus::Succeeded | JobStatus::Failed => break response,
            JobStatus::Running => {
                if let Some(limit) = deadline
                    && started.elapsed() >= limit
                {
                    let waited = started.elapsed();
                    tracing::warn!(job_id, ?waited, "Abandoning OCR job after deadline");
                    return Err(OcrError::TimedOut {
                        job_id: job_id.to_string(),
                        waited,
                    });
                }
                tracing::debug!(job_id, "OCR job still running");
                tokio::time::sleep(poll_interval).await;
            }
        }
    };

    if terminal.status == JobStatus::Failed {
        let message = terminal
            .status_message
            .unwrap_or_else(|| NO_MESSAGE_PLACEHOLDER.to_string());
        tracing::error!(job_id, %message, "OCR job failed");
        return Err(OcrError::JobFailed { message });
    }

    let mut lines = lines_from_blocks(&terminal.blocks);
    let mut token = terminal.next_token;
    while let Some(next) = token {
        tracing::debug!(job_id, "Fetching next page of OCR results");
        let page = client.poll_job(job_id, Some(&next)).await?;
        lines.extend(lines_from_blocks(&page.blocks));
        token = page.next_token;
    }

    tracing::info!(job_id, lines = lines.len(), "Collected OCR job output");
    Ok(lines)
}
