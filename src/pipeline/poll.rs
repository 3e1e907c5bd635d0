//! The poll loop: drive an analysis operation to a terminal state within a
//! bounded attempt budget.
//!
//! ## Outcome classification
//!
//! Each attempt is one GET against the operation handle, and its outcome
//! falls into exactly one of four classes:
//!
//! * **Conclusive success** — vendor status `succeeded`; return the payload.
//! * **Conclusive failure** — vendor status `failed`, or the GET returned an
//!   HTTP error ≥ 400; abort immediately without consuming the remaining
//!   budget. Retrying either would fail the same way.
//! * **Inconclusive** — any in-progress status, an unparseable body, or a
//!   transport-level failure on this one GET; consume the attempt and keep
//!   going. A network blip on a single poll must not kill an analysis that
//!   is still running server-side.
//! * **Budget exhausted** — no terminal vendor state within
//!   `max_poll_attempts`; the capture times out. The loop never re-submits;
//!   restarting the workflow is a caller decision.
//!
//! Attempts are strictly sequential and strictly spaced by the configured
//! interval — the loop suspends the task between attempts and never polls
//! concurrently.

use crate::error::ReceiptError;
use crate::pipeline::submit::{AnalysisClient, AnalysisJob, JobState, SUBSCRIPTION_KEY_HEADER};
use crate::progress::CaptureProgressCallback;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Vendor poll-response body.
///
/// The vendor has been observed carrying `status` either at the top level or
/// nested inside `analyzeResult`, so both are read.
#[derive(Debug, Deserialize)]
pub struct PollResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(rename = "analyzeResult")]
    analyze_result: Option<AnalyzeResult>,
    #[serde(default)]
    error: Option<VendorError>,
}

impl PollResponse {
    fn vendor_status(&self) -> Option<&str> {
        self.status
            .as_deref()
            .or_else(|| self.analyze_result.as_ref().and_then(|r| r.status.as_deref()))
    }
}

/// The vendor's analysis payload: zero or more extracted documents.
#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeResult {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub documents: Vec<AnalyzedDocument>,
}

/// One extracted document: an untrusted mapping of field name to whatever
/// shape the vendor chose to return for it.
#[derive(Debug, Default, Deserialize)]
pub struct AnalyzedDocument {
    #[serde(default)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// Vendor diagnostic attached to a failed operation.
#[derive(Debug, Deserialize)]
struct VendorError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl VendorError {
    fn describe(&self) -> String {
        match (&self.code, &self.message) {
            (Some(c), Some(m)) => format!("{c}: {m}"),
            (Some(c), None) => c.clone(),
            (None, Some(m)) => m.clone(),
            (None, None) => "no diagnostic provided".to_string(),
        }
    }
}

/// Poll `job` to completion, returning the analysis payload on success.
///
/// The job is owned by this loop for its lifetime; on return its `state` is
/// terminal and `attempts_made` reflects the attempts consumed.
pub async fn await_analysis(
    client: &AnalysisClient,
    job: &mut AnalysisJob,
    progress: Option<&dyn CaptureProgressCallback>,
) -> Result<AnalyzeResult, ReceiptError> {
    let budget = client.max_poll_attempts;

    for attempt in 1..=budget {
        sleep(client.poll_interval).await;
        job.attempts_made = attempt;
        if let Some(cb) = progress {
            cb.on_poll_attempt(attempt, budget);
        }

        let response = match client
            .http
            .get(&job.operation_url)
            .header(SUBSCRIPTION_KEY_HEADER, &client.api_key)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                // Transient transport failure on one poll is inconclusive.
                warn!("Poll attempt {}/{} failed in transit: {}", attempt, budget, e);
                continue;
            }
        };

        let status = response.status();
        if status.as_u16() >= 400 {
            let body = response.text().await.unwrap_or_default();
            job.state = JobState::Failed;
            return Err(ReceiptError::AnalysisPollError {
                status: status.as_u16(),
                body,
            });
        }

        let body: PollResponse = match response.json().await {
            Ok(b) => b,
            Err(e) => {
                warn!("Poll attempt {}/{} returned unparseable body: {}", attempt, budget, e);
                continue;
            }
        };

        match body.vendor_status() {
            Some("succeeded") => {
                job.state = JobState::Succeeded;
                info!("Analysis succeeded after {} attempt(s)", attempt);
                return Ok(body.analyze_result.unwrap_or_default());
            }
            Some("failed") => {
                job.state = JobState::Failed;
                let detail = body
                    .error
                    .as_ref()
                    .map(VendorError::describe)
                    .unwrap_or_else(|| "vendor reported status 'failed'".to_string());
                return Err(ReceiptError::AnalysisFailed { detail });
            }
            other => {
                debug!(
                    "Poll attempt {}/{}: operation in progress ({})",
                    attempt,
                    budget,
                    other.unwrap_or("no status")
                );
                job.state = JobState::Running;
            }
        }
    }

    job.state = JobState::TimedOut;
    Err(ReceiptError::AnalysisTimeout {
        attempts: budget,
        interval_ms: client.poll_interval.as_millis() as u64,
    })
}
