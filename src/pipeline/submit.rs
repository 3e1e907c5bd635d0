//! Analysis submission: hand the stored image to the document-analysis
//! vendor and obtain a handle to the asynchronous operation.
//!
//! ## Success is strict
//!
//! The vendor contract defines exactly one good outcome: HTTP 202 **and** an
//! `operation-location` response header. Everything else — a 200, a 4xx/5xx,
//! a missing header, a connection failure — is a hard
//! [`AnalysisSubmissionFailed`](crate::error::ReceiptError::AnalysisSubmissionFailed)
//! carrying the vendor status and body for diagnostics. There is no retry at
//! this layer; a failed submission aborts the capture immediately.

use crate::config::CaptureConfig;
use crate::error::ReceiptError;
use reqwest::StatusCode;
use serde_json::json;
use tracing::{debug, info};

/// Header carrying the vendor subscription key on every request.
pub(crate) const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Response header naming the URL to poll for the operation's status.
const OPERATION_LOCATION_HEADER: &str = "operation-location";

/// States of one in-flight analysis operation.
///
/// Transitions are driven solely by poll responses. `Succeeded`, `Failed`,
/// and `TimedOut` are terminal — no transition ever leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Accepted by the vendor, not yet polled.
    Submitted,
    /// At least one poll observed the operation still in progress.
    Running,
    /// Vendor reported the analysis complete.
    Succeeded,
    /// Vendor reported the analysis failed, or a poll hit an HTTP error.
    Failed,
    /// The attempt budget ran out first.
    TimedOut,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed | JobState::TimedOut)
    }
}

/// One in-flight request to the analysis vendor.
///
/// Owned exclusively by the poll loop for its lifetime and discarded once a
/// terminal state is reached.
#[derive(Debug, Clone)]
pub struct AnalysisJob {
    /// Opaque URL returned by the vendor, polled for status.
    pub operation_url: String,
    /// Current state; see [`JobState`].
    pub state: JobState,
    /// Poll attempts made so far.
    pub attempts_made: u32,
}

/// HTTP client for the analysis vendor, configured once per capture.
///
/// Holds everything the submit call and the poll loop need, copied out of
/// [`CaptureConfig`] at construction so neither ever reads ambient state.
pub struct AnalysisClient {
    pub(crate) http: reqwest::Client,
    pub(crate) api_key: String,
    pub(crate) poll_interval: std::time::Duration,
    pub(crate) max_poll_attempts: u32,
    endpoint: String,
    model_id: String,
    api_version: String,
}

impl AnalysisClient {
    /// Build a client from the capture configuration.
    pub fn new(config: &CaptureConfig) -> Result<Self, ReceiptError> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| ReceiptError::Internal(format!("http client: {e}")))?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            poll_interval: config.poll_interval,
            max_poll_attempts: config.max_poll_attempts,
            endpoint: config.endpoint.clone(),
            model_id: config.model_id.clone(),
            api_version: config.api_version.clone(),
        })
    }

    /// The vendor URL a new analysis is POSTed to.
    fn submit_url(&self) -> String {
        format!(
            "{}/formrecognizer/documentModels/{}:analyze?api-version={}",
            self.endpoint, self.model_id, self.api_version
        )
    }

    /// Submit a readable image URL for analysis.
    ///
    /// Returns the job in state [`JobState::Submitted`] on the one good
    /// outcome (202 + `operation-location`); any other outcome is
    /// [`ReceiptError::AnalysisSubmissionFailed`].
    pub async fn submit(&self, readable_image_url: &str) -> Result<AnalysisJob, ReceiptError> {
        let url = self.submit_url();
        debug!("Submitting analysis to {}", url);

        let response = self
            .http
            .post(&url)
            .header(SUBSCRIPTION_KEY_HEADER, &self.api_key)
            .json(&json!({ "urlSource": readable_image_url }))
            .send()
            .await
            .map_err(|e| ReceiptError::AnalysisSubmissionFailed {
                status: None,
                body: e.to_string(),
            })?;

        let status = response.status();
        if status != StatusCode::ACCEPTED {
            let body = response.text().await.unwrap_or_default();
            return Err(ReceiptError::AnalysisSubmissionFailed {
                status: Some(status.as_u16()),
                body,
            });
        }

        let operation_url = response
            .headers()
            .get(OPERATION_LOCATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ReceiptError::AnalysisSubmissionFailed {
                status: Some(status.as_u16()),
                body: "202 response missing operation-location header".to_string(),
            })?;

        info!("Analysis accepted, operation at {}", operation_url);

        Ok(AnalysisJob {
            operation_url,
            state: JobState::Submitted,
            attempts_made: 0,
        })
    }
}
