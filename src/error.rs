//! Error types for the receipt2ledger library.
//!
//! Every variant of [`ReceiptError`] is **fatal to the current capture**: the
//! workflow aborts, the user sees a failure message, and retry is a fresh
//! user-initiated capture. Nothing here is retried automatically — the only
//! internally-absorbed failure is a transient network error on a single poll
//! GET, which consumes one attempt of the bounded poll budget and never
//! surfaces as an error on its own.
//!
//! Each variant carries the vendor or storage diagnostics needed to log the
//! failure and render something actionable to the user, without the caller
//! having to re-fetch anything.

use thiserror::Error;

/// All errors returned by the receipt-capture workflow.
///
/// The field normalizer is deliberately absent from this taxonomy: it is a
/// total function that degrades to defaults instead of failing, so partial
/// OCR output reaches the human reviewer rather than being rejected.
#[derive(Debug, Error)]
pub enum ReceiptError {
    // ── Input validation ─────────────────────────────────────────────────
    /// The uploaded byte buffer was empty.
    #[error("Uploaded image is empty (0 bytes)")]
    EmptyImage,

    /// The declared MIME type is not on the allow-list.
    #[error("Unsupported image type '{content_type}' — only image/jpeg and image/png are accepted")]
    UnsupportedImageType { content_type: String },

    // ── Storage errors ───────────────────────────────────────────────────
    /// The blob store could not be reached or the write failed.
    /// The whole workflow aborts; nothing was submitted to the vendor.
    #[error("Object storage unavailable: {detail}")]
    StorageUnavailable { detail: String },

    // ── Vendor errors ────────────────────────────────────────────────────
    /// Submission did not yield HTTP 202 plus an `operation-location`
    /// header. `status` is `None` when the request never got a response
    /// (connection refused, DNS failure, timeout).
    #[error("Analysis submission failed (status {status:?}): {body}")]
    AnalysisSubmissionFailed { status: Option<u16>, body: String },

    /// A poll GET returned an HTTP error status (≥ 400). Distinct from a
    /// transient network failure, which is inconclusive and retried within
    /// the attempt budget.
    #[error("Analysis poll returned HTTP {status}: {body}")]
    AnalysisPollError { status: u16, body: String },

    /// The vendor reported the analysis operation itself as failed.
    /// Not retried — resubmitting the same image would fail the same way.
    #[error("Vendor analysis failed: {detail}")]
    AnalysisFailed { detail: String },

    /// The attempt budget ran out before the vendor reached a terminal
    /// state. A higher layer may restart the workflow from submission; the
    /// poll loop itself never re-submits.
    #[error(
        "Analysis timed out after {attempts} poll attempts ({interval_ms}ms apart).\n\
         The vendor operation may still complete server-side; re-upload to retry."
    )]
    AnalysisTimeout { attempts: u32, interval_ms: u64 },

    // ── Config errors ────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReceiptError {
    /// The terminal workflow state this error corresponds to, as a short
    /// label suitable for logs and user-facing status fields.
    pub fn terminal_state(&self) -> &'static str {
        match self {
            ReceiptError::EmptyImage
            | ReceiptError::UnsupportedImageType { .. }
            | ReceiptError::InvalidConfig(_) => "rejected",
            ReceiptError::StorageUnavailable { .. } => "storage_failed",
            ReceiptError::AnalysisSubmissionFailed { .. } => "submission_failed",
            ReceiptError::AnalysisPollError { .. } | ReceiptError::AnalysisFailed { .. } => {
                "poll_failed"
            }
            ReceiptError::AnalysisTimeout { .. } => "timed_out",
            ReceiptError::Internal(_) => "internal_error",
        }
    }
}
