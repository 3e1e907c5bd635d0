//! Progress-callback trait for workflow state events.
//!
//! Inject an [`Arc<dyn CaptureProgressCallback>`] via
//! [`crate::config::CaptureConfigBuilder::progress_callback`] to observe the
//! capture state machine as it advances:
//!
//! ```text
//! uploading → submitted → polling (one event per attempt) → analyzed → complete
//! ```
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers can
//! forward events to a WebSocket, a database status column, or a terminal
//! spinner without the library knowing anything about how the host
//! application communicates. The trait is `Send + Sync` because many captures
//! may run concurrently on one executor sharing a single callback.

use std::sync::Arc;

/// Called by the capture workflow as it moves through its states.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Events for one capture are strictly ordered
/// (attempts are sequential, never concurrent), but a shared callback may
/// receive interleaved events from different captures.
pub trait CaptureProgressCallback: Send + Sync {
    /// Called once before the image is written to blob storage.
    fn on_upload_start(&self, byte_len: usize) {
        let _ = byte_len;
    }

    /// Called when the image is stored and both references exist.
    fn on_uploaded(&self, key: &str) {
        let _ = key;
    }

    /// Called when the vendor accepted the submission (HTTP 202).
    fn on_submitted(&self, operation_url: &str) {
        let _ = operation_url;
    }

    /// Called before each poll attempt, after the interval sleep.
    ///
    /// # Arguments
    /// * `attempt` — 1-indexed attempt number
    /// * `budget`  — configured maximum attempts
    fn on_poll_attempt(&self, attempt: u32, budget: u32) {
        let _ = (attempt, budget);
    }

    /// Called when the vendor reached `succeeded`, before normalization.
    fn on_analyzed(&self, poll_attempts: u32) {
        let _ = poll_attempts;
    }

    /// Called once when the capture finishes, success or not.
    ///
    /// `terminal_state` is `"normalized"` on success, otherwise the label
    /// from [`crate::error::ReceiptError::terminal_state`].
    fn on_complete(&self, terminal_state: &str) {
        let _ = terminal_state;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl CaptureProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::CaptureConfig`].
pub type ProgressCallback = Arc<dyn CaptureProgressCallback>;
