//! Eager capture entry points.
//!
//! One call drives the whole workflow for a single uploaded image:
//!
//! ```text
//! idle → uploading → submitted → polling → extracted → normalized
//!                │            │         └─ timed_out
//!                │            └─ submission_failed
//!                └─ storage_failed
//! ```
//!
//! Each capture owns its analysis job and shares no mutable state with other
//! captures; the poll loop suspends cooperatively between attempts, so many
//! captures can be in flight on one executor without one's poll delay
//! stalling another. There is no cancellation path and no automatic
//! re-submission — a failed capture is retried by the user uploading again.

use crate::config::CaptureConfig;
use crate::error::ReceiptError;
use crate::output::{CaptureOutput, CaptureStats};
use crate::persist::{ReceiptRepository, StoredReceipt};
use crate::pipeline::submit::AnalysisClient;
use crate::pipeline::{normalize, poll, upload};
use std::time::Instant;
use tracing::{debug, info};

/// Capture a receipt: store the image, analyze it, and normalize the result.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `bytes`         — raw image bytes (JPEG or PNG)
/// * `content_type`  — declared MIME type, checked against the allow-list
/// * `filename_hint` — used only to build a readable storage key
/// * `config`        — capture configuration
///
/// # Errors
/// Any [`ReceiptError`]; all are fatal to this capture. The normalizer
/// itself never fails — once the vendor succeeds, so does the capture.
pub async fn capture(
    bytes: &[u8],
    content_type: &str,
    filename_hint: &str,
    config: &CaptureConfig,
) -> Result<CaptureOutput, ReceiptError> {
    let result = run_capture(bytes, content_type, filename_hint, config).await;

    if let Some(ref cb) = config.progress_callback {
        match &result {
            Ok(_) => cb.on_complete("normalized"),
            Err(e) => cb.on_complete(e.terminal_state()),
        }
    }

    result
}

async fn run_capture(
    bytes: &[u8],
    content_type: &str,
    filename_hint: &str,
    config: &CaptureConfig,
) -> Result<CaptureOutput, ReceiptError> {
    let total_start = Instant::now();
    let progress = config.progress_callback.as_deref();
    info!("Starting capture: {} bytes, {}", bytes.len(), content_type);

    // ── Step 1: Store the image ──────────────────────────────────────────
    if let Some(cb) = progress {
        cb.on_upload_start(bytes.len());
    }
    let upload_start = Instant::now();
    let stored = upload::store_image(bytes, content_type, filename_hint, config).await?;
    let upload_duration_ms = upload_start.elapsed().as_millis() as u64;
    if let Some(cb) = progress {
        cb.on_uploaded(&stored.key);
    }

    // ── Step 2: Submit to the analysis vendor ────────────────────────────
    let analysis_start = Instant::now();
    let client = AnalysisClient::new(config)?;
    let mut job = client.submit(&stored.readable_url).await?;
    if let Some(cb) = progress {
        cb.on_submitted(&job.operation_url);
    }

    // ── Step 3: Poll to a terminal state ─────────────────────────────────
    let analysis = poll::await_analysis(&client, &mut job, progress).await?;
    let analysis_duration_ms = analysis_start.elapsed().as_millis() as u64;
    if let Some(cb) = progress {
        cb.on_analyzed(job.attempts_made);
    }

    // ── Step 4: Normalize ────────────────────────────────────────────────
    let fields = normalize::RawExtractedFields::from_analysis(&analysis);
    let receipt = normalize::normalize(&fields, &stored.permanent_url);
    debug!("Normalized receipt: {:?}", receipt);

    let stats = CaptureStats {
        poll_attempts: job.attempts_made,
        upload_duration_ms,
        analysis_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Capture complete in {}ms ({} poll attempts)",
        stats.total_duration_ms, stats.poll_attempts
    );

    Ok(CaptureOutput {
        receipt,
        image_key: stored.key,
        stats,
    })
}

/// Capture a receipt and hand it straight to the persistence collaborator.
///
/// Convenience wrapper for callers that do not need the intermediate
/// [`CaptureOutput`].
pub async fn capture_and_persist(
    bytes: &[u8],
    content_type: &str,
    filename_hint: &str,
    user_id: &str,
    category: &str,
    config: &CaptureConfig,
    repository: &dyn ReceiptRepository,
) -> Result<StoredReceipt, ReceiptError> {
    let output = capture(bytes, content_type, filename_hint, config).await?;
    repository
        .save(user_id, category, output.receipt)
        .await
        .map_err(|e| ReceiptError::Internal(format!("persist: {e}")))
}

/// Synchronous wrapper around [`capture`].
///
/// Creates a temporary tokio runtime internally.
pub fn capture_sync(
    bytes: &[u8],
    content_type: &str,
    filename_hint: &str,
    config: &CaptureConfig,
) -> Result<CaptureOutput, ReceiptError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ReceiptError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(capture(bytes, content_type, filename_hint, config))
}
