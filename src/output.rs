//! Output types: the canonical receipt and per-capture statistics.
//!
//! [`CanonicalReceipt`] is the core's output contract — the normalized,
//! storage-ready representation handed by value to the caller. Its two
//! invariants are enforced by construction in the normalizer and re-checked
//! nowhere else:
//!
//! * `total_amount >= 0` (sign in vendor data is meaningless; absolute value
//!   is always taken)
//! * `transaction_date` is a real calendar date or `None` — never a raw
//!   unparsed string

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The application's normalized, storage-ready representation of a parsed
/// receipt.
///
/// Every field has a deliberate "unrecoverable" default (`""`, `0`, `None`)
/// so the normalizer can always produce a value for a human to correct later,
/// no matter how little the vendor extracted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalReceipt {
    /// Merchant name; empty string if unrecoverable.
    pub store_name: String,
    /// Non-negative total; zero if unrecoverable.
    pub total_amount: Decimal,
    /// Calendar date of the transaction (time-of-day discarded), or `None`.
    /// Serializes as `YYYY-MM-DD` / `null`.
    pub transaction_date: Option<NaiveDate>,
    /// Permanent reference to the stored image — distinct from the
    /// short-lived readable URL handed to the analysis vendor.
    pub source_image_url: String,
}

impl CanonicalReceipt {
    /// The all-default receipt for a given image, used when the vendor
    /// returned zero documents or zero fields.
    pub fn empty(source_image_url: impl Into<String>) -> Self {
        Self {
            store_name: String::new(),
            total_amount: Decimal::ZERO,
            transaction_date: None,
            source_image_url: source_image_url.into(),
        }
    }
}

/// Result of a successful capture: the receipt plus the storage key of the
/// image and timing/attempt statistics.
#[derive(Debug, Clone)]
pub struct CaptureOutput {
    /// The normalized receipt, ready for the persistence layer.
    pub receipt: CanonicalReceipt,
    /// Opaque storage key the image was stored under.
    pub image_key: String,
    /// Capture statistics.
    pub stats: CaptureStats,
}

/// Statistics about a capture run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CaptureStats {
    /// Poll attempts consumed before the vendor reached `succeeded`.
    pub poll_attempts: u32,
    /// Wall-clock time spent storing the image.
    pub upload_duration_ms: u64,
    /// Wall-clock time from submission to the terminal vendor state
    /// (dominated by poll-interval sleeps).
    pub analysis_duration_ms: u64,
    /// Total wall-clock time for the whole capture.
    pub total_duration_ms: u64,
}
