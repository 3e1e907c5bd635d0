//! # receipt2ledger
//!
//! Turn receipt photos into categorized expense records using a third-party
//! document-analysis cloud service.
//!
//! ## Why this crate?
//!
//! Hand-keying receipts is the reason most personal expense trackers go
//! stale. This crate implements the capture side of the ledger: store the
//! image, let a prebuilt receipt model read it, and normalize whatever comes
//! back — however partial or malformed — into a record a human can review
//! and correct. The vendor operation is asynchronous, so the interesting
//! failure modes (timeouts, partial extraction, malformed vendor data) all
//! live in the poll-and-normalize path this crate is built around.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image bytes
//!  │
//!  ├─ 1. Upload     validate + store via the BlobStorage collaborator
//!  ├─ 2. Submit     one POST to the vendor; strictly 202 + operation-location
//!  ├─ 3. Poll       sequential, interval-spaced GETs up to the attempt budget
//!  ├─ 4. Normalize  untrusted vendor fields → canonical receipt (pure, total)
//!  └─ 5. Output     CanonicalReceipt + per-capture stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use receipt2ledger::{capture, CaptureConfig, InMemoryStorage};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CaptureConfig::builder()
//!         .endpoint("https://myresource.cognitiveservices.azure.com")
//!         .api_key(std::env::var("DI_KEY")?)
//!         .storage(Arc::new(InMemoryStorage::new("https://cdn.example.com")))
//!         .build()?;
//!
//!     let bytes = std::fs::read("receipt.jpg")?;
//!     let output = capture(&bytes, "image/jpeg", "receipt.jpg", &config).await?;
//!     println!("{}", serde_json::to_string_pretty(&output.receipt)?);
//!     eprintln!("{} poll attempts, {}ms",
//!         output.stats.poll_attempts,
//!         output.stats.total_duration_ms);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `receipt2ledger` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! receipt2ledger = { version = "0.3", default-features = false }
//! ```
//!
//! ## Failure model
//!
//! Every [`ReceiptError`] is fatal to its capture; nothing is retried
//! automatically. The single internally-absorbed failure is a transient
//! network error on one poll GET, which consumes one attempt of the bounded
//! budget. The normalizer never fails — partial extraction degrades to
//! defaults for a human to fix.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod capture;
pub mod config;
pub mod error;
pub mod output;
pub mod persist;
pub mod pipeline;
pub mod progress;
pub mod storage;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use capture::{capture, capture_and_persist, capture_sync};
pub use config::{CaptureConfig, CaptureConfigBuilder, DEFAULT_API_VERSION, DEFAULT_MODEL_ID};
pub use error::ReceiptError;
pub use output::{CanonicalReceipt, CaptureOutput, CaptureStats};
pub use persist::{InMemoryRepository, PersistError, ReceiptRepository, StoredReceipt};
pub use pipeline::normalize::{normalize, FieldValue, RawExtractedFields};
pub use pipeline::poll::{AnalyzeResult, AnalyzedDocument};
pub use pipeline::submit::{AnalysisClient, AnalysisJob, JobState};
pub use pipeline::upload::StoredImage;
pub use progress::{CaptureProgressCallback, NoopProgressCallback, ProgressCallback};
pub use storage::{BlobStorage, InMemoryStorage, LocalDirStorage, StorageError};
