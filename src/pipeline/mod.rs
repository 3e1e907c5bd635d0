//! Pipeline stages for receipt capture.
//!
//! Each submodule implements exactly one step of the workflow. Keeping
//! stages separate makes each independently testable and lets us swap a
//! collaborator (e.g. a different object store) without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! upload ──▶ submit ──▶ poll ──▶ normalize
//! (blob store) (HTTP 202) (bounded loop) (pure)
//! ```
//!
//! 1. [`upload`]    — validate the image and store it; mint the permanent URL
//!    and the short-lived readable reference for the vendor
//! 2. [`submit`]    — one POST to the analysis vendor; strictly HTTP 202 plus
//!    an `operation-location` header, or the workflow aborts
//! 3. [`poll`]      — sequential, interval-spaced GETs against the operation
//!    handle up to a configured attempt budget; the only stage with a retry
//!    of any kind
//! 4. [`normalize`] — map the vendor's untrusted field payload into the
//!    canonical receipt; pure, no I/O, never fails

pub mod normalize;
pub mod poll;
pub mod submit;
pub mod upload;
