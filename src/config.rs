//! Configuration for the receipt-capture workflow.
//!
//! Everything the Analysis Client and Poll Loop need — vendor endpoint, API
//! key, model id, poll interval and attempt budget — lives in one explicit
//! [`CaptureConfig`] passed in at construction. Nothing is read from ambient
//! process state, which is what makes the workflow testable against a fake
//! vendor: point `endpoint` at a mock server and every knob is under the
//! test's control.
//!
//! # Design choice: builder over constructor
//! The builder lets callers set only what they care about (usually endpoint,
//! key, and storage) and rely on documented defaults for the rest.

use crate::error::ReceiptError;
use crate::progress::CaptureProgressCallback;
use crate::storage::BlobStorage;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default vendor model: the prebuilt receipt model.
pub const DEFAULT_MODEL_ID: &str = "prebuilt-receipt";

/// Vendor API version the wire contract was written against.
pub const DEFAULT_API_VERSION: &str = "2023-07-31";

/// Configuration for a receipt capture.
///
/// Built via [`CaptureConfig::builder()`].
///
/// # Example
/// ```rust
/// use receipt2ledger::{CaptureConfig, InMemoryStorage};
/// use std::sync::Arc;
///
/// let config = CaptureConfig::builder()
///     .endpoint("https://myresource.cognitiveservices.example.com")
///     .api_key("secret")
///     .storage(Arc::new(InMemoryStorage::new("https://cdn.example")))
///     .max_poll_attempts(15)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct CaptureConfig {
    /// Vendor base URL, e.g. `https://<resource>.cognitiveservices.azure.com`.
    pub endpoint: String,

    /// Vendor subscription key, sent as `Ocp-Apim-Subscription-Key`.
    pub api_key: String,

    /// Analysis model identifier. Default: [`DEFAULT_MODEL_ID`].
    pub model_id: String,

    /// Vendor API version query parameter. Default: [`DEFAULT_API_VERSION`].
    pub api_version: String,

    /// Spacing between poll attempts. Default: 1 s.
    ///
    /// Attempts are strictly sequential and strictly spaced by this interval;
    /// the loop suspends the task between attempts, it never busy-waits.
    pub poll_interval: Duration,

    /// Maximum poll attempts before the capture times out. Default: 30.
    ///
    /// Observed vendor operations finish in 2–10 s for a single receipt
    /// image, so 30 × 1 s gives a wide margin. The budget is configuration,
    /// not contract — neither 15 nor 30 is load-bearing.
    pub max_poll_attempts: u32,

    /// Per-HTTP-request timeout for submit and poll calls. Default: 30 s.
    pub http_timeout: Duration,

    /// TTL of the readable reference handed to the vendor. Default: 15 min
    /// (the longest the vendor should ever need to fetch the image).
    pub signed_url_ttl: Duration,

    /// Blob-storage collaborator the image is written to.
    pub storage: Option<Arc<dyn BlobStorage>>,

    /// Optional progress callback receiving workflow state events.
    pub progress_callback: Option<Arc<dyn CaptureProgressCallback>>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            poll_interval: Duration::from_secs(1),
            max_poll_attempts: 30,
            http_timeout: Duration::from_secs(30),
            signed_url_ttl: Duration::from_secs(15 * 60),
            storage: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for CaptureConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("model_id", &self.model_id)
            .field("api_version", &self.api_version)
            .field("poll_interval", &self.poll_interval)
            .field("max_poll_attempts", &self.max_poll_attempts)
            .field("http_timeout", &self.http_timeout)
            .field("signed_url_ttl", &self.signed_url_ttl)
            .field("storage", &self.storage.as_ref().map(|_| "<dyn BlobStorage>"))
            .finish()
    }
}

impl CaptureConfig {
    /// Create a new builder for `CaptureConfig`.
    pub fn builder() -> CaptureConfigBuilder {
        CaptureConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`CaptureConfig`].
#[derive(Debug)]
pub struct CaptureConfigBuilder {
    config: CaptureConfig,
}

impl CaptureConfigBuilder {
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        // The submit URL is assembled as {endpoint}/formrecognizer/…, so a
        // trailing slash would produce a double slash the vendor rejects.
        self.config.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    pub fn model_id(mut self, model: impl Into<String>) -> Self {
        self.config.model_id = model.into();
        self
    }

    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.config.api_version = version.into();
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn max_poll_attempts(mut self, n: u32) -> Self {
        self.config.max_poll_attempts = n.max(1);
        self
    }

    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.config.http_timeout = timeout;
        self
    }

    pub fn signed_url_ttl(mut self, ttl: Duration) -> Self {
        // Cap at 15 minutes: the reference is handed to an external service
        // over the open internet and should not outlive the analysis.
        self.config.signed_url_ttl = ttl.min(Duration::from_secs(15 * 60));
        self
    }

    pub fn storage(mut self, storage: Arc<dyn BlobStorage>) -> Self {
        self.config.storage = Some(storage);
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn CaptureProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<CaptureConfig, ReceiptError> {
        let c = &self.config;
        if c.endpoint.is_empty() {
            return Err(ReceiptError::InvalidConfig(
                "Vendor endpoint must be set".into(),
            ));
        }
        if c.api_key.is_empty() {
            return Err(ReceiptError::InvalidConfig(
                "Vendor API key must be set".into(),
            ));
        }
        if c.storage.is_none() {
            return Err(ReceiptError::InvalidConfig(
                "A BlobStorage implementation must be set".into(),
            ));
        }
        if c.max_poll_attempts == 0 {
            return Err(ReceiptError::InvalidConfig(
                "max_poll_attempts must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}
