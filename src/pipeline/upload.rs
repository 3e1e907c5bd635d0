//! Blob upload: validate the image and store it under a fresh key.
//!
//! ## Why two URLs?
//!
//! The analysis vendor fetches the image over the open internet, so it gets a
//! short-lived signed reference that dies with the analysis. The receipt
//! record, on the other hand, must reference the image for years — that is
//! the permanent URL, and only the permanent URL is ever embedded in a
//! [`crate::output::CanonicalReceipt`].

use crate::config::CaptureConfig;
use crate::error::ReceiptError;
use crate::storage::BlobStorage;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// MIME types accepted for upload.
pub const ALLOWED_CONTENT_TYPES: [&str; 2] = ["image/jpeg", "image/png"];

/// A stored receipt image: the opaque key plus both references to it.
#[derive(Debug, Clone)]
pub struct StoredImage {
    /// Opaque storage key the image was written under.
    pub key: String,
    /// Permanent (non-expiring) URL, embedded in the canonical receipt.
    pub permanent_url: String,
    /// Short-lived readable URL handed to the analysis vendor.
    pub readable_url: String,
}

/// Validate and store a receipt image.
///
/// # Errors
/// * [`ReceiptError::EmptyImage`] / [`ReceiptError::UnsupportedImageType`] —
///   input rejected before anything is written
/// * [`ReceiptError::StorageUnavailable`] — the blob store could not be
///   reached or the write/signing failed; the workflow aborts
pub async fn store_image(
    bytes: &[u8],
    content_type: &str,
    filename_hint: &str,
    config: &CaptureConfig,
) -> Result<StoredImage, ReceiptError> {
    if bytes.is_empty() {
        return Err(ReceiptError::EmptyImage);
    }

    let mime = essential_mime(content_type);
    if !ALLOWED_CONTENT_TYPES.contains(&mime) {
        return Err(ReceiptError::UnsupportedImageType {
            content_type: content_type.to_string(),
        });
    }

    let storage = config
        .storage
        .as_deref()
        .ok_or_else(|| ReceiptError::InvalidConfig("no BlobStorage configured".into()))?;

    let key = generate_key(filename_hint);
    debug!("Storing {} bytes under '{}'", bytes.len(), key);

    store_under_key(storage, &key, bytes, mime, config).await
}

async fn store_under_key(
    storage: &dyn BlobStorage,
    key: &str,
    bytes: &[u8],
    mime: &str,
    config: &CaptureConfig,
) -> Result<StoredImage, ReceiptError> {
    storage
        .put(key, bytes, mime)
        .await
        .map_err(|e| ReceiptError::StorageUnavailable {
            detail: format!("put '{key}': {e}"),
        })?;

    let readable_url = storage
        .signed_read_url(key, config.signed_url_ttl)
        .await
        .map_err(|e| ReceiptError::StorageUnavailable {
            detail: format!("sign '{key}': {e}"),
        })?;

    let permanent_url = storage.permanent_url(key);
    info!("Stored receipt image at {}", permanent_url);

    Ok(StoredImage {
        key: key.to_string(),
        permanent_url,
        readable_url,
    })
}

static RE_UNSAFE_KEY_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]+").unwrap());

/// Generate a storage key from the upload timestamp and a sanitized filename
/// hint, e.g. `receipts/1717430400123-grocery_run.jpg`.
///
/// Millisecond timestamp + filename is sufficient collision avoidance at
/// personal-app traffic volumes; it is not a strict uniqueness guarantee.
fn generate_key(filename_hint: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);

    let hint = RE_UNSAFE_KEY_CHARS.replace_all(filename_hint.trim(), "_");
    let hint = hint.trim_matches('_');
    if hint.is_empty() {
        format!("receipts/{millis}-receipt")
    } else {
        format!("receipts/{millis}-{hint}")
    }
}

/// Strip MIME parameters: `image/jpeg; charset=utf-8` → `image/jpeg`.
fn essential_mime(content_type: &str) -> &str {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use std::sync::Arc;

    fn config_with(storage: Arc<InMemoryStorage>) -> CaptureConfig {
        CaptureConfig::builder()
            .endpoint("https://vendor.test")
            .api_key("k")
            .storage(storage)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn stores_and_returns_both_urls() {
        let storage = Arc::new(InMemoryStorage::new("https://cdn.test"));
        let config = config_with(Arc::clone(&storage));

        let stored = store_image(b"jpeg-bytes", "image/jpeg", "lunch.jpg", &config)
            .await
            .unwrap();

        assert!(storage.has_blob(&stored.key));
        assert!(stored.permanent_url.starts_with("https://cdn.test/receipts/"));
        assert!(stored.readable_url.contains("expires="));
        assert_ne!(stored.permanent_url, stored.readable_url);
    }

    #[tokio::test]
    async fn empty_bytes_rejected() {
        let config = config_with(Arc::new(InMemoryStorage::new("https://cdn.test")));
        let err = store_image(b"", "image/jpeg", "x.jpg", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, ReceiptError::EmptyImage));
    }

    #[tokio::test]
    async fn disallowed_mime_rejected() {
        let config = config_with(Arc::new(InMemoryStorage::new("https://cdn.test")));
        let err = store_image(b"gif", "image/gif", "x.gif", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, ReceiptError::UnsupportedImageType { .. }));
    }

    #[tokio::test]
    async fn mime_parameters_ignored() {
        let config = config_with(Arc::new(InMemoryStorage::new("https://cdn.test")));
        let stored = store_image(b"png", "image/png; charset=binary", "x.png", &config).await;
        assert!(stored.is_ok());
    }

    #[tokio::test]
    async fn storage_failure_is_unavailable() {
        let storage = Arc::new(InMemoryStorage::new("https://cdn.test"));
        storage.set_unavailable(true);
        let config = config_with(storage);
        let err = store_image(b"bytes", "image/jpeg", "x.jpg", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, ReceiptError::StorageUnavailable { .. }));
    }

    #[test]
    fn key_sanitizes_hint() {
        let key = generate_key("my receipt (1).jpg");
        assert!(key.starts_with("receipts/"));
        assert!(key.ends_with("-my_receipt_1_.jpg") || key.ends_with("-my_receipt_1.jpg"));
        assert!(!key.contains(' '));
        assert!(!key.contains('('));
    }

    #[test]
    fn key_empty_hint_gets_fallback() {
        let key = generate_key("   ");
        assert!(key.ends_with("-receipt"), "got: {key}");
    }

    #[test]
    fn essential_mime_strips_parameters() {
        assert_eq!(essential_mime("image/jpeg; q=0.9"), "image/jpeg");
        assert_eq!(essential_mime("image/png"), "image/png");
    }
}
