//! Blob-storage collaborator: where receipt images live.
//!
//! The core never talks to a concrete object store. It sees only the
//! [`BlobStorage`] trait: `put` the bytes under an opaque key, mint a
//! short-lived readable URL the analysis vendor can fetch over the open
//! internet, and mint a permanent URL for long-term reference from the
//! stored receipt record. Keys are opaque strings; the core never inspects
//! storage internals.
//!
//! Two implementations ship with the crate:
//!
//! * [`InMemoryStorage`] — a HashMap behind a mutex, for tests and demos.
//! * [`LocalDirStorage`] — writes blobs under a local directory and maps
//!   keys onto a caller-supplied public base URL, for self-hosted setups
//!   where a static file server fronts the directory.
//!
//! Production deployments implement the trait over their object-store SDK.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::debug;

/// A blob-store failure. Always maps to
/// [`crate::error::ReceiptError::StorageUnavailable`] at the workflow level.
#[derive(Debug, Error)]
#[error("{detail}")]
pub struct StorageError {
    pub detail: String,
}

impl StorageError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

/// Object-storage collaborator interface.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Store `bytes` under `key`, overwriting any existing blob.
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), StorageError>;

    /// Mint a readable URL for `key` that expires after `ttl`.
    ///
    /// The URL must be fetchable by an external service over HTTPS for the
    /// duration of the TTL.
    async fn signed_read_url(&self, key: &str, ttl: Duration) -> Result<String, StorageError>;

    /// The permanent (non-expiring) URL for `key`.
    fn permanent_url(&self, key: &str) -> String;
}

// ── In-memory implementation ─────────────────────────────────────────────

/// In-memory blob store for tests and demos.
pub struct InMemoryStorage {
    base_url: String,
    blobs: Mutex<HashMap<String, (Vec<u8>, String)>>,
    /// When true, every operation fails — for exercising the
    /// storage-unavailable path in tests.
    fail: Mutex<bool>,
}

impl InMemoryStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            blobs: Mutex::new(HashMap::new()),
            fail: Mutex::new(false),
        }
    }

    /// Make all subsequent operations fail (test hook).
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.fail.lock().unwrap() = unavailable;
    }

    pub fn has_blob(&self, key: &str) -> bool {
        self.blobs.lock().unwrap().contains_key(key)
    }

    pub fn blob(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs.lock().unwrap().get(key).map(|(b, _)| b.clone())
    }

    pub fn blob_count(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }
}

#[async_trait]
impl BlobStorage for InMemoryStorage {
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), StorageError> {
        if *self.fail.lock().unwrap() {
            return Err(StorageError::new("in-memory store marked unavailable"));
        }
        self.blobs
            .lock()
            .unwrap()
            .insert(key.to_string(), (bytes.to_vec(), content_type.to_string()));
        debug!("Stored {} bytes under '{}'", bytes.len(), key);
        Ok(())
    }

    async fn signed_read_url(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        if *self.fail.lock().unwrap() {
            return Err(StorageError::new("in-memory store marked unavailable"));
        }
        if !self.blobs.lock().unwrap().contains_key(key) {
            return Err(StorageError::new(format!("no blob under key '{key}'")));
        }
        let expires = unix_now() + ttl.as_secs();
        Ok(format!("{}/{}?sig=dev&expires={}", self.base_url, key, expires))
    }

    fn permanent_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}

// ── Local-directory implementation ───────────────────────────────────────

/// Blob store backed by a local directory, fronted by a static file server.
///
/// `signed_read_url` appends an `expires` query parameter but performs no
/// cryptographic signing — a known limitation of the local backend. Use a
/// real object store when the readable URL must actually be access-limited.
pub struct LocalDirStorage {
    root: PathBuf,
    public_base_url: String,
}

impl LocalDirStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl BlobStorage for LocalDirStorage {
    async fn put(&self, key: &str, bytes: &[u8], _content_type: &str) -> Result<(), StorageError> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::new(format!("mkdir {}: {e}", parent.display())))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| StorageError::new(format!("write {}: {e}", path.display())))?;
        debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }

    async fn signed_read_url(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        let expires = unix_now() + ttl.as_secs();
        Ok(format!("{}/{}?expires={}", self.public_base_url, key, expires))
    }

    fn permanent_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_roundtrip() {
        let store = InMemoryStorage::new("https://cdn.test/");
        store.put("receipts/a.jpg", b"bytes", "image/jpeg").await.unwrap();
        assert!(store.has_blob("receipts/a.jpg"));
        assert_eq!(store.blob("receipts/a.jpg").unwrap(), b"bytes");
        assert_eq!(
            store.permanent_url("receipts/a.jpg"),
            "https://cdn.test/receipts/a.jpg"
        );
    }

    #[tokio::test]
    async fn in_memory_signed_url_has_expiry() {
        let store = InMemoryStorage::new("https://cdn.test");
        store.put("k", b"x", "image/png").await.unwrap();
        let url = store
            .signed_read_url("k", Duration::from_secs(900))
            .await
            .unwrap();
        assert!(url.starts_with("https://cdn.test/k?sig="));
        assert!(url.contains("expires="));
    }

    #[tokio::test]
    async fn in_memory_signing_unknown_key_fails() {
        let store = InMemoryStorage::new("https://cdn.test");
        let err = store
            .signed_read_url("missing", Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(err.detail.contains("missing"));
    }

    #[tokio::test]
    async fn in_memory_unavailable_hook() {
        let store = InMemoryStorage::new("https://cdn.test");
        store.set_unavailable(true);
        assert!(store.put("k", b"x", "image/png").await.is_err());
    }

    #[tokio::test]
    async fn local_dir_writes_and_maps_urls() {
        let dir = std::env::temp_dir().join(format!("r2l-storage-test-{}", std::process::id()));
        let store = LocalDirStorage::new(&dir, "https://receipts.example.com/");
        store
            .put("2024/receipt.png", b"png-bytes", "image/png")
            .await
            .unwrap();
        let on_disk = tokio::fs::read(dir.join("2024/receipt.png")).await.unwrap();
        assert_eq!(on_disk, b"png-bytes");
        assert_eq!(
            store.permanent_url("2024/receipt.png"),
            "https://receipts.example.com/2024/receipt.png"
        );
        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
