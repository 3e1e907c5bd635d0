//! Persistence collaborator: where normalized receipts end up.
//!
//! The capture workflow hands a [`crate::output::CanonicalReceipt`] by value
//! to whoever called it; persistence is a boundary, not part of the core. The
//! [`ReceiptRepository`] trait pins down the shape of that boundary — a
//! receipt plus a user identifier and a category label in, a stored record
//! with an id out — so the CLI and tests have something concrete to save
//! into without dragging a relational database into this crate.

use crate::output::CanonicalReceipt;
use async_trait::async_trait;
use std::sync::Mutex;
use thiserror::Error;

/// A persistence failure.
#[derive(Debug, Error)]
pub enum PersistError {
    /// The referenced record or owner does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
    /// The record failed validation at the storage boundary.
    #[error("Validation failed: {0}")]
    Validation(String),
    /// The underlying store errored.
    #[error("Repository error: {0}")]
    Backend(String),
}

/// A receipt as stored, with its assigned id and owner.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StoredReceipt {
    pub id: u64,
    pub user_id: String,
    pub category: String,
    pub receipt: CanonicalReceipt,
}

/// Persistence collaborator interface.
#[async_trait]
pub trait ReceiptRepository: Send + Sync {
    /// Store a receipt for `user_id` under `category`, returning the record.
    async fn save(
        &self,
        user_id: &str,
        category: &str,
        receipt: CanonicalReceipt,
    ) -> Result<StoredReceipt, PersistError>;
}

/// In-memory repository for tests and the CLI's dry-run mode.
#[derive(Default)]
pub struct InMemoryRepository {
    records: Mutex<Vec<StoredReceipt>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<StoredReceipt> {
        self.records.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ReceiptRepository for InMemoryRepository {
    async fn save(
        &self,
        user_id: &str,
        category: &str,
        receipt: CanonicalReceipt,
    ) -> Result<StoredReceipt, PersistError> {
        if user_id.is_empty() {
            return Err(PersistError::Validation("user_id must not be empty".into()));
        }
        let mut records = self.records.lock().unwrap();
        let stored = StoredReceipt {
            id: records.len() as u64 + 1,
            user_id: user_id.to_string(),
            category: category.to_string(),
            receipt,
        };
        records.push(stored.clone());
        Ok(stored)
    }
}
