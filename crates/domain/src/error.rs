//! Domain error types.

use common::NameError;
use doc_store::StoreError;
use thiserror::Error;

use crate::Money;

/// Errors that can occur during ledger and inventory operations.
///
/// Every variant except `Store`/`Serialization` is a business outcome: it is
/// returned before anything is written.
#[derive(Debug, Error)]
pub enum DomainError {
    /// No item with this name exists where it was looked up.
    #[error("Item not found: {name}")]
    ItemNotFound { name: String },

    #[error("Category not found: {0}")]
    CategoryNotFound(String),

    /// The item has no units left to claim.
    #[error("Item '{name}' is out of stock")]
    OutOfStock { name: String },

    #[error("Insufficient balance: have {balance}, need {required}")]
    InsufficientBalance { balance: Money, required: Money },

    /// The unit pool holds fewer payloads than the quantity claims.
    #[error("Unit pool holds {available} payloads, {required} required")]
    InsufficientUnits { available: usize, required: u32 },

    /// Malformed input, rejected before touching the store.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The retry budget ran out while other writers kept winning.
    #[error("Gave up on {operation} after {attempts} conflicting attempts")]
    Conflict {
        operation: &'static str,
        attempts: u32,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// Returns true if the error is a lost optimistic-concurrency race that
    /// is worth retrying.
    pub fn is_retryable_conflict(&self) -> bool {
        matches!(self, DomainError::Store(e) if e.is_conflict())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        DomainError::Validation(message.into())
    }
}

impl From<NameError> for DomainError {
    fn from(e: NameError) -> Self {
        DomainError::Validation(e.to_string())
    }
}
