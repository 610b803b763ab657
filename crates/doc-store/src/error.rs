use thiserror::Error;

use crate::Version;

/// Errors that can occur when interacting with the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A conditional write found a different version than expected.
    /// Nothing in the commit was applied.
    #[error("Concurrency conflict on {path}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        path: String,
        expected: Version,
        actual: Version,
    },

    /// A path string could not be parsed.
    #[error("Invalid store path: {0}")]
    InvalidPath(String),

    /// A commit batch was rejected before touching the store.
    #[error("Invalid commit: {0}")]
    InvalidCommit(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true if this error is a lost optimistic-concurrency race.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::ConcurrencyConflict { .. })
    }
}

/// Result type for document store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
