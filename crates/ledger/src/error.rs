//! Ledger error types.

use domain::DomainError;
use thiserror::Error;

use crate::state::PurchaseState;

/// Errors that can occur while running purchases and stock merges.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A business rule or storage failure from the domain layer.
    #[error(transparent)]
    Domain(DomainError),

    /// Every commit attempt lost its optimistic race.
    #[error("{operation} gave up after {attempts} conflicting attempts")]
    Conflict {
        operation: &'static str,
        attempts: u32,
    },

    /// Fulfillment could not deliver the claimed units.
    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),

    /// The purchase flow tried to skip or repeat a step.
    #[error("Invalid purchase transition from {from} to {to}")]
    InvalidTransition {
        from: PurchaseState,
        to: PurchaseState,
    },

    /// The spawned commit task did not run to completion.
    #[error("Purchase task failed: {0}")]
    TaskFailed(String),
}

impl LedgerError {
    /// Returns true if the operation failed only because of contention.
    pub fn is_conflict(&self) -> bool {
        matches!(self, LedgerError::Conflict { .. })
    }
}

impl From<DomainError> for LedgerError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::Conflict {
                operation,
                attempts,
            } => LedgerError::Conflict {
                operation,
                attempts,
            },
            other => LedgerError::Domain(other),
        }
    }
}

impl From<doc_store::StoreError> for LedgerError {
    fn from(e: doc_store::StoreError) -> Self {
        LedgerError::Domain(DomainError::Store(e))
    }
}

/// Convenience type alias for ledger results.
pub type Result<T> = std::result::Result<T, LedgerError>;
