//! Purchase flow state machine.

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

/// The state of a purchase in its lifecycle.
///
/// State transitions:
/// ```text
/// NotStarted ──► Committed ──┬──► Delivered
///                            ├──► Compensated
///                            └──► CompensationFailed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PurchaseState {
    /// Nothing has been written yet.
    #[default]
    NotStarted,

    /// Balance, stock and units were committed; delivery is pending.
    Committed,

    /// Fulfillment confirmed delivery (terminal state).
    Delivered,

    /// Delivery failed and the buyer was refunded (terminal state).
    Compensated,

    /// Delivery failed and the refund could not be written (terminal state).
    CompensationFailed,
}

impl PurchaseState {
    /// Returns true if the purchase can be committed.
    pub fn can_commit(&self) -> bool {
        matches!(self, PurchaseState::NotStarted)
    }

    /// Returns true if the purchase can be delivered or compensated.
    pub fn can_settle(&self) -> bool {
        matches!(self, PurchaseState::Committed)
    }

    /// Returns true if the flow may move from this state to `next`.
    ///
    /// Terminal states never move again.
    pub fn can_transition_to(&self, next: PurchaseState) -> bool {
        match next {
            PurchaseState::NotStarted => false,
            PurchaseState::Committed => self.can_commit(),
            PurchaseState::Delivered
            | PurchaseState::Compensated
            | PurchaseState::CompensationFailed => self.can_settle(),
        }
    }

    /// Moves to `next`, or fails with `InvalidTransition`.
    pub fn advance(self, next: PurchaseState) -> Result<PurchaseState> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(LedgerError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseState::NotStarted => "NotStarted",
            PurchaseState::Committed => "Committed",
            PurchaseState::Delivered => "Delivered",
            PurchaseState::Compensated => "Compensated",
            PurchaseState::CompensationFailed => "CompensationFailed",
        }
    }
}

impl std::fmt::Display for PurchaseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
