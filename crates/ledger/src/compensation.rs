//! Refunds for purchases whose delivery failed.

use doc_store::DocumentStore;
use domain::{AccountRepository, Money, RetryConfig, retry_on_conflict};
use serde::{Deserialize, Serialize};

use crate::coordinator::Claim;
use crate::error::Result;

/// What a compensation call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompensationOutcome {
    /// The buyer was credited `refunded`.
    Compensated { refunded: Money },
    /// This purchase had already been refunded; nothing changed.
    AlreadyCompensated,
}

/// Credits the cost of a claim back to its buyer.
///
/// Claimed units and item stock are not restored: once units have been
/// handed to fulfillment they may have leaked, so they are never resold.
/// The refund marker at `users/{id}/refunds/{purchase}` is created in the
/// same commit as the credit, which makes repeated calls for the same claim
/// harmless, across restarts too.
pub struct CompensationManager<S: DocumentStore> {
    accounts: AccountRepository<S>,
    retry: RetryConfig,
}

impl<S: DocumentStore> CompensationManager<S> {
    pub fn new(store: S, retry: RetryConfig) -> Self {
        Self {
            accounts: AccountRepository::new(store, retry),
            retry,
        }
    }

    /// Refunds `claim.total_cost` unless this purchase was already refunded.
    #[tracing::instrument(skip(self, claim), fields(purchase_id = %claim.purchase_id, user_id = %claim.user_id))]
    pub async fn compensate(&self, claim: &Claim) -> Result<CompensationOutcome> {
        let accounts = &self.accounts;
        let refunded = retry_on_conflict(&self.retry, "compensate", move |_| {
            accounts.try_refund(&claim.user_id, claim.purchase_id, claim.total_cost)
        })
        .await?;

        if !refunded {
            tracing::info!("Purchase already compensated");
            return Ok(CompensationOutcome::AlreadyCompensated);
        }

        metrics::counter!("compensations_total").increment(1);
        tracing::warn!(refunded = %claim.total_cost, "Purchase compensated");
        Ok(CompensationOutcome::Compensated {
            refunded: claim.total_cost,
        })
    }
}
