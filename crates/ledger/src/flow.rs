//! End-to-end purchase: commit, deliver, compensate on failure.

use std::sync::Arc;

use doc_store::DocumentStore;
use domain::{Money, RetryConfig};
use serde::{Deserialize, Serialize};

use crate::compensation::{CompensationManager, CompensationOutcome};
use crate::coordinator::{Claim, PreparedPurchase, PurchaseRequest, TransactionCoordinator};
use crate::error::{LedgerError, Result};
use crate::services::{DeliveryOutcome, Fulfillment};
use crate::state::PurchaseState;

/// How a purchase ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    pub state: PurchaseState,
    pub claim: Claim,
    /// Amount credited back, if delivery failed and the refund went through.
    pub refund: Option<Money>,
    /// Why delivery failed.
    pub failure: Option<String>,
}

impl PurchaseReceipt {
    /// Returns the delivery failure as an error, if there was one.
    pub fn delivery_error(&self) -> Option<LedgerError> {
        self.failure
            .as_ref()
            .map(|reason| LedgerError::DeliveryFailed(reason.clone()))
    }
}

struct FlowInner<S: DocumentStore> {
    coordinator: Arc<TransactionCoordinator<S>>,
    compensation: CompensationManager<S>,
}

/// Drives a purchase through commit, delivery and, if needed, one refund.
///
/// Resolution and the balance and stock checks run in the caller's future,
/// so dropping it before then writes nothing. The commit and its settlement
/// run on their own task: once the commit starts, the purchase is always
/// delivered or compensated.
pub struct PurchaseFlow<S: DocumentStore> {
    inner: Arc<FlowInner<S>>,
}

impl<S: DocumentStore> Clone for PurchaseFlow<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> PurchaseFlow<S>
where
    S: DocumentStore + Clone + 'static,
{
    /// Creates a purchase flow sharing `coordinator`'s store and retry policy.
    pub fn new(coordinator: Arc<TransactionCoordinator<S>>) -> Self {
        let retry: RetryConfig = *coordinator.retry_config();
        let compensation = CompensationManager::new(coordinator.store().clone(), retry);
        Self {
            inner: Arc::new(FlowInner {
                coordinator,
                compensation,
            }),
        }
    }

    pub fn coordinator(&self) -> &TransactionCoordinator<S> {
        &self.inner.coordinator
    }

    /// Runs a purchase to a terminal state, delivering through `fulfillment`.
    ///
    /// Commit failures are returned as errors and leave no trace. After a
    /// commit the result is always a receipt; a failed delivery shows up as
    /// `Compensated` or `CompensationFailed`.
    pub async fn execute<F>(&self, request: PurchaseRequest, fulfillment: F) -> Result<PurchaseReceipt>
    where
        F: Fulfillment + 'static,
    {
        let prepared = self.inner.coordinator.prepare(&request).await?;

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.settle(prepared, &fulfillment).await })
            .await
            .map_err(|e| LedgerError::TaskFailed(e.to_string()))?
    }
}

impl<S> FlowInner<S>
where
    S: DocumentStore,
{
    async fn settle<F: Fulfillment>(
        &self,
        prepared: PreparedPurchase,
        fulfillment: &F,
    ) -> Result<PurchaseReceipt> {
        let claim = self.coordinator.commit(prepared).await?;
        let state = PurchaseState::NotStarted.advance(PurchaseState::Committed)?;

        let reason = match fulfillment.deliver(&claim).await {
            DeliveryOutcome::Confirmed => {
                tracing::info!(purchase_id = %claim.purchase_id, "Purchase delivered");
                return Ok(PurchaseReceipt {
                    state: state.advance(PurchaseState::Delivered)?,
                    claim,
                    refund: None,
                    failure: None,
                });
            }
            DeliveryOutcome::Failed(reason) => reason,
        };

        tracing::warn!(
            purchase_id = %claim.purchase_id,
            reason = %reason,
            from = %state,
            "Delivery failed, compensating"
        );

        let (next, refund) = match self.compensation.compensate(&claim).await {
            Ok(CompensationOutcome::Compensated { refunded }) => {
                (PurchaseState::Compensated, Some(refunded))
            }
            Ok(CompensationOutcome::AlreadyCompensated) => (PurchaseState::Compensated, None),
            Err(e) => {
                metrics::counter!("compensation_failures_total").increment(1);
                tracing::error!(
                    purchase_id = %claim.purchase_id,
                    user_id = %claim.user_id,
                    amount = %claim.total_cost,
                    error = %e,
                    "Compensation failed"
                );
                (PurchaseState::CompensationFailed, None)
            }
        };

        Ok(PurchaseReceipt {
            state: state.advance(next)?,
            claim,
            refund,
            failure: Some(reason),
        })
    }
}
