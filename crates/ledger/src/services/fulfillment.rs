//! Fulfillment boundary and an in-memory test double.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use common::PurchaseId;
use domain::Unit;

use crate::coordinator::Claim;

/// What fulfillment reported for a claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The buyer has the units.
    Confirmed,
    /// The units could not be handed over.
    Failed(String),
}

/// Transmits claimed units to the buyer.
///
/// Implementations report exactly one outcome per claim and never retry a
/// claim on their own; a failure is settled by compensation.
#[async_trait]
pub trait Fulfillment: Send + Sync {
    async fn deliver(&self, claim: &Claim) -> DeliveryOutcome;
}

#[derive(Debug, Default)]
struct InMemoryFulfillmentState {
    delivered: Vec<Claim>,
    failed: Vec<PurchaseId>,
    fail_on_deliver: bool,
}

/// Records every delivered claim, units included, for tests and benches.
///
/// Keeps everything it is given for as long as it lives, so it does not
/// belong in a serving process.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFulfillment {
    state: Arc<Mutex<InMemoryFulfillmentState>>,
}

impl InMemoryFulfillment {
    /// Creates a new in-memory fulfillment.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, InMemoryFulfillmentState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Configures every following delivery to fail until switched back.
    pub fn set_fail_on_deliver(&self, fail: bool) {
        self.state().fail_on_deliver = fail;
    }

    /// Returns the number of delivered claims.
    pub fn delivered_count(&self) -> usize {
        self.state().delivered.len()
    }

    /// Returns the number of failed deliveries.
    pub fn failed_count(&self) -> usize {
        self.state().failed.len()
    }

    /// Returns every unit handed over so far, in delivery order.
    pub fn delivered_units(&self) -> Vec<Unit> {
        self.state()
            .delivered
            .iter()
            .flat_map(|claim| claim.units.iter().cloned())
            .collect()
    }

    /// Returns true if the purchase was delivered.
    pub fn has_delivered(&self, purchase_id: PurchaseId) -> bool {
        self.state()
            .delivered
            .iter()
            .any(|claim| claim.purchase_id == purchase_id)
    }
}

#[async_trait]
impl Fulfillment for InMemoryFulfillment {
    async fn deliver(&self, claim: &Claim) -> DeliveryOutcome {
        let mut state = self.state();

        if state.fail_on_deliver {
            state.failed.push(claim.purchase_id);
            return DeliveryOutcome::Failed("Delivery channel unavailable".to_string());
        }

        state.delivered.push(claim.clone());
        DeliveryOutcome::Confirmed
    }
}

#[cfg(test)]
mod tests {
    use common::UserId;
    use domain::Money;

    use super::*;

    fn claim() -> Claim {
        Claim {
            purchase_id: PurchaseId::new(),
            user_id: UserId::new("1"),
            category: "steam".to_string(),
            item_name: "Gold Pack".to_string(),
            claimed_quantity: 1,
            total_cost: Money::from_cents(1000),
            units: vec![Unit {
                key: domain::item::unit_key(0),
                payload: "code".to_string(),
            }],
        }
    }

    #[tokio::test]
    async fn test_deliver_records_claim() {
        let fulfillment = InMemoryFulfillment::new();
        let claim = claim();

        assert_eq!(fulfillment.deliver(&claim).await, DeliveryOutcome::Confirmed);
        assert_eq!(fulfillment.delivered_count(), 1);
        assert!(fulfillment.has_delivered(claim.purchase_id));
        assert_eq!(fulfillment.delivered_units()[0].payload, "code");
    }

    #[tokio::test]
    async fn test_fail_on_deliver() {
        let fulfillment = InMemoryFulfillment::new();
        fulfillment.set_fail_on_deliver(true);

        let outcome = fulfillment.deliver(&claim()).await;
        assert!(matches!(outcome, DeliveryOutcome::Failed(_)));
        assert_eq!(fulfillment.delivered_count(), 0);
        assert_eq!(fulfillment.failed_count(), 1);
    }
}
