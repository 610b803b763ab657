//! Integration tests for purchase commit, compensation and stock merge.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use common::UserId;
use doc_store::InMemoryDocumentStore;
use domain::{DomainError, Money, RetryConfig, StockAddition};
use futures_util::future::join_all;
use ledger::{
    CompensationOutcome, HandoffFulfillment, InMemoryFulfillment, LedgerError, PurchaseFlow,
    PurchaseRequest, PurchaseState, TransactionCoordinator,
};

type TestFlow = PurchaseFlow<InMemoryDocumentStore>;

struct TestHarness {
    store: InMemoryDocumentStore,
    coordinator: Arc<TransactionCoordinator<InMemoryDocumentStore>>,
    fulfillment: InMemoryFulfillment,
    flow: TestFlow,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_retry(RetryConfig::new().with_base_delay_ms(0).with_max_delay_ms(0))
    }

    fn with_retry(retry: RetryConfig) -> Self {
        let store = InMemoryDocumentStore::new();
        let fulfillment = InMemoryFulfillment::new();
        let coordinator = Arc::new(TransactionCoordinator::new(store.clone(), retry));
        let flow = PurchaseFlow::new(coordinator.clone());

        Self {
            store,
            coordinator,
            fulfillment,
            flow,
        }
    }

    async fn fund(&self, user: &str, cents: i64) {
        self.coordinator
            .accounts()
            .adjust_balance(&UserId::new(user), Money::from_cents(cents))
            .await
            .unwrap();
    }

    async fn balance(&self, user: &str) -> i64 {
        self.coordinator
            .accounts()
            .get_balance(&UserId::new(user))
            .await
            .unwrap()
            .cents()
    }

    async fn stock(&self, name: &str, units: &[&str], price_cents: i64) {
        self.coordinator
            .merge_stock(stock_addition(name, units, price_cents))
            .await
            .unwrap();
    }

    async fn quantity(&self, name: &str) -> u32 {
        self.coordinator
            .inventory()
            .get_item(None, name)
            .await
            .unwrap()
            .unwrap()
            .value
            .quantity()
    }
}

fn stock_addition(name: &str, units: &[&str], price_cents: i64) -> StockAddition {
    StockAddition {
        category: "Steam".to_string(),
        name: name.to_string(),
        quantity: units.len() as u32,
        units: units.iter().map(|u| u.to_string()).collect(),
        price: Money::from_cents(price_cents),
        display_credential: String::new(),
    }
}

mod purchase_commit {
    use super::*;

    #[tokio::test]
    async fn test_gold_pack_is_clamped_to_available_stock() {
        let h = TestHarness::new();
        h.fund("buyer", 5000).await;
        h.stock("Gold Pack", &["g1", "g2", "g3"], 1000).await;

        let claim = h
            .coordinator
            .purchase(PurchaseRequest::new("buyer", "gold pack", 5))
            .await
            .unwrap();

        assert_eq!(claim.claimed_quantity, 3);
        assert_eq!(claim.total_cost.cents(), 3000);
        let payloads: Vec<&str> = claim.units.iter().map(|u| u.payload.as_str()).collect();
        assert_eq!(payloads, vec!["g1", "g2", "g3"]);

        assert_eq!(h.balance("buyer").await, 2000);
        assert_eq!(h.quantity("Gold Pack").await, 0);

        // Sold-out items stay listed as items but are hidden from stock.
        assert!(h
            .coordinator
            .inventory()
            .list_stock(None)
            .await
            .unwrap()
            .is_empty());

        let history = h
            .coordinator
            .accounts()
            .purchase_history(&UserId::new("buyer"))
            .await
            .unwrap();
        assert_eq!(history.records.len(), 1);
        assert_eq!(history.records[0].id, claim.purchase_id);
        assert_eq!(history.records[0].quantity, 3);
        assert_eq!(history.total_spent.cents(), 3000);
    }

    #[tokio::test]
    async fn test_insufficient_balance_changes_nothing() {
        let h = TestHarness::new();
        h.fund("buyer", 1500).await;
        h.stock("Gold Pack", &["g1", "g2"], 1000).await;
        let commits = h.store.commit_count();

        let err = h
            .coordinator
            .purchase(PurchaseRequest::new("buyer", "Gold Pack", 2))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LedgerError::Domain(DomainError::InsufficientBalance { balance, required })
                if balance.cents() == 1500 && required.cents() == 2000
        ));
        assert_eq!(h.store.commit_count(), commits);
        assert_eq!(h.balance("buyer").await, 1500);
        assert_eq!(h.quantity("Gold Pack").await, 2);
    }

    #[tokio::test]
    async fn test_out_of_stock_is_rejected_before_commit() {
        let h = TestHarness::new();
        h.fund("buyer", 5000).await;
        h.stock("Gold Pack", &["g1"], 1000).await;
        h.coordinator
            .purchase(PurchaseRequest::new("buyer", "Gold Pack", 1))
            .await
            .unwrap();
        let commits = h.store.commit_count();

        let err = h
            .coordinator
            .purchase(PurchaseRequest::new("buyer", "Gold Pack", 1))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LedgerError::Domain(DomainError::OutOfStock { .. })
        ));
        assert_eq!(h.store.commit_count(), commits);
        assert_eq!(h.balance("buyer").await, 4000);
    }

    #[tokio::test]
    async fn test_category_filter_is_case_insensitive() {
        let h = TestHarness::new();
        h.fund("buyer", 5000).await;
        h.stock("Gold Pack", &["g1"], 1000).await;

        let claim = h
            .coordinator
            .purchase(PurchaseRequest::new("buyer", "GOLD PACK", 1).in_category(" steam "))
            .await
            .unwrap();
        assert_eq!(claim.category, "steam");

        let err = h
            .coordinator
            .purchase(PurchaseRequest::new("buyer", "Gold Pack", 1).in_category("epic"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Domain(DomainError::ItemNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_injected_conflicts_are_retried() {
        let h = TestHarness::new();
        h.fund("buyer", 5000).await;
        h.stock("Gold Pack", &["g1", "g2"], 1000).await;
        h.store.inject_conflicts(3);

        let claim = h
            .coordinator
            .purchase(PurchaseRequest::new("buyer", "Gold Pack", 1))
            .await
            .unwrap();

        assert_eq!(claim.claimed_quantity, 1);
        assert_eq!(h.balance("buyer").await, 4000);
        assert_eq!(h.quantity("Gold Pack").await, 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_as_conflict_without_mutation() {
        let h = TestHarness::with_retry(
            RetryConfig::new()
                .with_max_attempts(4)
                .with_base_delay_ms(0)
                .with_max_delay_ms(0),
        );
        h.fund("buyer", 5000).await;
        h.stock("Gold Pack", &["g1"], 1000).await;
        h.store.inject_conflicts(100);

        let err = h
            .coordinator
            .purchase(PurchaseRequest::new("buyer", "Gold Pack", 1))
            .await
            .unwrap_err();

        assert!(err.is_conflict());
        assert!(matches!(
            err,
            LedgerError::Conflict {
                operation: "purchase",
                attempts: 4
            }
        ));
        h.store.inject_conflicts(0);
        assert_eq!(h.balance("buyer").await, 5000);
        assert_eq!(h.quantity("Gold Pack").await, 1);
    }
}

mod concurrency {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_buyers_never_share_units_or_oversell() {
        let h = TestHarness::with_retry(RetryConfig::new().with_max_attempts(200));
        h.store.set_latency(Duration::from_millis(1));

        let units: Vec<String> = (0..10).map(|i| format!("unit-{i}")).collect();
        let unit_refs: Vec<&str> = units.iter().map(String::as_str).collect();
        h.stock("Gold Pack", &unit_refs, 100).await;

        for buyer in 0..8 {
            h.fund(&format!("buyer-{buyer}"), 10_000).await;
        }

        let tasks = (0..8).map(|buyer| {
            let coordinator = h.coordinator.clone();
            tokio::spawn(async move {
                coordinator
                    .purchase(PurchaseRequest::new(format!("buyer-{buyer}"), "Gold Pack", 3))
                    .await
            })
        });

        let mut claimed = Vec::new();
        let mut total_claimed = 0;
        for result in join_all(tasks).await {
            match result.unwrap() {
                Ok(claim) => {
                    assert_eq!(
                        claim.total_cost.cents(),
                        100 * i64::from(claim.claimed_quantity)
                    );
                    total_claimed += claim.claimed_quantity;
                    claimed.extend(claim.units.into_iter().map(|u| u.key));
                }
                Err(LedgerError::Domain(DomainError::OutOfStock { .. })) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        let unique: HashSet<&String> = claimed.iter().collect();
        assert_eq!(unique.len(), claimed.len(), "a unit was claimed twice");
        assert!(total_claimed <= 10);
        assert_eq!(h.quantity("Gold Pack").await, 10 - total_claimed);

        let mut spent = 0;
        for buyer in 0..8 {
            spent += 10_000 - h.balance(&format!("buyer-{buyer}")).await;
        }
        assert_eq!(spent, 100 * i64::from(total_claimed));
    }

    #[tokio::test]
    async fn test_racing_buyers_split_the_last_units() {
        let h = TestHarness::new();
        h.stock("Gold Pack", &["g1", "g2", "g3"], 1000).await;
        h.fund("alice", 5000).await;
        h.fund("bob", 5000).await;
        h.store.set_latency(Duration::from_millis(20));

        let (alice, bob) = tokio::join!(
            h.coordinator
                .purchase(PurchaseRequest::new("alice", "Gold Pack", 2)),
            h.coordinator
                .purchase(PurchaseRequest::new("bob", "Gold Pack", 2)),
        );
        h.store.set_latency(Duration::ZERO);

        let alice = alice.unwrap();
        let bob = bob.unwrap();
        let mut claimed = vec![alice.claimed_quantity, bob.claimed_quantity];
        claimed.sort();
        assert_eq!(claimed, vec![1, 2]);
        assert_eq!(alice.total_cost.cents(), 1000 * i64::from(alice.claimed_quantity));
        assert_eq!(bob.total_cost.cents(), 1000 * i64::from(bob.claimed_quantity));

        assert_eq!(h.quantity("Gold Pack").await, 0);
        assert_eq!(h.balance("alice").await + h.balance("bob").await, 10_000 - 3000);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_merges_on_a_fresh_item_converge() {
        let h = TestHarness::with_retry(RetryConfig::new().with_max_attempts(50));
        h.store.set_latency(Duration::from_millis(2));

        let first = {
            let coordinator = h.coordinator.clone();
            tokio::spawn(async move {
                coordinator
                    .merge_stock(stock_addition("Fresh", &["a1", "a2", "a3", "a4", "a5"], 100))
                    .await
            })
        };
        let second = {
            let coordinator = h.coordinator.clone();
            tokio::spawn(async move {
                coordinator
                    .merge_stock(stock_addition("Fresh", &["b1", "b2", "b3"], 100))
                    .await
            })
        };
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        let item = h
            .coordinator
            .inventory()
            .get_item(Some("steam"), "fresh")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.value.quantity(), 8);

        let mut payloads: Vec<&str> = item.value.unit_pool().payloads().collect();
        payloads.sort();
        assert_eq!(
            payloads,
            vec!["a1", "a2", "a3", "a4", "a5", "b1", "b2", "b3"]
        );
    }
}

mod purchase_flow {
    use super::*;

    #[tokio::test]
    async fn test_delivered_purchase_keeps_the_debit() {
        let h = TestHarness::new();
        h.fund("buyer", 5000).await;
        h.stock("Gold Pack", &["g1", "g2"], 1000).await;

        let receipt = h
            .flow
            .execute(PurchaseRequest::new("buyer", "Gold Pack", 2), h.fulfillment.clone())
            .await
            .unwrap();

        assert_eq!(receipt.state, PurchaseState::Delivered);
        assert!(receipt.refund.is_none());
        assert!(receipt.delivery_error().is_none());
        assert!(h.fulfillment.has_delivered(receipt.claim.purchase_id));
        assert_eq!(h.balance("buyer").await, 3000);
    }

    #[tokio::test]
    async fn test_delivery_failure_refunds_once_and_keeps_units_consumed() {
        let h = TestHarness::new();
        h.fund("buyer", 5000).await;
        h.stock("Gold Pack", &["g1", "g2", "g3"], 1000).await;
        h.fulfillment.set_fail_on_deliver(true);

        let receipt = h
            .flow
            .execute(PurchaseRequest::new("buyer", "Gold Pack", 3), h.fulfillment.clone())
            .await
            .unwrap();

        assert_eq!(receipt.state, PurchaseState::Compensated);
        assert_eq!(receipt.refund, Some(Money::from_cents(3000)));
        assert!(matches!(
            receipt.delivery_error(),
            Some(LedgerError::DeliveryFailed(_))
        ));
        assert_eq!(h.balance("buyer").await, 5000);
        // Claimed units are not restocked.
        assert_eq!(h.quantity("Gold Pack").await, 0);
        assert_eq!(h.fulfillment.failed_count(), 1);

        // Replaying the compensation for the same claim is a no-op.
        let manager = ledger::CompensationManager::new(h.store.clone(), RetryConfig::new());
        let again = manager.compensate(&receipt.claim).await.unwrap();
        assert_eq!(again, CompensationOutcome::AlreadyCompensated);
        assert_eq!(h.balance("buyer").await, 5000);

        let history = h
            .coordinator
            .accounts()
            .purchase_history(&UserId::new("buyer"))
            .await
            .unwrap();
        assert_eq!(history.records.len(), 1);
        assert!(history.total_spent.is_zero());
    }

    #[tokio::test]
    async fn test_commit_failure_never_reaches_fulfillment() {
        let h = TestHarness::new();
        h.stock("Gold Pack", &["g1"], 1000).await;

        let err = h
            .flow
            .execute(PurchaseRequest::new("broke", "Gold Pack", 1), h.fulfillment.clone())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LedgerError::Domain(DomainError::InsufficientBalance { .. })
        ));
        assert_eq!(h.fulfillment.delivered_count(), 0);
        assert_eq!(h.fulfillment.failed_count(), 0);
    }

    #[tokio::test]
    async fn test_abandoned_request_writes_nothing() {
        let h = TestHarness::new();
        h.fund("buyer", 10_000).await;
        h.stock("Gold Pack", &["g1", "g2"], 1000).await;
        let commits = h.store.commit_count();
        h.store.set_latency(Duration::from_millis(50));

        let abandoned = tokio::time::timeout(
            Duration::from_millis(1),
            h.flow.execute(
                PurchaseRequest::new("buyer", "Gold Pack", 1),
                h.fulfillment.clone(),
            ),
        )
        .await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(300)).await;
        h.store.set_latency(Duration::ZERO);

        assert_eq!(h.store.commit_count(), commits);
        assert_eq!(h.balance("buyer").await, 10_000);
        assert_eq!(h.quantity("Gold Pack").await, 2);
        assert_eq!(h.fulfillment.delivered_count(), 0);
        assert_eq!(h.fulfillment.failed_count(), 0);
    }

    #[tokio::test]
    async fn test_handoff_delivers_to_waiting_requester() {
        let h = TestHarness::new();
        h.fund("buyer", 5000).await;
        h.stock("Gold Pack", &["g1", "g2"], 1000).await;

        let (fulfillment, receiver) = HandoffFulfillment::channel();
        let receipt = h
            .flow
            .execute(PurchaseRequest::new("buyer", "Gold Pack", 1), fulfillment)
            .await
            .unwrap();

        assert_eq!(receipt.state, PurchaseState::Delivered);
        let handed = receiver.await.unwrap();
        assert_eq!(handed, receipt.claim);
        assert_eq!(handed.units[0].payload, "g1");
        assert_eq!(h.balance("buyer").await, 4000);
    }

    #[tokio::test]
    async fn test_gone_requester_is_compensated() {
        let h = TestHarness::new();
        h.fund("buyer", 5000).await;
        h.stock("Gold Pack", &["g1", "g2"], 1000).await;

        let (fulfillment, receiver) = HandoffFulfillment::channel();
        drop(receiver);
        let receipt = h
            .flow
            .execute(PurchaseRequest::new("buyer", "Gold Pack", 2), fulfillment)
            .await
            .unwrap();

        assert_eq!(receipt.state, PurchaseState::Compensated);
        assert_eq!(receipt.refund, Some(Money::from_cents(2000)));
        assert_eq!(h.balance("buyer").await, 5000);
        assert_eq!(h.quantity("Gold Pack").await, 0);
        assert!(
            h.coordinator
                .accounts()
                .is_refunded(&UserId::new("buyer"), receipt.claim.purchase_id)
                .await
                .unwrap()
        );
    }
}
