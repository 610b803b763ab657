//! Integration tests for the inventory and account repositories.
//!
//! These run against the in-memory store with artificial commit latency so
//! that concurrent writers actually interleave.

use std::sync::Arc;
use std::time::Duration;

use common::UserId;
use doc_store::InMemoryDocumentStore;
use domain::{
    AccountRepository, DomainError, InventoryRepository, Money, RetryConfig, StockAddition,
};

fn addition(units: &[&str]) -> StockAddition {
    StockAddition {
        category: "Steam".to_string(),
        name: "Gold Pack".to_string(),
        quantity: units.len() as u32,
        units: units.iter().map(|u| u.to_string()).collect(),
        price: Money::from_cents(1000),
        display_credential: String::new(),
    }
}

fn slow_store() -> InMemoryDocumentStore {
    let store = InMemoryDocumentStore::new();
    store.set_latency(Duration::from_millis(2));
    store
}

mod stock_merge {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_fresh_merges_converge_on_one_item() {
        let repo = Arc::new(InventoryRepository::new(
            slow_store(),
            RetryConfig::new().with_max_attempts(20),
        ));

        let first = {
            let repo = repo.clone();
            tokio::spawn(async move {
                repo.merge_stock(addition(&["a1", "a2", "a3", "a4", "a5"]))
                    .await
            })
        };
        let second = {
            let repo = repo.clone();
            tokio::spawn(async move { repo.merge_stock(addition(&["b1", "b2", "b3"])).await })
        };

        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();
        assert_eq!(first.item_id, second.item_id);
        assert_ne!(first.created, second.created);

        let item = repo.get_item(None, "gold pack").await.unwrap().unwrap();
        assert_eq!(item.value.quantity(), 8);

        let mut payloads: Vec<&str> = item.value.unit_pool().payloads().collect();
        payloads.sort();
        assert_eq!(
            payloads,
            vec!["a1", "a2", "a3", "a4", "a5", "b1", "b2", "b3"]
        );
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_as_conflict() {
        let store = InMemoryDocumentStore::new();
        store.inject_conflicts(100);
        let repo = InventoryRepository::new(
            store,
            RetryConfig::new()
                .with_max_attempts(3)
                .with_base_delay_ms(0)
                .with_max_delay_ms(0),
        );

        let result = repo.merge_stock(addition(&["a"])).await;
        assert!(matches!(
            result,
            Err(DomainError::Conflict {
                operation: "merge_stock",
                attempts: 3
            })
        ));
        assert!(repo.list_categories().await.unwrap().is_empty());
    }
}

mod balances {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_debits_never_overdraw() {
        let repo = Arc::new(AccountRepository::new(
            slow_store(),
            RetryConfig::new().with_max_attempts(50),
        ));
        let user = UserId::new("buyer");
        repo.adjust_balance(&user, Money::from_cents(500))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let repo = repo.clone();
            let user = user.clone();
            handles.push(tokio::spawn(async move {
                repo.adjust_balance(&user, Money::from_cents(-100)).await
            }));
        }

        let mut succeeded = 0;
        let mut refused = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(DomainError::InsufficientBalance { .. }) => refused += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(succeeded, 5);
        assert_eq!(refused, 3);
        assert!(repo.get_balance(&user).await.unwrap().is_zero());
    }
}
