//! Domain layer for the shop ledger.
//!
//! This crate provides:
//! - Money in integer minor units with checked arithmetic
//! - Account, Item, unit pool and category index documents
//! - Inventory and account repositories over a `DocumentStore`
//! - Bounded retry with backoff for optimistic commits
//!
//! Everything outside `repository` and `retry` is pure computation.

pub mod account;
pub mod category;
pub mod error;
pub mod item;
pub mod money;
pub mod repository;
pub mod retry;
pub mod stock;

pub use account::{Account, PurchaseHistory, PurchaseRecord, Refund};
pub use category::CategoryIndex;
pub use error::DomainError;
pub use item::{Item, Unit, UnitPool};
pub use money::Money;
pub use repository::{AccountRepository, InventoryRepository, MergeOutcome, RemovedItem, Versioned};
pub use retry::{RetryConfig, retry_on_conflict};
pub use stock::{StockAddition, StockListing, ValidatedStock};

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
