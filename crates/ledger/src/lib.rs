//! Transaction engine for the shop ledger.
//!
//! This crate turns the domain repositories into the operations a shop runs:
//! - Purchase commit: debit, decrement and unit claim as one conditional
//!   commit, retried on conflict
//! - Compensation: an idempotent refund when delivery of claimed units fails
//! - Stock merge: create-or-merge of an item with its unit pool
//!
//! The purchase flow ties them together:
//! 1. Resolve and check the purchase, then commit it
//! 2. Hand the claimed units to fulfillment
//! 3. Refund exactly once if fulfillment reports failure

pub mod compensation;
pub mod coordinator;
pub mod error;
pub mod flow;
pub mod services;
pub mod state;

pub use compensation::{CompensationManager, CompensationOutcome};
pub use coordinator::{
    Claim, DEFAULT_MAX_PURCHASE_QUANTITY, PreparedPurchase, PurchaseRequest, TransactionCoordinator,
};
pub use error::{LedgerError, Result};
pub use flow::{PurchaseFlow, PurchaseReceipt};
pub use services::{DeliveryOutcome, Fulfillment, HandoffFulfillment, InMemoryFulfillment};
pub use state::PurchaseState;
