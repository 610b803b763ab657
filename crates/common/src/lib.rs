//! Shared identifiers and name rules used across the shop ledger crates.

pub mod names;
pub mod types;

pub use names::{NameError, fold_name, validate_name};
pub use types::{ItemId, PurchaseId, UserId};
