//! HTTP route handlers and shared state.

pub mod accounts;
pub mod catalog;
pub mod health;
pub mod metrics;

use std::sync::Arc;

use common::UserId;
use doc_store::DocumentStore;
use ledger::{PurchaseFlow, TransactionCoordinator};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: DocumentStore> {
    pub coordinator: Arc<TransactionCoordinator<S>>,
    pub flow: PurchaseFlow<S>,
    /// Name of the store backend, reported by `/health`.
    pub backend: &'static str,
}

/// Parses a user id from a path segment.
pub(crate) fn parse_user_id(raw: &str) -> Result<UserId, ApiError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.contains('/') {
        return Err(ApiError::BadRequest(format!("Invalid user id: {raw:?}")));
    }
    Ok(UserId::new(trimmed))
}
