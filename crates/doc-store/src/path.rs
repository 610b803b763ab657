//! Typed document paths.
//!
//! Layout:
//! ```text
//! users/{user_id}                          account document
//! users/{user_id}/purchases/{purchase_id}  purchase record, written once
//! users/{user_id}/refunds/{purchase_id}    refund marker, written once
//! categories/{category}                    category index
//! categories/{category}/items/{item_id}    item document with its unit pool
//! ```
//! Category segments are always folded names.

use common::{ItemId, PurchaseId, UserId};
use serde::{Deserialize, Serialize};

use crate::{Result, StoreError};

const USERS: &str = "users";
const CATEGORIES: &str = "categories";
const ITEMS: &str = "items";
const PURCHASES: &str = "purchases";
const REFUNDS: &str = "refunds";

/// A slash-separated path to a document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorePath(String);

impl StorePath {
    /// Parses a raw path, rejecting empty segments.
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.is_empty() || raw.split('/').any(str::is_empty) {
            return Err(StoreError::InvalidPath(raw));
        }
        Ok(Self(raw))
    }

    /// `users/{id}`
    pub fn user(user_id: &UserId) -> Self {
        Self(format!("{USERS}/{}", user_id.as_str()))
    }

    /// `users/{id}/purchases`
    pub fn purchases(user_id: &UserId) -> Self {
        Self(format!("{USERS}/{}/{PURCHASES}", user_id.as_str()))
    }

    /// `users/{id}/purchases/{purchase_id}`
    pub fn purchase(user_id: &UserId, purchase_id: PurchaseId) -> Self {
        Self(format!("{USERS}/{}/{PURCHASES}/{purchase_id}", user_id.as_str()))
    }

    /// `users/{id}/refunds`
    pub fn refunds(user_id: &UserId) -> Self {
        Self(format!("{USERS}/{}/{REFUNDS}", user_id.as_str()))
    }

    /// `users/{id}/refunds/{purchase_id}`
    pub fn refund(user_id: &UserId, purchase_id: PurchaseId) -> Self {
        Self(format!("{USERS}/{}/{REFUNDS}/{purchase_id}", user_id.as_str()))
    }

    /// `categories`
    pub fn categories() -> Self {
        Self(CATEGORIES.to_string())
    }

    /// `categories/{category}`
    pub fn category(folded_category: &str) -> Self {
        Self(format!("{CATEGORIES}/{folded_category}"))
    }

    /// `categories/{category}/items/{item_id}`
    pub fn item(folded_category: &str, item_id: ItemId) -> Self {
        Self(format!("{CATEGORIES}/{folded_category}/{ITEMS}/{item_id}"))
    }

    /// Returns the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterates over the path segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Returns true if `self` lies strictly below `prefix`.
    pub fn is_under(&self, prefix: &StorePath) -> bool {
        self.0.len() > prefix.0.len()
            && self.0.starts_with(prefix.as_str())
            && self.0.as_bytes()[prefix.0.len()] == b'/'
    }

    /// Returns the category key if this is a category index path.
    pub fn as_category(&self) -> Option<&str> {
        let mut segments = self.segments();
        match (segments.next(), segments.next(), segments.next()) {
            (Some(CATEGORIES), Some(category), None) => Some(category),
            _ => None,
        }
    }
}

impl std::fmt::Display for StorePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
