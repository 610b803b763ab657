//! Category index document.

use std::collections::BTreeMap;

use common::ItemId;
use serde::{Deserialize, Serialize};

/// Stored at `categories/{folded name}`.
///
/// Maps each folded item name in the category to the id of its item
/// document. Creating an item writes this index in the same commit, so two
/// racing creates of the same name cannot both succeed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CategoryIndex {
    /// Display name as first supplied.
    pub name: String,
    #[serde(default)]
    pub items: BTreeMap<String, ItemId>,
}

impl CategoryIndex {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: BTreeMap::new(),
        }
    }

    /// Looks up an item id by folded name.
    pub fn item_id(&self, folded_name: &str) -> Option<ItemId> {
        self.items.get(folded_name).copied()
    }

    pub fn insert(&mut self, folded_name: impl Into<String>, item_id: ItemId) {
        self.items.insert(folded_name.into(), item_id);
    }

    pub fn remove(&mut self, folded_name: &str) -> Option<ItemId> {
        self.items.remove(folded_name)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
