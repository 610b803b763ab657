//! Item document and its pool of secret units.

use std::collections::BTreeMap;

use common::{ItemId, fold_name};
use serde::{Deserialize, Serialize};

use crate::{DomainError, Money, Result, StockListing, ValidatedStock};

/// Formats a unit key. Padding to the full width of a `u64` keeps
/// lexicographic order numeric for every index.
pub fn unit_key(index: u64) -> String {
    format!("u{index:020}")
}

/// One claimed secret payload.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub key: String,
    pub payload: String,
}

impl std::fmt::Debug for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unit")
            .field("key", &self.key)
            .field("payload", &"<redacted>")
            .finish()
    }
}

/// Ordered map of unit key to payload.
///
/// `next_index` only grows, so a key is never reused even after the unit
/// holding it was claimed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnitPool {
    #[serde(rename = "details", default)]
    units: BTreeMap<String, String>,
    #[serde(default)]
    next_index: u64,
}

impl UnitPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.units.keys().map(String::as_str)
    }

    pub fn payloads(&self) -> impl Iterator<Item = &str> {
        self.units.values().map(String::as_str)
    }

    /// Appends payloads under fresh keys.
    pub fn append(&mut self, payloads: impl IntoIterator<Item = String>) {
        // Pools written before the counter existed are re-keyed in their
        // current order.
        if self.next_index == 0 && !self.units.is_empty() {
            let existing = std::mem::take(&mut self.units);
            for payload in existing.into_values() {
                self.units.insert(unit_key(self.next_index), payload);
                self.next_index += 1;
            }
        }
        for payload in payloads {
            self.units.insert(unit_key(self.next_index), payload);
            self.next_index += 1;
        }
    }

    /// Removes and returns the `count` smallest keys.
    ///
    /// Returns fewer units only if the pool is smaller than `count`; callers
    /// check the size first.
    pub fn claim(&mut self, count: usize) -> Vec<Unit> {
        let rest = match self.units.keys().nth(count).cloned() {
            Some(boundary) => self.units.split_off(&boundary),
            None => BTreeMap::new(),
        };
        let claimed = std::mem::replace(&mut self.units, rest);
        claimed
            .into_iter()
            .map(|(key, payload)| Unit { key, payload })
            .collect()
    }
}

/// Stored at `categories/{category}/items/{id}`.
///
/// At rest `quantity` equals the number of units in the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    /// Folded category key.
    pub category: String,
    /// Per-unit price.
    pub price: Money,
    quantity: u32,
    #[serde(default)]
    pub display_credential: String,
    #[serde(flatten)]
    unit_pool: UnitPool,
}

impl Item {
    /// Builds a new item from its first stock addition.
    pub fn create(stock: &ValidatedStock) -> Self {
        let mut unit_pool = UnitPool::new();
        unit_pool.append(stock.units.iter().cloned());
        Self {
            id: ItemId::new(),
            name: stock.name.clone(),
            category: stock.category_key.clone(),
            price: stock.price,
            quantity: stock.quantity,
            display_credential: stock.display_credential.clone(),
            unit_pool,
        }
    }

    /// Adds stock to an existing item.
    ///
    /// Existing units are kept; new ones get fresh keys. Price and display
    /// credential take the incoming values.
    pub fn merge(&mut self, stock: &ValidatedStock) -> Result<()> {
        self.quantity = self
            .quantity
            .checked_add(stock.quantity)
            .ok_or_else(|| DomainError::validation("Item quantity overflow"))?;
        self.unit_pool.append(stock.units.iter().cloned());
        self.price = stock.price;
        self.display_credential = stock.display_credential.clone();
        Ok(())
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn unit_pool(&self) -> &UnitPool {
        &self.unit_pool
    }

    pub fn folded_name(&self) -> String {
        fold_name(&self.name)
    }

    pub fn is_sold_out(&self) -> bool {
        self.quantity == 0
    }

    /// Price of `count` units.
    pub fn cost_of(&self, count: u32) -> Result<Money> {
        self.price
            .checked_mul(count)
            .ok_or_else(|| DomainError::validation("Total cost overflow"))
    }

    /// How many of `requested` units this item can give right now.
    pub fn claimable(&self, requested: u32) -> u32 {
        self.quantity.min(requested)
    }

    /// Takes `count` units off the item.
    ///
    /// Callers clamp with `claimable` first. Checks stock before the pool;
    /// on failure nothing changes.
    pub fn claim(&mut self, count: u32) -> Result<Vec<Unit>> {
        if count == 0 || self.quantity < count {
            return Err(DomainError::OutOfStock {
                name: self.name.clone(),
            });
        }
        if self.unit_pool.len() < count as usize {
            return Err(DomainError::InsufficientUnits {
                available: self.unit_pool.len(),
                required: count,
            });
        }
        self.quantity -= count;
        Ok(self.unit_pool.claim(count as usize))
    }

    pub fn listing(&self, category_name: &str) -> StockListing {
        StockListing {
            category: category_name.to_string(),
            name: self.name.clone(),
            quantity: self.quantity,
            price: self.price,
        }
    }
}
