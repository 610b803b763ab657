//! Stock additions and public stock listings.

use common::validate_name;
use serde::{Deserialize, Serialize};

use crate::{DomainError, Money, Result};

/// A request to add units to an item, creating it on first use.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAddition {
    pub category: String,
    pub name: String,
    pub quantity: u32,
    /// One secret payload per added unit.
    pub units: Vec<String>,
    pub price: Money,
    #[serde(default)]
    pub display_credential: String,
}

// Payloads are secrets and must not end up in logs.
impl std::fmt::Debug for StockAddition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StockAddition")
            .field("category", &self.category)
            .field("name", &self.name)
            .field("quantity", &self.quantity)
            .field("units", &self.units.len())
            .field("price", &self.price)
            .field("display_credential", &self.display_credential)
            .finish()
    }
}

impl StockAddition {
    /// Checks the request and folds its names.
    ///
    /// Exactly `quantity` payloads must be supplied. Fewer or more are both
    /// rejected; nothing is silently dropped.
    pub fn validate(self) -> Result<ValidatedStock> {
        let category_key = validate_name(&self.category)?;
        let name_key = validate_name(&self.name)?;

        if self.quantity == 0 {
            return Err(DomainError::validation("Quantity must be greater than zero"));
        }

        let supplied = self.units.len();
        let expected = self.quantity as usize;
        if supplied < expected {
            return Err(DomainError::validation(format!(
                "Not enough unit payloads: {supplied} supplied, {expected} required"
            )));
        }
        if supplied > expected {
            return Err(DomainError::validation(format!(
                "Too many unit payloads: {supplied} supplied, {expected} declared"
            )));
        }

        if self.units.iter().any(|payload| payload.trim().is_empty()) {
            return Err(DomainError::validation("Unit payloads must not be empty"));
        }

        if self.price.is_negative() {
            return Err(DomainError::validation("Price must not be negative"));
        }

        Ok(ValidatedStock {
            category_key,
            category_name: self.category.trim().to_string(),
            name_key,
            name: self.name.trim().to_string(),
            quantity: self.quantity,
            units: self.units,
            price: self.price,
            display_credential: self.display_credential,
        })
    }
}

/// A stock addition that passed validation, with folded keys.
#[derive(Clone, PartialEq, Eq)]
pub struct ValidatedStock {
    pub category_key: String,
    pub category_name: String,
    pub name_key: String,
    pub name: String,
    pub quantity: u32,
    pub units: Vec<String>,
    pub price: Money,
    pub display_credential: String,
}

impl std::fmt::Debug for ValidatedStock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatedStock")
            .field("category_key", &self.category_key)
            .field("name_key", &self.name_key)
            .field("quantity", &self.quantity)
            .field("price", &self.price)
            .finish_non_exhaustive()
    }
}

/// Public view of an item. Never carries unit payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockListing {
    pub category: String,
    pub name: String,
    pub quantity: u32,
    pub price: Money,
}
