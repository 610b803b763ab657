//! Buyer account, purchase records and refund markers.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use common::{PurchaseId, UserId};
use serde::{Deserialize, Serialize};

use crate::{DomainError, Money, Result};

/// One completed purchase line, stored at `users/{id}/purchases/{purchase}`.
///
/// Written once in the purchase commit and never rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRecord {
    pub id: PurchaseId,
    pub item_name: String,
    pub category: String,
    pub quantity: u32,
    /// Total paid for the line.
    pub price: Money,
    pub timestamp: DateTime<Utc>,
}

impl PurchaseRecord {
    pub fn new(
        item_name: impl Into<String>,
        category: impl Into<String>,
        quantity: u32,
        price: Money,
    ) -> Self {
        Self {
            id: PurchaseId::new(),
            item_name: item_name.into(),
            category: category.into(),
            quantity,
            price,
            timestamp: Utc::now(),
        }
    }
}

/// Marks a purchase as refunded, stored at `users/{id}/refunds/{purchase}`.
///
/// Created in the same commit as the refund credit and only ever created,
/// so its presence is what makes a refund happen at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refund {
    pub purchase_id: PurchaseId,
    pub amount: Money,
    pub timestamp: DateTime<Utc>,
}

impl Refund {
    pub fn new(purchase_id: PurchaseId, amount: Money) -> Self {
        Self {
            purchase_id,
            amount,
            timestamp: Utc::now(),
        }
    }
}

/// Stored at `users/{id}`.
///
/// `balance` never goes below zero: `debit` refuses instead. The document
/// stays the same size however many purchases the buyer makes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: UserId,
    balance: Money,
}

impl Account {
    /// A fresh account with a zero balance.
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            balance: Money::zero(),
        }
    }

    pub fn balance(&self) -> Money {
        self.balance
    }

    /// Removes `amount` from the balance.
    ///
    /// Fails with `InsufficientBalance` and leaves the account untouched if
    /// the balance would go negative.
    pub fn debit(&mut self, amount: Money) -> Result<()> {
        if amount.is_negative() {
            return Err(DomainError::validation("Debit amount must not be negative"));
        }
        if self.balance < amount {
            return Err(DomainError::InsufficientBalance {
                balance: self.balance,
                required: amount,
            });
        }
        self.balance = self
            .balance
            .checked_sub(amount)
            .ok_or_else(|| DomainError::validation("Balance underflow"))?;
        Ok(())
    }

    /// Adds `amount` to the balance.
    pub fn credit(&mut self, amount: Money) -> Result<()> {
        if amount.is_negative() {
            return Err(DomainError::validation("Credit amount must not be negative"));
        }
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or_else(|| DomainError::validation("Balance overflow"))?;
        Ok(())
    }

    /// Applies a signed administrative adjustment.
    pub fn adjust(&mut self, delta: Money) -> Result<()> {
        if delta.is_zero() {
            return Err(DomainError::validation("Adjustment amount must not be zero"));
        }
        if delta.is_negative() {
            self.debit(delta.abs())
        } else {
            self.credit(delta)
        }
    }
}

/// Purchase log as shown to a buyer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseHistory {
    /// Latest first.
    pub records: Vec<PurchaseRecord>,
    pub total_spent: Money,
}

impl PurchaseHistory {
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            total_spent: Money::zero(),
        }
    }

    /// Orders `records` latest first and totals those not refunded.
    ///
    /// Refunded purchases stay in the log.
    pub fn from_records(
        mut records: Vec<PurchaseRecord>,
        refunded: &BTreeSet<PurchaseId>,
    ) -> Self {
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        let total_spent = records
            .iter()
            .filter(|r| !refunded.contains(&r.id))
            .map(|r| r.price)
            .sum();
        Self {
            records,
            total_spent,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn funded(cents: i64) -> Account {
        let mut account = Account::new(UserId::new("buyer"));
        account.credit(Money::from_cents(cents)).unwrap();
        account
    }

    #[test]
    fn test_debit_refuses_to_go_negative() {
        let mut account = funded(500);
        let err = account.debit(Money::from_cents(600)).unwrap_err();
        assert!(matches!(
            err,
            DomainError::InsufficientBalance { balance, required }
                if balance.cents() == 500 && required.cents() == 600
        ));
        assert_eq!(account.balance().cents(), 500);

        account.debit(Money::from_cents(500)).unwrap();
        assert!(account.balance().is_zero());
    }

    #[test]
    fn test_adjust_rejects_zero_and_applies_sign() {
        let mut account = funded(1000);
        assert!(matches!(
            account.adjust(Money::zero()),
            Err(DomainError::Validation(_))
        ));
        account.adjust(Money::from_cents(-300)).unwrap();
        assert_eq!(account.balance().cents(), 700);
        account.adjust(Money::from_cents(50)).unwrap();
        assert_eq!(account.balance().cents(), 750);
    }

    #[test]
    fn test_credit_overflow_is_validation_error() {
        let mut account = funded(1);
        let result = account.credit(Money::from_cents(i64::MAX));
        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert_eq!(account.balance().cents(), 1);
    }

    #[test]
    fn test_history_is_latest_first_and_skips_refunds_in_total() {
        let first = PurchaseRecord::new("Gold Pack", "steam", 1, Money::from_cents(1000));
        let mut second = PurchaseRecord::new("Silver Pack", "steam", 2, Money::from_cents(400));
        second.timestamp = first.timestamp + Duration::seconds(1);
        let refunded = BTreeSet::from([second.id]);

        let history = PurchaseHistory::from_records(vec![first, second], &refunded);

        assert_eq!(history.records[0].item_name, "Silver Pack");
        assert_eq!(history.records[1].item_name, "Gold Pack");
        assert_eq!(history.total_spent.cents(), 1000);
    }

    #[test]
    fn test_account_document_holds_no_log() {
        let json = serde_json::to_value(funded(25)).unwrap();
        assert_eq!(json, serde_json::json!({"id": "buyer", "balance": {"cents": 25}}));
    }
}
