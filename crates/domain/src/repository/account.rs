use std::collections::BTreeSet;

use common::{PurchaseId, UserId};
use doc_store::{DocumentStore, DocumentStoreExt, StorePath, Version, WriteIntent};

use crate::account::Refund;
use crate::{
    Account, DomainError, Money, PurchaseHistory, PurchaseRecord, Result, RetryConfig,
    retry_on_conflict,
};

use super::Versioned;

/// Reads and conditionally writes `users/{id}` and the documents below it.
///
/// Accounts are created lazily: an unknown user loads as a zero-balance
/// account at the path's current version, and the first write creates it.
/// Purchase records and refund markers live at their own paths, so commits
/// never rewrite a growing log.
pub struct AccountRepository<S: DocumentStore> {
    store: S,
    retry: RetryConfig,
}

impl<S: DocumentStore> AccountRepository<S> {
    pub fn new(store: S, retry: RetryConfig) -> Self {
        Self { store, retry }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Loads an account, defaulting to an empty one.
    pub async fn load(&self, user_id: &UserId) -> Result<Versioned<Account>> {
        let (account, version) = self
            .store
            .read_typed::<Account>(&StorePath::user(user_id))
            .await?;
        let account = account.unwrap_or_else(|| Account::new(user_id.clone()));
        Ok(Versioned::new(account, version))
    }

    /// Writes an account back, conditional on the version it was loaded at.
    pub async fn save(&self, account: &Versioned<Account>) -> Result<()> {
        let intent = account.put_intent(StorePath::user(&account.value.id))?;
        self.store.commit(vec![intent]).await?;
        Ok(())
    }

    /// Returns the balance, zero for users never seen before.
    pub async fn get_balance(&self, user_id: &UserId) -> Result<Money> {
        Ok(self.load(user_id).await?.value.balance())
    }

    /// One attempt at an administrative balance change.
    pub async fn try_adjust_balance(&self, user_id: &UserId, delta: Money) -> Result<Money> {
        let mut account = self.load(user_id).await?;
        account.value.adjust(delta)?;
        self.save(&account).await?;
        Ok(account.value.balance())
    }

    /// Credits (positive `delta`) or debits (negative `delta`) a balance.
    ///
    /// A debit larger than the balance fails with `InsufficientBalance` and
    /// writes nothing.
    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    pub async fn adjust_balance(&self, user_id: &UserId, delta: Money) -> Result<Money> {
        if delta.is_zero() {
            return Err(DomainError::validation("Adjustment amount must not be zero"));
        }

        let balance = retry_on_conflict(&self.retry, "adjust_balance", move |_| {
            self.try_adjust_balance(user_id, delta)
        })
        .await?;

        tracing::info!(delta = %delta, balance = %balance, "Balance adjusted");
        Ok(balance)
    }

    /// A create-only write of `record` into the buyer's purchase log.
    pub fn record_intent(&self, user_id: &UserId, record: &PurchaseRecord) -> Result<WriteIntent> {
        Ok(WriteIntent::put_typed(
            StorePath::purchase(user_id, record.id),
            Version::initial(),
            record,
        )?)
    }

    /// Appends a record to the purchase log without touching the balance.
    pub async fn append_purchase(&self, user_id: &UserId, record: PurchaseRecord) -> Result<()> {
        let intent = self.record_intent(user_id, &record)?;
        self.store.commit(vec![intent]).await?;
        Ok(())
    }

    /// Purchase records, latest first, with refunded ones left out of the
    /// total.
    pub async fn purchase_history(&self, user_id: &UserId) -> Result<PurchaseHistory> {
        let mut records = Vec::new();
        for document in self.store.list(&StorePath::purchases(user_id)).await? {
            if let Some(record) = document.decode::<PurchaseRecord>()? {
                records.push(record);
            }
        }

        let mut refunded = BTreeSet::new();
        for document in self.store.list(&StorePath::refunds(user_id)).await? {
            if let Some(refund) = document.decode::<Refund>()? {
                refunded.insert(refund.purchase_id);
            }
        }

        Ok(PurchaseHistory::from_records(records, &refunded))
    }

    /// Returns true if a refund marker exists for the purchase.
    pub async fn is_refunded(&self, user_id: &UserId, purchase_id: PurchaseId) -> Result<bool> {
        Ok(self
            .store
            .exists(&StorePath::refund(user_id, purchase_id))
            .await?)
    }

    /// One attempt at crediting back a purchase.
    ///
    /// The credit and the refund marker are written together, the marker
    /// create-only. Returns `false` if the marker already exists, in which
    /// case nothing is written.
    pub async fn try_refund(
        &self,
        user_id: &UserId,
        purchase_id: PurchaseId,
        amount: Money,
    ) -> Result<bool> {
        let marker_path = StorePath::refund(user_id, purchase_id);
        let (marker, marker_version) = self.store.read_typed::<Refund>(&marker_path).await?;
        if marker.is_some() {
            return Ok(false);
        }

        let mut account = self.load(user_id).await?;
        account.value.credit(amount)?;

        let writes = vec![
            account.put_intent(StorePath::user(user_id))?,
            WriteIntent::put_typed(
                marker_path,
                marker_version,
                &Refund::new(purchase_id, amount),
            )?,
        ];
        self.store.commit(writes).await?;
        Ok(true)
    }
}
