//! Transaction coordinator for purchases and stock merges.

use std::time::Instant;

use common::{ItemId, PurchaseId, UserId};
use doc_store::{DocumentStore, StorePath, WriteIntent};
use domain::{
    AccountRepository, DomainError, InventoryRepository, MergeOutcome, Money, PurchaseRecord,
    RetryConfig, StockAddition, Unit, Versioned, retry_on_conflict,
};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

/// Requests above this are capped rather than rejected.
pub const DEFAULT_MAX_PURCHASE_QUANTITY: u32 = 2000;

/// A buyer's request to purchase units of an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub user_id: UserId,
    /// Searches every category when absent.
    #[serde(default)]
    pub category: Option<String>,
    pub item_name: String,
    pub quantity: u32,
}

impl PurchaseRequest {
    pub fn new(user_id: impl Into<UserId>, item_name: impl Into<String>, quantity: u32) -> Self {
        Self {
            user_id: user_id.into(),
            category: None,
            item_name: item_name.into(),
            quantity,
        }
    }

    pub fn in_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// What a successful purchase commit handed to the buyer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub purchase_id: PurchaseId,
    pub user_id: UserId,
    /// Folded category key.
    pub category: String,
    pub item_name: String,
    pub claimed_quantity: u32,
    /// Always `price * claimed_quantity` at the committed price.
    pub total_cost: Money,
    pub units: Vec<Unit>,
}

/// Item as resolved before the first commit attempt.
struct Resolved {
    category: String,
    item_id: ItemId,
    name: String,
    claim: u32,
    requested: u32,
    cost: Money,
}

/// Writes for one commit attempt and the claim they hand out.
struct StagedPurchase {
    writes: Vec<WriteIntent>,
    claim: Claim,
}

/// A purchase resolved and checked against one snapshot, not yet written.
///
/// Dropping it writes nothing.
pub struct PreparedPurchase {
    user_id: UserId,
    resolved: Resolved,
    staged: StagedPurchase,
    start: Instant,
}

impl PreparedPurchase {
    /// Units the purchase would claim if committed against its snapshot.
    pub fn claimed_quantity(&self) -> u32 {
        self.staged.claim.claimed_quantity
    }

    /// Cost at the snapshot price.
    pub fn total_cost(&self) -> Money {
        self.staged.claim.total_cost
    }
}

/// Runs purchase and stock merge commits against the document store.
///
/// Every mutation is a read, a pure computation in `domain`, and one
/// conditional commit; a lost race re-reads and tries again within the retry
/// budget.
pub struct TransactionCoordinator<S: DocumentStore> {
    store: S,
    accounts: AccountRepository<S>,
    inventory: InventoryRepository<S>,
    retry: RetryConfig,
    max_quantity: u32,
}

impl<S> TransactionCoordinator<S>
where
    S: DocumentStore + Clone,
{
    /// Creates a new coordinator over `store`.
    pub fn new(store: S, retry: RetryConfig) -> Self {
        Self {
            accounts: AccountRepository::new(store.clone(), retry),
            inventory: InventoryRepository::new(store.clone(), retry),
            store,
            retry,
            max_quantity: DEFAULT_MAX_PURCHASE_QUANTITY,
        }
    }

    /// Overrides the per-request quantity cap.
    pub fn with_max_quantity(mut self, max_quantity: u32) -> Self {
        self.max_quantity = max_quantity.max(1);
        self
    }
}

impl<S: DocumentStore> TransactionCoordinator<S> {
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn accounts(&self) -> &AccountRepository<S> {
        &self.accounts
    }

    pub fn inventory(&self) -> &InventoryRepository<S> {
        &self.inventory
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    pub fn max_quantity(&self) -> u32 {
        self.max_quantity
    }

    /// Commits a purchase: debit, stock decrement and unit claim together.
    ///
    /// Same as `prepare` followed by `commit`.
    #[tracing::instrument(
        skip(self, request),
        fields(user_id = %request.user_id, item = %request.item_name, quantity = request.quantity)
    )]
    pub async fn purchase(&self, request: PurchaseRequest) -> Result<Claim> {
        let prepared = self.prepare(&request).await?;
        self.commit(prepared).await
    }

    /// Resolves the item and checks balance and stock without writing.
    ///
    /// The request is capped at the configured maximum and clamped to the
    /// stock in the snapshot read here.
    #[tracing::instrument(
        skip(self, request),
        fields(user_id = %request.user_id, item = %request.item_name, quantity = request.quantity)
    )]
    pub async fn prepare(&self, request: &PurchaseRequest) -> Result<PreparedPurchase> {
        let start = Instant::now();

        let resolved = match self.resolve(request).await {
            Ok(resolved) => resolved,
            Err(e) => return Err(rejected(start, e)),
        };
        match self.stage_purchase(&request.user_id, &resolved).await {
            Ok(staged) => Ok(PreparedPurchase {
                user_id: request.user_id.clone(),
                resolved,
                staged,
                start,
            }),
            Err(e) => Err(rejected(start, e)),
        }
    }

    /// Writes a prepared purchase.
    ///
    /// The first attempt submits the prepared writes. After a lost race the
    /// purchase is staged again on a fresh snapshot: the claim is clamped to
    /// the stock left and charged at the price found there.
    #[tracing::instrument(skip(self, prepared), fields(user_id = %prepared.user_id))]
    pub async fn commit(&self, prepared: PreparedPurchase) -> Result<Claim> {
        let PreparedPurchase {
            user_id,
            resolved,
            staged,
            start,
        } = prepared;
        let user_id = &user_id;
        let resolved = &resolved;
        let mut staged = Some(staged);

        let result = retry_on_conflict(&self.retry, "purchase", |attempt| {
            let staged = staged.take();
            async move {
                let staged = match staged {
                    Some(staged) => staged,
                    None => match self.stage_purchase(user_id, resolved).await {
                        Ok(staged) => staged,
                        Err(e) => return Err(e),
                    },
                };
                let outcome = self
                    .store
                    .commit(staged.writes)
                    .await
                    .map(|_| staged.claim)
                    .map_err(DomainError::from);
                if matches!(&outcome, Err(e) if e.is_retryable_conflict()) {
                    metrics::counter!("purchase_commit_conflicts_total").increment(1);
                    tracing::debug!(attempt, "Purchase commit lost a race");
                }
                outcome
            }
        })
        .await;

        let claim = match result {
            Ok(claim) => claim,
            Err(e) => return Err(rejected(start, e)),
        };

        metrics::histogram!("purchase_commit_duration_seconds")
            .record(start.elapsed().as_secs_f64());
        metrics::counter!("purchase_commits_total").increment(1);
        tracing::info!(
            purchase_id = %claim.purchase_id,
            claimed = claim.claimed_quantity,
            total_cost = %claim.total_cost,
            "Purchase committed"
        );
        Ok(claim)
    }

    /// Resolves the item and computes the clamped claim size.
    async fn resolve(&self, request: &PurchaseRequest) -> domain::Result<Resolved> {
        if request.quantity == 0 {
            return Err(DomainError::validation("Quantity must be greater than zero"));
        }

        let requested = request.quantity.min(self.max_quantity);
        if requested < request.quantity {
            tracing::debug!(
                requested = request.quantity,
                capped = requested,
                "Purchase quantity capped"
            );
        }

        let item = self
            .inventory
            .get_item(request.category.as_deref(), &request.item_name)
            .await?
            .ok_or_else(|| DomainError::ItemNotFound {
                name: request.item_name.clone(),
            })?
            .value;

        if item.is_sold_out() {
            return Err(DomainError::OutOfStock { name: item.name });
        }

        let claim = item.claimable(requested);
        Ok(Resolved {
            cost: item.cost_of(claim)?,
            category: item.category,
            item_id: item.id,
            name: item.name,
            claim,
            requested,
        })
    }

    /// Reads account and item and builds the writes for one commit attempt.
    async fn stage_purchase(
        &self,
        user_id: &UserId,
        resolved: &Resolved,
    ) -> domain::Result<StagedPurchase> {
        let mut account = self.accounts.load(user_id).await?;
        let item = self
            .inventory
            .read_item(&resolved.category, resolved.item_id)
            .await?;

        // Clamp and price against this snapshot.
        let (claimed_quantity, total_cost) = match &item.value {
            Some(item) => {
                let claim = item.claimable(resolved.requested);
                (claim, item.cost_of(claim)?)
            }
            None => (resolved.claim, resolved.cost),
        };

        account.value.debit(total_cost)?;

        let Some(mut item_value) = item.value else {
            return Err(DomainError::ItemNotFound {
                name: resolved.name.clone(),
            });
        };
        let units = item_value.claim(claimed_quantity)?;

        let record = PurchaseRecord::new(
            item_value.name.clone(),
            item_value.category.clone(),
            claimed_quantity,
            total_cost,
        );
        let item_path = StorePath::item(&resolved.category, resolved.item_id);
        let writes = vec![
            account.put_intent(StorePath::user(user_id))?,
            Versioned::new(item_value, item.version).put_intent(item_path)?,
            self.accounts.record_intent(user_id, &record)?,
        ];

        Ok(StagedPurchase {
            writes,
            claim: Claim {
                purchase_id: record.id,
                user_id: user_id.clone(),
                category: resolved.category.clone(),
                item_name: resolved.name.clone(),
                claimed_quantity,
                total_cost,
                units,
            },
        })
    }

    /// Adds stock to an item, creating it on first use.
    #[tracing::instrument(skip(self, addition), fields(category = %addition.category, item = %addition.name))]
    pub async fn merge_stock(&self, addition: StockAddition) -> Result<MergeOutcome> {
        let added = addition.quantity;
        let outcome = self.inventory.merge_stock(addition).await?;

        metrics::counter!("stock_merges_total").increment(1);
        tracing::info!(
            item_id = %outcome.item_id,
            created = outcome.created,
            added,
            quantity = outcome.quantity,
            "Stock merged"
        );
        Ok(outcome)
    }
}

/// Counts and logs a purchase that wrote nothing.
fn rejected(start: Instant, e: DomainError) -> LedgerError {
    metrics::histogram!("purchase_commit_duration_seconds").record(start.elapsed().as_secs_f64());
    metrics::counter!("purchase_commit_failures_total").increment(1);
    tracing::info!(error = %e, "Purchase rejected");
    e.into()
}
