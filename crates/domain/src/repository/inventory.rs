use common::{ItemId, validate_name};
use doc_store::{DocumentStore, DocumentStoreExt, StorePath, Version, WriteIntent};
use serde::{Deserialize, Serialize};

use crate::{
    CategoryIndex, DomainError, Item, Result, RetryConfig, StockAddition, StockListing,
    ValidatedStock, retry_on_conflict,
};

use super::Versioned;

/// Result of a stock merge commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOutcome {
    pub item_id: ItemId,
    pub category: String,
    pub name: String,
    /// True if this merge created the item.
    pub created: bool,
    /// Quantity after the merge.
    pub quantity: u32,
}

/// An item deleted by `remove_item`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedItem {
    pub item_id: ItemId,
    pub category: String,
    pub name: String,
    /// Units that were still unsold.
    pub quantity: u32,
}

/// Reads and conditionally writes category indexes and item documents.
pub struct InventoryRepository<S: DocumentStore> {
    store: S,
    retry: RetryConfig,
}

impl<S: DocumentStore> InventoryRepository<S> {
    pub fn new(store: S, retry: RetryConfig) -> Self {
        Self { store, retry }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn read_category(
        &self,
        category_key: &str,
    ) -> Result<Versioned<Option<CategoryIndex>>> {
        let (index, version) = self
            .store
            .read_typed::<CategoryIndex>(&StorePath::category(category_key))
            .await?;
        Ok(Versioned::new(index, version))
    }

    pub async fn read_item(
        &self,
        category_key: &str,
        item_id: ItemId,
    ) -> Result<Versioned<Option<Item>>> {
        let (item, version) = self
            .store
            .read_typed::<Item>(&StorePath::item(category_key, item_id))
            .await?;
        Ok(Versioned::new(item, version))
    }

    /// All live category indexes, ordered by key.
    async fn category_indexes(&self) -> Result<Vec<(String, Versioned<CategoryIndex>)>> {
        let documents = self.store.list(&StorePath::categories()).await?;
        let mut indexes = Vec::new();
        for document in documents {
            let Some(key) = document.path.as_category().map(str::to_string) else {
                continue;
            };
            if let Some(index) = document.decode::<CategoryIndex>()? {
                indexes.push((key, Versioned::new(index, document.version)));
            }
        }
        Ok(indexes)
    }

    async fn existing_item(
        &self,
        category_key: &str,
        item_id: ItemId,
    ) -> Result<Option<Versioned<Item>>> {
        let item = self.read_item(category_key, item_id).await?;
        Ok(item.value.map(|value| Versioned::new(value, item.version)))
    }

    /// Finds an item by name, case-insensitively.
    ///
    /// Without a category every category is searched in key order and the
    /// first match wins.
    pub async fn get_item(
        &self,
        category: Option<&str>,
        name: &str,
    ) -> Result<Option<Versioned<Item>>> {
        let name_key = validate_name(name)?;

        if let Some(category) = category {
            let category_key = validate_name(category)?;
            let index = self.read_category(&category_key).await?;
            return match index.value.and_then(|index| index.item_id(&name_key)) {
                Some(item_id) => self.existing_item(&category_key, item_id).await,
                None => Ok(None),
            };
        }

        for (category_key, index) in self.category_indexes().await? {
            if let Some(item_id) = index.value.item_id(&name_key) {
                if let Some(item) = self.existing_item(&category_key, item_id).await? {
                    return Ok(Some(item));
                }
            }
        }
        Ok(None)
    }

    /// Display names of all categories, ordered by key.
    pub async fn list_categories(&self) -> Result<Vec<String>> {
        Ok(self
            .category_indexes()
            .await?
            .into_iter()
            .map(|(_, index)| index.value.name)
            .collect())
    }

    /// Items that still have stock, ordered by category then name.
    pub async fn list_stock(&self, category: Option<&str>) -> Result<Vec<StockListing>> {
        let indexes = match category {
            Some(category) => {
                let key = validate_name(category)?;
                let index = self.read_category(&key).await?;
                match index.value {
                    Some(value) => vec![(key, Versioned::new(value, index.version))],
                    None => return Err(DomainError::CategoryNotFound(category.to_string())),
                }
            }
            None => self.category_indexes().await?,
        };

        let mut listings = Vec::new();
        for (key, index) in indexes {
            let mut items: Vec<Item> = Vec::new();
            for document in self.store.list(&StorePath::category(&key)).await? {
                if let Some(item) = document.decode::<Item>()? {
                    if !item.is_sold_out() {
                        items.push(item);
                    }
                }
            }
            items.sort_by_key(|item| item.folded_name());
            listings.extend(items.iter().map(|item| item.listing(&index.value.name)));
        }
        Ok(listings)
    }

    /// One attempt at merging stock into an item, creating it if needed.
    ///
    /// A create writes the category index and the item in one commit, so a
    /// concurrent create of the same name makes one of them conflict; on
    /// retry the loser finds the winner's item and merges into it.
    pub async fn try_merge_stock(&self, stock: &ValidatedStock) -> Result<MergeOutcome> {
        let index = self.read_category(&stock.category_key).await?;
        let existing_id = index
            .value
            .as_ref()
            .and_then(|index| index.item_id(&stock.name_key));

        if let Some(item_id) = existing_id {
            let item = self.read_item(&stock.category_key, item_id).await?;
            if let Some(mut value) = item.value {
                value.merge(stock)?;
                let merged = Versioned::new(value, item.version);
                let path = StorePath::item(&stock.category_key, item_id);
                self.store.commit(vec![merged.put_intent(path)?]).await?;
                return Ok(MergeOutcome {
                    item_id,
                    category: merged.value.category.clone(),
                    name: merged.value.name.clone(),
                    created: false,
                    quantity: merged.value.quantity(),
                });
            }
        }

        let item = Item::create(stock);
        let mut category_index = index
            .value
            .unwrap_or_else(|| CategoryIndex::new(stock.category_name.clone()));
        category_index.insert(stock.name_key.clone(), item.id);

        let writes = vec![
            WriteIntent::put_typed(
                StorePath::category(&stock.category_key),
                index.version,
                &category_index,
            )?,
            WriteIntent::put_typed(
                StorePath::item(&stock.category_key, item.id),
                Version::initial(),
                &item,
            )?,
        ];
        self.store.commit(writes).await?;

        Ok(MergeOutcome {
            item_id: item.id,
            category: item.category.clone(),
            name: item.name.clone(),
            created: true,
            quantity: item.quantity(),
        })
    }

    /// Validates a stock addition and merges it, retrying lost races.
    pub async fn merge_stock(&self, addition: StockAddition) -> Result<MergeOutcome> {
        let stock = addition.validate()?;
        let stock = &stock;
        retry_on_conflict(&self.retry, "merge_stock", move |_| self.try_merge_stock(stock)).await
    }

    /// One attempt at removing every item named `name_key`.
    pub async fn try_remove_item(
        &self,
        name_key: &str,
        display_credential: Option<&str>,
    ) -> Result<Vec<RemovedItem>> {
        let mut writes = Vec::new();
        let mut removed = Vec::new();

        for (category_key, mut index) in self.category_indexes().await? {
            let Some(item_id) = index.value.item_id(name_key) else {
                continue;
            };
            let Some(item) = self.existing_item(&category_key, item_id).await? else {
                continue;
            };
            if let Some(credential) = display_credential {
                if item.value.display_credential != credential {
                    continue;
                }
            }

            writes.push(item.delete_intent(StorePath::item(&category_key, item_id)));
            removed.push(RemovedItem {
                item_id,
                category: category_key.clone(),
                name: item.value.name.clone(),
                quantity: item.value.quantity(),
            });

            index.value.remove(name_key);
            let index_path = StorePath::category(&category_key);
            if index.value.is_empty() {
                writes.push(index.delete_intent(index_path));
            } else {
                writes.push(index.put_intent(index_path)?);
            }
        }

        if removed.is_empty() {
            return Err(DomainError::ItemNotFound {
                name: name_key.to_string(),
            });
        }

        self.store.commit(writes).await?;
        Ok(removed)
    }

    /// Removes every item with this name from every category.
    ///
    /// With a display credential, only items carrying exactly that
    /// credential are removed. A category left empty is removed too.
    #[tracing::instrument(skip(self, display_credential))]
    pub async fn remove_item(
        &self,
        name: &str,
        display_credential: Option<&str>,
    ) -> Result<Vec<RemovedItem>> {
        let name_key = validate_name(name)?;
        let name_key = name_key.as_str();
        let removed = retry_on_conflict(&self.retry, "remove_item", move |_| {
            self.try_remove_item(name_key, display_credential)
        })
        .await?;

        tracing::info!(count = removed.len(), "Items removed");
        Ok(removed)
    }

    /// One attempt at deleting a category and every item in it.
    pub async fn try_delete_category(&self, category_key: &str) -> Result<usize> {
        let index = self.read_category(category_key).await?;
        if index.value.is_none() {
            return Err(DomainError::CategoryNotFound(category_key.to_string()));
        }

        let items = self.store.list(&StorePath::category(category_key)).await?;
        let mut writes: Vec<WriteIntent> = items
            .iter()
            .map(|document| WriteIntent::delete(document.path.clone(), document.version))
            .collect();
        let removed = writes.len();
        writes.push(WriteIntent::delete(
            StorePath::category(category_key),
            index.version,
        ));

        self.store.commit(writes).await?;
        Ok(removed)
    }

    /// Deletes a category with all its items. Returns how many items went.
    #[tracing::instrument(skip(self))]
    pub async fn delete_category(&self, name: &str) -> Result<usize> {
        let key = validate_name(name)?;
        let key = key.as_str();
        let removed = retry_on_conflict(&self.retry, "delete_category", move |_| {
            self.try_delete_category(key)
        })
        .await?;

        tracing::info!(removed, "Category deleted");
        Ok(removed)
    }
}
