//! Category, stock and item endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use doc_store::DocumentStore;
use domain::{Money, RemovedItem, StockAddition, StockListing};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct StockQuery {
    pub category: Option<String>,
}

#[derive(Deserialize)]
pub struct AddStockRequest {
    pub category: String,
    pub name: String,
    pub quantity: u32,
    pub units: Vec<String>,
    pub price_cents: i64,
    #[serde(default)]
    pub display_credential: String,
}

#[derive(Deserialize)]
pub struct RemoveItemQuery {
    pub display_credential: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct CategoriesResponse {
    pub categories: Vec<String>,
}

#[derive(Serialize)]
pub struct StockItemResponse {
    pub category: String,
    pub name: String,
    pub quantity: u32,
    pub price_cents: i64,
}

impl From<StockListing> for StockItemResponse {
    fn from(listing: StockListing) -> Self {
        Self {
            category: listing.category,
            name: listing.name,
            quantity: listing.quantity,
            price_cents: listing.price.cents(),
        }
    }
}

#[derive(Serialize)]
pub struct StockResponse {
    pub items: Vec<StockItemResponse>,
}

#[derive(Serialize)]
pub struct StockMergedResponse {
    pub item_id: String,
    pub category: String,
    pub name: String,
    pub created: bool,
    pub quantity: u32,
}

#[derive(Serialize)]
pub struct ItemsRemovedResponse {
    pub removed: Vec<RemovedItem>,
}

#[derive(Serialize)]
pub struct CategoryDeletedResponse {
    pub category: String,
    pub removed_items: usize,
}

// -- Handlers --

/// GET /categories — display names of all categories.
#[tracing::instrument(skip(state))]
pub async fn list_categories<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<CategoriesResponse>, ApiError> {
    let categories = state.coordinator.inventory().list_categories().await?;
    Ok(Json(CategoriesResponse { categories }))
}

/// DELETE /categories/{name} — remove a category and all its items.
#[tracing::instrument(skip(state))]
pub async fn delete_category<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(name): Path<String>,
) -> Result<Json<CategoryDeletedResponse>, ApiError> {
    let removed_items = state.coordinator.inventory().delete_category(&name).await?;
    Ok(Json(CategoryDeletedResponse {
        category: name,
        removed_items,
    }))
}

/// GET /stock — items with units left, optionally for one category.
#[tracing::instrument(skip(state, query))]
pub async fn list_stock<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<StockQuery>,
) -> Result<Json<StockResponse>, ApiError> {
    let items = state
        .coordinator
        .inventory()
        .list_stock(query.category.as_deref())
        .await?
        .into_iter()
        .map(StockItemResponse::from)
        .collect();
    Ok(Json(StockResponse { items }))
}

/// POST /stock — add units to an item, creating it on first use.
#[tracing::instrument(skip(state, req), fields(category = %req.category, item = %req.name))]
pub async fn add_stock<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<AddStockRequest>,
) -> Result<(StatusCode, Json<StockMergedResponse>), ApiError> {
    let addition = StockAddition {
        category: req.category,
        name: req.name,
        quantity: req.quantity,
        units: req.units,
        price: Money::from_cents(req.price_cents),
        display_credential: req.display_credential,
    };

    let outcome = state.coordinator.merge_stock(addition).await?;
    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(StockMergedResponse {
            item_id: outcome.item_id.to_string(),
            category: outcome.category,
            name: outcome.name,
            created: outcome.created,
            quantity: outcome.quantity,
        }),
    ))
}

/// DELETE /items/{name} — remove every item with this name.
#[tracing::instrument(skip(state, query))]
pub async fn remove_item<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(name): Path<String>,
    Query(query): Query<RemoveItemQuery>,
) -> Result<Json<ItemsRemovedResponse>, ApiError> {
    let removed = state
        .coordinator
        .inventory()
        .remove_item(&name, query.display_credential.as_deref())
        .await?;
    Ok(Json(ItemsRemovedResponse { removed }))
}
