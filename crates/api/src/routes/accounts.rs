//! Balance, purchase history and purchase endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use doc_store::DocumentStore;
use domain::{Money, PurchaseRecord};
use ledger::{Claim, HandoffFulfillment, LedgerError, PurchaseRequest, PurchaseState};
use serde::{Deserialize, Serialize};

use super::{AppState, parse_user_id};
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct AdjustBalanceRequest {
    /// Positive to credit, negative to debit.
    pub amount_cents: i64,
}

#[derive(Deserialize)]
pub struct PurchaseBody {
    pub item_name: String,
    pub category: Option<String>,
    pub quantity: u32,
}

// -- Response types --

#[derive(Serialize)]
pub struct BalanceResponse {
    pub user_id: String,
    pub balance_cents: i64,
}

#[derive(Serialize)]
pub struct PurchaseRecordResponse {
    pub id: String,
    pub item_name: String,
    pub category: String,
    pub quantity: u32,
    pub price_cents: i64,
    pub timestamp: String,
}

impl From<PurchaseRecord> for PurchaseRecordResponse {
    fn from(record: PurchaseRecord) -> Self {
        Self {
            id: record.id.to_string(),
            item_name: record.item_name,
            category: record.category,
            quantity: record.quantity,
            price_cents: record.price.cents(),
            timestamp: record.timestamp.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub user_id: String,
    pub purchases: Vec<PurchaseRecordResponse>,
    pub total_spent_cents: i64,
}

#[derive(Serialize)]
pub struct UnitResponse {
    pub key: String,
    pub payload: String,
}

#[derive(Serialize)]
pub struct PurchaseResponse {
    pub purchase_id: String,
    pub state: PurchaseState,
    pub category: String,
    pub item_name: String,
    pub quantity: u32,
    pub total_cents: i64,
    pub units: Vec<UnitResponse>,
}

impl From<Claim> for PurchaseResponse {
    fn from(claim: Claim) -> Self {
        Self {
            purchase_id: claim.purchase_id.to_string(),
            state: PurchaseState::Delivered,
            category: claim.category,
            item_name: claim.item_name,
            quantity: claim.claimed_quantity,
            total_cents: claim.total_cost.cents(),
            units: claim
                .units
                .into_iter()
                .map(|unit| UnitResponse {
                    key: unit.key,
                    payload: unit.payload,
                })
                .collect(),
        }
    }
}

// -- Handlers --

/// GET /users/{id}/balance — current balance, zero for unknown users.
#[tracing::instrument(skip(state))]
pub async fn get_balance<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let user_id = parse_user_id(&id)?;
    let balance = state.coordinator.accounts().get_balance(&user_id).await?;
    Ok(Json(BalanceResponse {
        user_id: user_id.to_string(),
        balance_cents: balance.cents(),
    }))
}

/// POST /users/{id}/balance — administrative credit or debit.
#[tracing::instrument(skip(state, req))]
pub async fn adjust_balance<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<AdjustBalanceRequest>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let user_id = parse_user_id(&id)?;
    let balance = state
        .coordinator
        .accounts()
        .adjust_balance(&user_id, Money::from_cents(req.amount_cents))
        .await?;
    Ok(Json(BalanceResponse {
        user_id: user_id.to_string(),
        balance_cents: balance.cents(),
    }))
}

/// GET /users/{id}/purchases — purchase log, latest first.
#[tracing::instrument(skip(state))]
pub async fn purchase_history<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let user_id = parse_user_id(&id)?;
    let history = state
        .coordinator
        .accounts()
        .purchase_history(&user_id)
        .await?;
    Ok(Json(HistoryResponse {
        user_id: user_id.to_string(),
        purchases: history
            .records
            .into_iter()
            .map(PurchaseRecordResponse::from)
            .collect(),
        total_spent_cents: history.total_spent.cents(),
    }))
}

/// POST /users/{id}/purchases — buy units and deliver them in the response.
#[tracing::instrument(skip(state, req), fields(item = %req.item_name, quantity = req.quantity))]
pub async fn purchase<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<PurchaseBody>,
) -> Result<(StatusCode, Json<PurchaseResponse>), ApiError> {
    let user_id = parse_user_id(&id)?;
    let request = PurchaseRequest {
        user_id,
        category: req.category,
        item_name: req.item_name,
        quantity: req.quantity,
    };

    // Units reach the buyer only through this response. If the client goes
    // away first, the handoff fails and the purchase is refunded.
    let (fulfillment, delivered) = HandoffFulfillment::channel();
    let receipt = state.flow.execute(request, fulfillment).await?;
    metrics::counter!("purchase_outcomes_total", "state" => receipt.state.as_str()).increment(1);
    if let Some(err) = receipt.delivery_error() {
        tracing::warn!(
            purchase_id = %receipt.claim.purchase_id,
            state = %receipt.state,
            "Purchase not delivered"
        );
        return Err(err.into());
    }

    let claim = delivered
        .await
        .map_err(|_| LedgerError::DeliveryFailed("Handoff closed".to_string()))?;
    Ok((StatusCode::CREATED, Json(PurchaseResponse::from(claim))))
}
