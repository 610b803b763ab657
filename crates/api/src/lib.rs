//! HTTP API server with observability for the shop ledger.
//!
//! Provides REST endpoints for categories, stock, balances and purchases,
//! with structured logging (tracing) and Prometheus metrics. The server does
//! no authorization of its own and is meant to sit behind a gateway that
//! does.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get};
use doc_store::DocumentStore;
use ledger::{PurchaseFlow, TransactionCoordinator};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: DocumentStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route("/categories", get(routes::catalog::list_categories::<S>))
        .route(
            "/categories/{name}",
            delete(routes::catalog::delete_category::<S>),
        )
        .route(
            "/stock",
            get(routes::catalog::list_stock::<S>).post(routes::catalog::add_stock::<S>),
        )
        .route("/items/{name}", delete(routes::catalog::remove_item::<S>))
        .route(
            "/users/{id}/balance",
            get(routes::accounts::get_balance::<S>).post(routes::accounts::adjust_balance::<S>),
        )
        .route(
            "/users/{id}/purchases",
            get(routes::accounts::purchase_history::<S>).post(routes::accounts::purchase::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over `store`.
///
/// Purchases deliver their units in the HTTP response.
pub fn create_default_state<S: DocumentStore + Clone + 'static>(
    store: S,
    backend: &'static str,
    config: &Config,
) -> Arc<AppState<S>> {
    let coordinator = Arc::new(
        TransactionCoordinator::new(store, config.retry)
            .with_max_quantity(config.max_purchase_quantity),
    );
    let flow = PurchaseFlow::new(coordinator.clone());

    Arc::new(AppState {
        coordinator,
        flow,
        backend,
    })
}
