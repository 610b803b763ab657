//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use doc_store::StoreError;
use domain::DomainError;
use ledger::LedgerError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Domain logic error.
    Domain(DomainError),
    /// Purchase or stock merge error.
    Ledger(LedgerError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Ledger(err) => ledger_error_to_response(err),
        };

        if status.is_server_error() {
            tracing::error!(%status, error = %message, "request failed");
        }

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    let status = match &err {
        DomainError::ItemNotFound { .. } | DomainError::CategoryNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        DomainError::OutOfStock { .. }
        | DomainError::InsufficientUnits { .. }
        | DomainError::Conflict { .. }
        | DomainError::Store(StoreError::ConcurrencyConflict { .. }) => StatusCode::CONFLICT,
        DomainError::InsufficientBalance { .. } => StatusCode::PAYMENT_REQUIRED,
        DomainError::Validation(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

fn ledger_error_to_response(err: LedgerError) -> (StatusCode, String) {
    match err {
        LedgerError::Domain(domain) => domain_error_to_response(domain),
        other => {
            let status = match &other {
                LedgerError::Conflict { .. } => StatusCode::CONFLICT,
                LedgerError::DeliveryFailed(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, other.to_string())
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::Ledger(err)
    }
}

#[cfg(test)]
mod tests {
    use domain::Money;

    use super::*;

    fn status_of(err: impl Into<ApiError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_maps_business_errors_to_statuses() {
        assert_eq!(
            status_of(DomainError::ItemNotFound {
                name: "x".to_string()
            }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(DomainError::OutOfStock {
                name: "x".to_string()
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(DomainError::InsufficientBalance {
                balance: Money::zero(),
                required: Money::from_cents(1),
            }),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            status_of(DomainError::validation("bad")),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_maps_ledger_errors_to_statuses() {
        assert_eq!(
            status_of(LedgerError::Conflict {
                operation: "purchase",
                attempts: 8
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(LedgerError::DeliveryFailed("down".to_string())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(LedgerError::InvalidTransition {
                from: ledger::PurchaseState::Delivered,
                to: ledger::PurchaseState::Compensated,
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(LedgerError::Domain(DomainError::CategoryNotFound(
                "x".to_string()
            ))),
            StatusCode::NOT_FOUND
        );
    }
}
