//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::{CheckoutError, DUPLICATE_NOTICE};
use domain::DomainError;
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// No usable shopper identity on the request.
    Unauthorized(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Cart or domain logic error.
    Domain(DomainError),
    /// Checkout or callback error.
    Checkout(CheckoutError),
    /// Storage error outside the checkout flow.
    Store(StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Checkout(err) => checkout_error_to_response(err),
            ApiError::Store(err) => internal(err.to_string()),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn internal(msg: String) -> (StatusCode, String) {
    tracing::error!(error = %msg, "internal server error");
    (StatusCode::INTERNAL_SERVER_ERROR, msg)
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    match &err {
        DomainError::OutOfStock { .. } | DomainError::EmptyCart => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        DomainError::ItemNotFound(_) | DomainError::CartLineNotFound(_) => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        DomainError::Store(_) => internal(err.to_string()),
    }
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, String) {
    match err {
        CheckoutError::Validation(_)
        | CheckoutError::MissingPayload
        | CheckoutError::EmptyCart
        | CheckoutError::OutOfStock { .. }
        | CheckoutError::SignatureMismatch => (StatusCode::BAD_REQUEST, err.to_string()),
        CheckoutError::PaymentDeclined { message, .. } => (StatusCode::BAD_REQUEST, message),
        CheckoutError::ItemNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        CheckoutError::DuplicateTransaction(_) => {
            (StatusCode::CONFLICT, DUPLICATE_NOTICE.to_string())
        }
        CheckoutError::Domain(e) => domain_error_to_response(e),
        CheckoutError::GatewayUnavailable(_)
        | CheckoutError::Reconciliation(_)
        | CheckoutError::Store(_) => internal(err.to_string()),
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}
