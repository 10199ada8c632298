//! Gateway redirect callbacks.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use checkout::{CheckoutOutcome, FailureParams, PaymentGateway};
use serde::Deserialize;
use store::Storefront;

use crate::AppState;
use crate::error::ApiError;
use crate::shopper::Shopper;

#[derive(Debug, Deserialize)]
pub struct SuccessParams {
    /// Base64 JSON payload signed by the gateway.
    pub data: Option<String>,
}

/// GET /payment/success?data=
#[tracing::instrument(skip(state, params))]
pub async fn success<S: Storefront + Clone + 'static, G: PaymentGateway + 'static>(
    State(state): State<Arc<AppState<S, G>>>,
    Shopper(shopper): Shopper,
    Query(params): Query<SuccessParams>,
) -> Result<Json<CheckoutOutcome>, ApiError> {
    let outcome = state
        .checkout
        .handle_success(shopper, params.data.as_deref())
        .await?;
    Ok(Json(outcome))
}

/// GET /payment/failure?transaction_uuid=&total_amount=&product_code=
///
/// Needs no shopper identity: nothing here touches a cart.
#[tracing::instrument(skip(state))]
pub async fn failure<S: Storefront + Clone + 'static, G: PaymentGateway + 'static>(
    State(state): State<Arc<AppState<S, G>>>,
    Query(params): Query<FailureParams>,
) -> Result<Json<CheckoutOutcome>, ApiError> {
    Ok(Json(state.checkout.handle_failure(params).await?))
}
