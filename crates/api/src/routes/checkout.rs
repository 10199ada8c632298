//! Payment initiation endpoints.
//!
//! Both return the signed form fields the browser posts to the gateway.
//! Nothing is persisted until a callback arrives.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use checkout::{PaymentGateway, PaymentInitiation};
use common::ItemId;
use store::Storefront;

use crate::AppState;
use crate::error::ApiError;
use crate::shopper::Shopper;

/// POST /checkout: pay for the whole cart.
#[tracing::instrument(skip(state))]
pub async fn cart<S: Storefront + Clone + 'static, G: PaymentGateway + 'static>(
    State(state): State<Arc<AppState<S, G>>>,
    Shopper(shopper): Shopper,
) -> Result<Json<PaymentInitiation>, ApiError> {
    Ok(Json(state.checkout.initiate_cart(shopper).await?))
}

/// POST /buy/:item_id: pay for a single unit, bypassing the cart.
#[tracing::instrument(skip(state))]
pub async fn buy_now<S: Storefront + Clone + 'static, G: PaymentGateway + 'static>(
    State(state): State<Arc<AppState<S, G>>>,
    Shopper(shopper): Shopper,
    Path(item_id): Path<i64>,
) -> Result<Json<PaymentInitiation>, ApiError> {
    let initiation = state.checkout.initiate_buy_now(ItemId::new(item_id)).await?;
    tracing::debug!(%shopper, transaction_uuid = %initiation.transaction_uuid, "buy-now initiated");
    Ok(Json(initiation))
}
