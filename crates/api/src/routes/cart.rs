//! Cart endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use checkout::PaymentGateway;
use common::{CartLineId, ItemId};
use domain::CartView;
use store::{CartLine, Storefront};

use crate::AppState;
use crate::error::ApiError;
use crate::shopper::Shopper;

/// GET /cart: the shopper's lines and subtotal.
#[tracing::instrument(skip(state))]
pub async fn view<S: Storefront + Clone + 'static, G: PaymentGateway + 'static>(
    State(state): State<Arc<AppState<S, G>>>,
    Shopper(shopper): Shopper,
) -> Result<Json<CartView>, ApiError> {
    Ok(Json(state.cart.view(shopper).await?))
}

/// POST /cart/items/:item_id: reserve one unit and add it to the cart.
#[tracing::instrument(skip(state))]
pub async fn add<S: Storefront + Clone + 'static, G: PaymentGateway + 'static>(
    State(state): State<Arc<AppState<S, G>>>,
    Shopper(shopper): Shopper,
    Path(item_id): Path<i64>,
) -> Result<(StatusCode, Json<CartLine>), ApiError> {
    let line = state.cart.add(shopper, ItemId::new(item_id)).await?;
    Ok((StatusCode::CREATED, Json(line)))
}

/// POST /cart/lines/:line_id/increase
#[tracing::instrument(skip(state))]
pub async fn increase<S: Storefront + Clone + 'static, G: PaymentGateway + 'static>(
    State(state): State<Arc<AppState<S, G>>>,
    Shopper(shopper): Shopper,
    Path(line_id): Path<i64>,
) -> Result<Json<CartLine>, ApiError> {
    let line = state
        .cart
        .increase(shopper, CartLineId::new(line_id))
        .await?;
    Ok(Json(line))
}

/// POST /cart/lines/:line_id/decrease: never goes below one unit.
#[tracing::instrument(skip(state))]
pub async fn decrease<S: Storefront + Clone + 'static, G: PaymentGateway + 'static>(
    State(state): State<Arc<AppState<S, G>>>,
    Shopper(shopper): Shopper,
    Path(line_id): Path<i64>,
) -> Result<Json<CartLine>, ApiError> {
    let line = state
        .cart
        .decrease(shopper, CartLineId::new(line_id))
        .await?;
    Ok(Json(line))
}

/// DELETE /cart/lines/:line_id: remove the line and release its units.
#[tracing::instrument(skip(state))]
pub async fn remove<S: Storefront + Clone + 'static, G: PaymentGateway + 'static>(
    State(state): State<Arc<AppState<S, G>>>,
    Shopper(shopper): Shopper,
    Path(line_id): Path<i64>,
) -> Result<Json<CartLine>, ApiError> {
    let line = state.cart.remove(shopper, CartLineId::new(line_id)).await?;
    Ok(Json(line))
}
