//! HTTP API for the storefront checkout.
//!
//! Exposes cart management, payment initiation, the gateway's success and
//! failure callbacks and a read-only view of the payment ledger, with
//! structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod shopper;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use checkout::{CheckoutOrchestrator, GatewaySettings, PaymentGateway, SignatureVerifier};
use domain::CartService;
use metrics_exporter_prometheus::PrometheusHandle;
use store::Storefront;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<S, G> {
    pub cart: CartService<S>,
    pub checkout: CheckoutOrchestrator<S, G>,
    pub store: S,
}

impl<S, G> AppState<S, G>
where
    S: Storefront + Clone,
    G: PaymentGateway,
{
    pub fn new(
        store: S,
        gateway: G,
        verifier: SignatureVerifier,
        settings: GatewaySettings,
    ) -> Self {
        Self {
            cart: CartService::new(store.clone()),
            checkout: CheckoutOrchestrator::new(store.clone(), gateway, verifier, settings),
            store,
        }
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, G>(state: Arc<AppState<S, G>>, metrics_handle: PrometheusHandle) -> Router
where
    S: Storefront + Clone + 'static,
    G: PaymentGateway + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/cart", get(routes::cart::view::<S, G>))
        .route("/cart/items/{item_id}", post(routes::cart::add::<S, G>))
        .route(
            "/cart/lines/{line_id}/increase",
            post(routes::cart::increase::<S, G>),
        )
        .route(
            "/cart/lines/{line_id}/decrease",
            post(routes::cart::decrease::<S, G>),
        )
        .route("/cart/lines/{line_id}", delete(routes::cart::remove::<S, G>))
        .route("/checkout", post(routes::checkout::cart::<S, G>))
        .route("/buy/{item_id}", post(routes::checkout::buy_now::<S, G>))
        .route("/payment/success", get(routes::payment::success::<S, G>))
        .route("/payment/failure", get(routes::payment::failure::<S, G>))
        .route("/transactions", get(routes::audit::list::<S, G>))
        .route("/transactions/summary", get(routes::audit::summary::<S, G>))
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
