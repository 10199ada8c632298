//! Checkout error types.

use common::ItemId;
use domain::DomainError;
use store::StoreError;
use thiserror::Error;

use crate::state::CheckoutState;

/// Errors that can occur while initiating a checkout or handling a gateway
/// callback.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// A request field is missing or malformed.
    #[error("{0}")]
    Validation(String),

    /// The success redirect carried no payment data.
    #[error("Missing payment data")]
    MissingPayload,

    /// Whole-cart checkout on an empty cart.
    #[error("Your cart is empty")]
    EmptyCart,

    /// The item cannot be bought right now.
    #[error("{name} is out of stock")]
    OutOfStock { item_id: ItemId, name: String },

    /// The catalog item does not exist.
    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),

    /// The callback signature does not match its fields.
    #[error("Payment signature verification failed")]
    SignatureMismatch,

    /// The gateway reported a status other than COMPLETE on the success path.
    #[error("Payment not completed ({status}): {message}")]
    PaymentDeclined { status: String, message: String },

    /// The transaction identifier is already in the ledger.
    #[error("Transaction {0} has already been processed")]
    DuplicateTransaction(String),

    /// The status-check endpoint could not be reached or answered badly.
    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// A verified payment could not be applied; nothing was committed.
    #[error("Payment could not be reconciled: {0}")]
    Reconciliation(String),

    /// Domain error.
    #[error("Domain error: {0}")]
    Domain(DomainError),

    /// Store error.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl CheckoutError {
    /// Terminal state a callback ends in when it fails with this error.
    pub fn state(&self) -> CheckoutState {
        match self {
            CheckoutError::PaymentDeclined { .. } => CheckoutState::Declined,
            _ => CheckoutState::Error,
        }
    }

    /// Label used for the `payment_callbacks_total` metric.
    pub fn outcome_label(&self) -> &'static str {
        match self {
            CheckoutError::SignatureMismatch => "rejected",
            CheckoutError::DuplicateTransaction(_) => "duplicate",
            CheckoutError::PaymentDeclined { .. } => "declined",
            CheckoutError::GatewayUnavailable(_) => "unavailable",
            CheckoutError::Validation(_) | CheckoutError::MissingPayload => "invalid",
            _ => "error",
        }
    }
}

impl From<DomainError> for CheckoutError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::EmptyCart => CheckoutError::EmptyCart,
            DomainError::OutOfStock { item_id, name, .. } => {
                CheckoutError::OutOfStock { item_id, name }
            }
            DomainError::ItemNotFound(id) => CheckoutError::ItemNotFound(id),
            DomainError::Store(e) => e.into(),
            other => CheckoutError::Domain(other),
        }
    }
}

impl From<StoreError> for CheckoutError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateTransaction(id) => CheckoutError::DuplicateTransaction(id),
            StoreError::SettlementRejected(reason) => CheckoutError::Reconciliation(reason),
            StoreError::ItemNotFound(id) => CheckoutError::ItemNotFound(id),
            other => CheckoutError::Store(other),
        }
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;
