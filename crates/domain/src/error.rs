//! Domain error types.

use common::{CartLineId, ItemId};
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Not enough stock to satisfy a reservation.
    #[error("{name} is out of stock")]
    OutOfStock {
        item_id: ItemId,
        name: String,
        requested: u32,
        available: u32,
    },

    /// The catalog item does not exist.
    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),

    /// The cart line does not exist or belongs to another shopper.
    #[error("Cart line not found: {0}")]
    CartLineNotFound(CartLineId),

    /// Whole-cart checkout was requested for an empty cart.
    #[error("Your cart is empty")]
    EmptyCart,

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::OutOfStock {
                item_id,
                name,
                requested,
                available,
            } => DomainError::OutOfStock {
                item_id,
                name,
                requested,
                available,
            },
            StoreError::ItemNotFound(id) => DomainError::ItemNotFound(id),
            StoreError::CartLineNotFound(id) => DomainError::CartLineNotFound(id),
            other => DomainError::Store(other),
        }
    }
}
