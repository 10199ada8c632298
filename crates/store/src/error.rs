use thiserror::Error;

use crate::{CartLineId, ItemId};

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A ledger row with this transaction identifier already exists.
    #[error("Transaction {0} has already been recorded")]
    DuplicateTransaction(String),

    /// Not enough stock to satisfy a reservation.
    #[error("{name} is out of stock: requested {requested}, available {available}")]
    OutOfStock {
        item_id: ItemId,
        name: String,
        requested: u32,
        available: u32,
    },

    /// The catalog item does not exist.
    #[error("Catalog item not found: {0}")]
    ItemNotFound(ItemId),

    /// The cart line does not exist or belongs to another shopper.
    #[error("Cart line not found: {0}")]
    CartLineNotFound(CartLineId),

    /// A settlement consistency check failed; nothing was committed.
    #[error("Settlement rejected: {0}")]
    SettlementRejected(String),

    /// A stored value could not be mapped back into a domain type.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
