//! Cart operations paired with stock reservations.

use common::{CartLineId, ItemId, Money, ShopperId};
use serde::Serialize;
use store::{Cart, CartLine, Catalog, cart_subtotal};

use crate::error::DomainError;
use crate::inventory::InventoryAdjuster;

/// A shopper's cart with its running subtotal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub subtotal: Money,
}

/// Service for cart mutations.
///
/// Every unit placed in a cart is reserved first; every unit taken out is
/// released after the line changes.
#[derive(Clone)]
pub struct CartService<S> {
    store: S,
    inventory: InventoryAdjuster<S>,
}

impl<S: Catalog + Cart + Clone> CartService<S> {
    /// Creates a new cart service with the given store.
    pub fn new(store: S) -> Self {
        Self {
            inventory: InventoryAdjuster::new(store.clone()),
            store,
        }
    }

    /// Adds one unit of an item to the shopper's cart.
    #[tracing::instrument(skip(self))]
    pub async fn add(&self, shopper: ShopperId, item_id: ItemId) -> Result<CartLine, DomainError> {
        self.inventory.reserve(item_id, 1).await?;

        match self.store.add_unit(shopper, item_id).await {
            Ok(line) => Ok(line),
            Err(e) => {
                self.inventory.release(item_id, 1).await?;
                Err(e.into())
            }
        }
    }

    /// Adds one more unit to an existing line.
    #[tracing::instrument(skip(self))]
    pub async fn increase(
        &self,
        shopper: ShopperId,
        line_id: CartLineId,
    ) -> Result<CartLine, DomainError> {
        let line = self
            .store
            .get_line(shopper, line_id)
            .await?
            .ok_or(DomainError::CartLineNotFound(line_id))?;

        self.inventory.reserve(line.item_id, 1).await?;

        match self.store.increment_line(shopper, line_id).await {
            Ok(line) => Ok(line),
            Err(e) => {
                self.inventory.release(line.item_id, 1).await?;
                Err(e.into())
            }
        }
    }

    /// Removes one unit from a line. A line at quantity 1 is left as is.
    #[tracing::instrument(skip(self))]
    pub async fn decrease(
        &self,
        shopper: ShopperId,
        line_id: CartLineId,
    ) -> Result<CartLine, DomainError> {
        match self.store.decrement_line(shopper, line_id).await? {
            Some(line) => {
                self.inventory.release(line.item_id, 1).await?;
                Ok(line)
            }
            None => self
                .store
                .get_line(shopper, line_id)
                .await?
                .ok_or(DomainError::CartLineNotFound(line_id)),
        }
    }

    /// Deletes a line and releases its whole quantity.
    #[tracing::instrument(skip(self))]
    pub async fn remove(
        &self,
        shopper: ShopperId,
        line_id: CartLineId,
    ) -> Result<CartLine, DomainError> {
        let line = self.store.delete_line(shopper, line_id).await?;
        self.inventory.release(line.item_id, line.quantity).await?;
        Ok(line)
    }

    /// Returns the shopper's cart.
    pub async fn view(&self, shopper: ShopperId) -> Result<CartView, DomainError> {
        let lines = self.store.lines_for(shopper).await?;
        let subtotal = cart_subtotal(&lines);
        Ok(CartView { lines, subtotal })
    }
}
