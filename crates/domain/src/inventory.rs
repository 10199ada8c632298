//! Stock reservation and release.

use common::ItemId;
use store::{Catalog, CatalogItem, StoreError};

use crate::error::DomainError;

/// Applies stock deltas to catalog items.
///
/// Stock is reserved when a cart line is created or grown, not when payment
/// completes. Whatever a cart holds is unavailable to every other shopper
/// until the line shrinks, is removed, or expires.
#[derive(Clone)]
pub struct InventoryAdjuster<S> {
    catalog: S,
}

impl<S: Catalog> InventoryAdjuster<S> {
    /// Creates a new adjuster over the given catalog.
    pub fn new(catalog: S) -> Self {
        Self { catalog }
    }

    /// Takes `quantity` units out of available stock.
    ///
    /// Fails with `OutOfStock` before any mutation if fewer units remain.
    #[tracing::instrument(skip(self))]
    pub async fn reserve(&self, item_id: ItemId, quantity: u32) -> Result<CatalogItem, DomainError> {
        let item = self.catalog.reserve(item_id, quantity).await?;
        metrics::counter!("inventory_reserved_units_total").increment(u64::from(quantity));
        tracing::debug!(%item_id, quantity, available = item.available, "stock reserved");
        Ok(item)
    }

    /// Returns `quantity` units to available stock.
    ///
    /// Best-effort: if the item no longer exists this logs a warning and
    /// returns `Ok(None)` instead of failing the caller.
    #[tracing::instrument(skip(self))]
    pub async fn release(
        &self,
        item_id: ItemId,
        quantity: u32,
    ) -> Result<Option<CatalogItem>, DomainError> {
        match self.catalog.release(item_id, quantity).await {
            Ok(item) => {
                metrics::counter!("inventory_released_units_total")
                    .increment(u64::from(quantity));
                tracing::debug!(%item_id, quantity, available = item.available, "stock released");
                Ok(Some(item))
            }
            Err(StoreError::ItemNotFound(_)) => {
                tracing::warn!(%item_id, quantity, "item vanished before release, skipping");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}
