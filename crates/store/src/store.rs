use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    CartLine, CartLineId, CatalogItem, ItemId, Money, Result, ShopperId, TransactionQuery,
    TransactionRecord, TransactionSummary,
};

/// Catalog items and their available stock.
///
/// `reserve` and `release` are serialized per item: no two concurrent calls
/// can lose each other's update.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Looks up an item by ID.
    async fn get_item(&self, item_id: ItemId) -> Result<Option<CatalogItem>>;

    /// Inserts or replaces a catalog item.
    async fn put_item(&self, item: CatalogItem) -> Result<()>;

    /// Deletes a catalog item together with any cart lines referencing it.
    async fn delete_item(&self, item_id: ItemId) -> Result<()>;

    /// Decrements available stock by `quantity`.
    ///
    /// Fails with `OutOfStock` (and changes nothing) if fewer than `quantity`
    /// units are available, or `ItemNotFound` if the item does not exist.
    async fn reserve(&self, item_id: ItemId, quantity: u32) -> Result<CatalogItem>;

    /// Increments available stock by `quantity`.
    ///
    /// Fails with `ItemNotFound` if the item does not exist.
    async fn release(&self, item_id: ItemId, quantity: u32) -> Result<CatalogItem>;
}

/// Shopper carts.
///
/// Cart operations never touch stock; pairing them with reservations is the
/// caller's job. The one exception is `release_expired`, which must return
/// stock in the same atomic step that drops the lines.
#[async_trait]
pub trait Cart: Send + Sync {
    /// Returns the shopper's cart lines, oldest first.
    async fn lines_for(&self, shopper: ShopperId) -> Result<Vec<CartLine>>;

    /// Returns one of the shopper's cart lines.
    async fn get_line(&self, shopper: ShopperId, line_id: CartLineId) -> Result<Option<CartLine>>;

    /// Adds one unit of an item: creates a line with quantity 1 or increments
    /// the existing one. Refreshes `reserved_at`.
    async fn add_unit(&self, shopper: ShopperId, item_id: ItemId) -> Result<CartLine>;

    /// Increments an existing line by one unit. Refreshes `reserved_at`.
    async fn increment_line(&self, shopper: ShopperId, line_id: CartLineId) -> Result<CartLine>;

    /// Decrements a line by one unit, never below 1.
    ///
    /// Returns `None` when the line was already at quantity 1 and nothing
    /// changed.
    async fn decrement_line(
        &self,
        shopper: ShopperId,
        line_id: CartLineId,
    ) -> Result<Option<CartLine>>;

    /// Deletes a line and returns it.
    async fn delete_line(&self, shopper: ShopperId, line_id: CartLineId) -> Result<CartLine>;

    /// Deletes every line reserved before `cutoff` and returns its quantity to
    /// stock, atomically. Returns the expired lines.
    async fn release_expired(&self, cutoff: DateTime<Utc>) -> Result<Vec<CartLine>>;
}

/// What a confirmed payment consumes, applied atomically with its ledger row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    /// Whole-cart payment. Stock was reserved when the cart was built, so
    /// only the lines are removed. The cart must be non-empty and its
    /// subtotal must equal `expected_subtotal`.
    ClearCart {
        shopper: ShopperId,
        expected_subtotal: Money,
    },

    /// Single-item payment. Nothing was reserved up front, so stock is
    /// taken here. Cart lines are untouched.
    ConsumeItem { item_id: ItemId, quantity: u32 },
}

/// Effects applied by a successful settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementReceipt {
    /// The cart lines that were removed.
    CartCleared(Vec<CartLine>),

    /// The item after its stock was taken.
    ItemConsumed(CatalogItem),
}

/// The write-once payment ledger.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Inserts a record.
    ///
    /// Fails with `DuplicateTransaction` if the identifier is already present;
    /// the existing row is left untouched.
    async fn record(&self, record: TransactionRecord) -> Result<()>;

    /// Inserts a record and applies `settlement` as one atomic unit.
    ///
    /// The ledger insert happens first, so a concurrent settlement for the
    /// same identifier fails with `DuplicateTransaction` and applies nothing.
    /// Any consistency failure yields `SettlementRejected` and nothing,
    /// including the ledger row, is committed.
    async fn settle(
        &self,
        record: TransactionRecord,
        settlement: Settlement,
    ) -> Result<SettlementReceipt>;

    /// Looks up a record by transaction identifier.
    async fn get_transaction(&self, transaction_id: &str) -> Result<Option<TransactionRecord>>;

    /// Returns records matching a query, newest first.
    async fn query_transactions(&self, query: TransactionQuery) -> Result<Vec<TransactionRecord>>;

    /// Counts records matching a query (ignores limit/offset).
    async fn count_transactions(&self, query: TransactionQuery) -> Result<u64>;

    /// Returns total, pending and complete counts.
    async fn summary(&self) -> Result<TransactionSummary>;
}

/// Everything the checkout needs from one backing store.
pub trait Storefront: Catalog + Cart + Ledger {}

impl<T: Catalog + Cart + Ledger + ?Sized> Storefront for T {}

/// Sums the line totals of a cart.
pub fn cart_subtotal(lines: &[CartLine]) -> Money {
    lines.iter().map(CartLine::line_total).sum()
}

/// Validates a cart against a `ClearCart` settlement.
pub(crate) fn check_cart_settlement(lines: &[CartLine], expected_subtotal: Money) -> Result<()> {
    if lines.is_empty() {
        return Err(crate::StoreError::SettlementRejected(
            "cart is empty".to_string(),
        ));
    }
    let subtotal = cart_subtotal(lines);
    if subtotal != expected_subtotal {
        return Err(crate::StoreError::SettlementRejected(format!(
            "cart subtotal {subtotal} does not match paid subtotal {expected_subtotal}"
        )));
    }
    Ok(())
}
