use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    CartLine, CartLineId, CatalogItem, ItemId, Result, ShopperId, StoreError, TransactionQuery,
    TransactionRecord, TransactionStatus, TransactionSummary,
    store::{Cart, Catalog, Ledger, Settlement, SettlementReceipt, check_cart_settlement},
};

#[derive(Debug, Clone)]
struct StoredLine {
    id: CartLineId,
    shopper_id: ShopperId,
    item_id: ItemId,
    quantity: u32,
    reserved_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct State {
    items: HashMap<ItemId, CatalogItem>,
    lines: BTreeMap<CartLineId, StoredLine>,
    transactions: HashMap<String, TransactionRecord>,
    next_line_id: i64,
}

impl State {
    fn hydrate(&self, line: &StoredLine) -> Result<CartLine> {
        let item = self
            .items
            .get(&line.item_id)
            .ok_or_else(|| StoreError::Corrupt(format!("cart line {} has no item", line.id)))?;
        Ok(CartLine {
            id: line.id,
            shopper_id: line.shopper_id,
            item_id: line.item_id,
            item_name: item.name.clone(),
            unit_price: item.price,
            quantity: line.quantity,
            reserved_at: line.reserved_at,
        })
    }

    fn owned_line_mut(
        &mut self,
        shopper: ShopperId,
        line_id: CartLineId,
    ) -> Result<&mut StoredLine> {
        self.lines
            .get_mut(&line_id)
            .filter(|l| l.shopper_id == shopper)
            .ok_or(StoreError::CartLineNotFound(line_id))
    }

    fn take_stock(&mut self, item_id: ItemId, quantity: u32) -> Result<CatalogItem> {
        let item = self
            .items
            .get_mut(&item_id)
            .ok_or(StoreError::ItemNotFound(item_id))?;
        if item.available < quantity {
            return Err(StoreError::OutOfStock {
                item_id,
                name: item.name.clone(),
                requested: quantity,
                available: item.available,
            });
        }
        item.available -= quantity;
        Ok(item.clone())
    }
}

/// In-memory store implementation.
///
/// Every operation runs under a single write lock, which gives the same
/// atomicity and per-item serialization as the PostgreSQL implementation.
/// Used by tests and when no database is configured.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of ledger rows.
    pub async fn transaction_count(&self) -> usize {
        self.state.read().await.transactions.len()
    }

    /// Returns the number of cart lines across all shoppers.
    pub async fn line_count(&self) -> usize {
        self.state.read().await.lines.len()
    }
}

#[async_trait]
impl Catalog for InMemoryStore {
    async fn get_item(&self, item_id: ItemId) -> Result<Option<CatalogItem>> {
        Ok(self.state.read().await.items.get(&item_id).cloned())
    }

    async fn put_item(&self, item: CatalogItem) -> Result<()> {
        self.state.write().await.items.insert(item.id, item);
        Ok(())
    }

    async fn delete_item(&self, item_id: ItemId) -> Result<()> {
        let mut state = self.state.write().await;
        state.items.remove(&item_id);
        state.lines.retain(|_, line| line.item_id != item_id);
        Ok(())
    }

    async fn reserve(&self, item_id: ItemId, quantity: u32) -> Result<CatalogItem> {
        self.state.write().await.take_stock(item_id, quantity)
    }

    async fn release(&self, item_id: ItemId, quantity: u32) -> Result<CatalogItem> {
        let mut state = self.state.write().await;
        let item = state
            .items
            .get_mut(&item_id)
            .ok_or(StoreError::ItemNotFound(item_id))?;
        item.available = item.available.saturating_add(quantity);
        Ok(item.clone())
    }
}

#[async_trait]
impl Cart for InMemoryStore {
    async fn lines_for(&self, shopper: ShopperId) -> Result<Vec<CartLine>> {
        let state = self.state.read().await;
        state
            .lines
            .values()
            .filter(|l| l.shopper_id == shopper)
            .map(|l| state.hydrate(l))
            .collect()
    }

    async fn get_line(&self, shopper: ShopperId, line_id: CartLineId) -> Result<Option<CartLine>> {
        let state = self.state.read().await;
        state
            .lines
            .get(&line_id)
            .filter(|l| l.shopper_id == shopper)
            .map(|l| state.hydrate(l))
            .transpose()
    }

    async fn add_unit(&self, shopper: ShopperId, item_id: ItemId) -> Result<CartLine> {
        let mut state = self.state.write().await;
        if !state.items.contains_key(&item_id) {
            return Err(StoreError::ItemNotFound(item_id));
        }

        let now = Utc::now();
        let existing = state
            .lines
            .values_mut()
            .find(|l| l.shopper_id == shopper && l.item_id == item_id);

        let line = match existing {
            Some(line) => {
                line.quantity += 1;
                line.reserved_at = now;
                line.clone()
            }
            None => {
                state.next_line_id += 1;
                let line = StoredLine {
                    id: CartLineId::new(state.next_line_id),
                    shopper_id: shopper,
                    item_id,
                    quantity: 1,
                    reserved_at: now,
                };
                state.lines.insert(line.id, line.clone());
                line
            }
        };
        state.hydrate(&line)
    }

    async fn increment_line(&self, shopper: ShopperId, line_id: CartLineId) -> Result<CartLine> {
        let mut state = self.state.write().await;
        let line = state.owned_line_mut(shopper, line_id)?;
        line.quantity += 1;
        line.reserved_at = Utc::now();
        let line = line.clone();
        state.hydrate(&line)
    }

    async fn decrement_line(
        &self,
        shopper: ShopperId,
        line_id: CartLineId,
    ) -> Result<Option<CartLine>> {
        let mut state = self.state.write().await;
        let line = state.owned_line_mut(shopper, line_id)?;
        if line.quantity <= 1 {
            return Ok(None);
        }
        line.quantity -= 1;
        let line = line.clone();
        state.hydrate(&line).map(Some)
    }

    async fn delete_line(&self, shopper: ShopperId, line_id: CartLineId) -> Result<CartLine> {
        let mut state = self.state.write().await;
        let line = state.owned_line_mut(shopper, line_id)?.clone();
        let hydrated = state.hydrate(&line)?;
        state.lines.remove(&line_id);
        Ok(hydrated)
    }

    async fn release_expired(&self, cutoff: DateTime<Utc>) -> Result<Vec<CartLine>> {
        let mut state = self.state.write().await;
        let expired: Vec<StoredLine> = state
            .lines
            .values()
            .filter(|l| l.reserved_at < cutoff)
            .cloned()
            .collect();

        let hydrated = expired
            .iter()
            .map(|l| state.hydrate(l))
            .collect::<Result<Vec<_>>>()?;

        for line in &expired {
            state.lines.remove(&line.id);
            if let Some(item) = state.items.get_mut(&line.item_id) {
                item.available = item.available.saturating_add(line.quantity);
            }
        }
        Ok(hydrated)
    }
}

#[async_trait]
impl Ledger for InMemoryStore {
    async fn record(&self, record: TransactionRecord) -> Result<()> {
        let mut state = self.state.write().await;
        if state.transactions.contains_key(&record.transaction_id) {
            return Err(StoreError::DuplicateTransaction(record.transaction_id));
        }
        state
            .transactions
            .insert(record.transaction_id.clone(), record);
        Ok(())
    }

    async fn settle(
        &self,
        record: TransactionRecord,
        settlement: Settlement,
    ) -> Result<SettlementReceipt> {
        let mut state = self.state.write().await;
        if state.transactions.contains_key(&record.transaction_id) {
            return Err(StoreError::DuplicateTransaction(record.transaction_id));
        }

        // Validate everything before mutating anything.
        let receipt = match settlement {
            Settlement::ClearCart {
                shopper,
                expected_subtotal,
            } => {
                let lines = state
                    .lines
                    .values()
                    .filter(|l| l.shopper_id == shopper)
                    .map(|l| state.hydrate(l))
                    .collect::<Result<Vec<_>>>()?;
                check_cart_settlement(&lines, expected_subtotal)?;
                for line in &lines {
                    state.lines.remove(&line.id);
                }
                SettlementReceipt::CartCleared(lines)
            }
            Settlement::ConsumeItem { item_id, quantity } => {
                let item = state.take_stock(item_id, quantity).map_err(|e| {
                    StoreError::SettlementRejected(format!("cannot consume stock: {e}"))
                })?;
                SettlementReceipt::ItemConsumed(item)
            }
        };

        state
            .transactions
            .insert(record.transaction_id.clone(), record);
        Ok(receipt)
    }

    async fn get_transaction(&self, transaction_id: &str) -> Result<Option<TransactionRecord>> {
        Ok(self
            .state
            .read()
            .await
            .transactions
            .get(transaction_id)
            .cloned())
    }

    async fn query_transactions(&self, query: TransactionQuery) -> Result<Vec<TransactionRecord>> {
        let state = self.state.read().await;
        let mut records: Vec<_> = state
            .transactions
            .values()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();

        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.transaction_id.cmp(&a.transaction_id))
        });

        let offset = query.offset.unwrap_or(0);
        let records = records.into_iter().skip(offset);
        let records = match query.limit {
            Some(limit) => records.take(limit).collect(),
            None => records.collect(),
        };
        Ok(records)
    }

    async fn count_transactions(&self, query: TransactionQuery) -> Result<u64> {
        let state = self.state.read().await;
        Ok(state
            .transactions
            .values()
            .filter(|r| query.matches(r))
            .count() as u64)
    }

    async fn summary(&self) -> Result<TransactionSummary> {
        let state = self.state.read().await;
        let count = |status: TransactionStatus| {
            state
                .transactions
                .values()
                .filter(|r| r.status == status)
                .count() as u64
        };
        Ok(TransactionSummary {
            total: state.transactions.len() as u64,
            pending: count(TransactionStatus::Pending),
            complete: count(TransactionStatus::Complete),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Category, Money};

    fn jacket(available: u32) -> CatalogItem {
        CatalogItem::new(1, "Denim Jacket", Money::from_units(100), Category::Men, available)
    }

    fn record(id: &str, status: TransactionStatus) -> TransactionRecord {
        TransactionRecord::builder()
            .transaction_id(id)
            .product_code("EPAYTEST")
            .total_amount(Money::from_units(210))
            .status(status)
            .build()
    }

    async fn store_with_jacket(available: u32) -> InMemoryStore {
        let store = InMemoryStore::new();
        store.put_item(jacket(available)).await.unwrap();
        store
    }

    #[tokio::test]
    async fn reserve_decrements_stock() {
        let store = store_with_jacket(3).await;
        let item = store.reserve(ItemId::new(1), 2).await.unwrap();
        assert_eq!(item.available, 1);
    }

    #[tokio::test]
    async fn reserve_beyond_stock_is_rejected_without_change() {
        let store = store_with_jacket(1).await;
        let result = store.reserve(ItemId::new(1), 2).await;
        assert!(matches!(
            result,
            Err(StoreError::OutOfStock {
                requested: 2,
                available: 1,
                ..
            })
        ));
        let item = store.get_item(ItemId::new(1)).await.unwrap().unwrap();
        assert_eq!(item.available, 1);
    }

    #[tokio::test]
    async fn release_of_missing_item_fails() {
        let store = InMemoryStore::new();
        let result = store.release(ItemId::new(9), 1).await;
        assert!(matches!(result, Err(StoreError::ItemNotFound(_))));
    }

    #[tokio::test]
    async fn add_unit_creates_then_increments() {
        let store = store_with_jacket(5).await;
        let shopper = ShopperId::new();

        let first = store.add_unit(shopper, ItemId::new(1)).await.unwrap();
        let second = store.add_unit(shopper, ItemId::new(1)).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.quantity, 2);
        assert_eq!(second.item_name, "Denim Jacket");
        assert_eq!(store.line_count().await, 1);
    }

    #[tokio::test]
    async fn decrement_stops_at_one() {
        let store = store_with_jacket(5).await;
        let shopper = ShopperId::new();
        let line = store.add_unit(shopper, ItemId::new(1)).await.unwrap();

        let result = store.decrement_line(shopper, line.id).await.unwrap();
        assert!(result.is_none());
        let line = store.get_line(shopper, line.id).await.unwrap().unwrap();
        assert_eq!(line.quantity, 1);
    }

    #[tokio::test]
    async fn lines_are_private_to_their_shopper() {
        let store = store_with_jacket(5).await;
        let owner = ShopperId::new();
        let other = ShopperId::new();
        let line = store.add_unit(owner, ItemId::new(1)).await.unwrap();

        assert!(store.get_line(other, line.id).await.unwrap().is_none());
        assert!(matches!(
            store.delete_line(other, line.id).await,
            Err(StoreError::CartLineNotFound(_))
        ));
    }

    #[tokio::test]
    async fn deleting_item_drops_its_cart_lines() {
        let store = store_with_jacket(5).await;
        let shopper = ShopperId::new();
        store.add_unit(shopper, ItemId::new(1)).await.unwrap();

        store.delete_item(ItemId::new(1)).await.unwrap();
        assert!(store.lines_for(shopper).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn release_expired_returns_stock() {
        let store = store_with_jacket(5).await;
        let shopper = ShopperId::new();
        store.reserve(ItemId::new(1), 2).await.unwrap();
        store.add_unit(shopper, ItemId::new(1)).await.unwrap();
        store.add_unit(shopper, ItemId::new(1)).await.unwrap();

        let expired = store
            .release_expired(Utc::now() + chrono::Duration::seconds(1))
            .await
            .unwrap();

        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].quantity, 2);
        assert_eq!(store.line_count().await, 0);
        let item = store.get_item(ItemId::new(1)).await.unwrap().unwrap();
        assert_eq!(item.available, 5);
    }

    #[tokio::test]
    async fn release_expired_keeps_fresh_lines() {
        let store = store_with_jacket(5).await;
        let shopper = ShopperId::new();
        store.add_unit(shopper, ItemId::new(1)).await.unwrap();

        let expired = store
            .release_expired(Utc::now() - chrono::Duration::hours(1))
            .await
            .unwrap();
        assert!(expired.is_empty());
        assert_eq!(store.line_count().await, 1);
    }

    #[tokio::test]
    async fn duplicate_record_is_rejected_and_first_row_kept() {
        let store = InMemoryStore::new();
        store
            .record(record("000AE01", TransactionStatus::Pending))
            .await
            .unwrap();

        let result = store
            .record(record("000AE01", TransactionStatus::Complete))
            .await;

        assert!(matches!(result, Err(StoreError::DuplicateTransaction(_))));
        assert_eq!(store.transaction_count().await, 1);
        let kept = store.get_transaction("000AE01").await.unwrap().unwrap();
        assert_eq!(kept.status, TransactionStatus::Pending);
    }

    #[tokio::test]
    async fn settle_clear_cart_removes_lines_and_records() {
        let store = store_with_jacket(5).await;
        let shopper = ShopperId::new();
        store.add_unit(shopper, ItemId::new(1)).await.unwrap();
        store.add_unit(shopper, ItemId::new(1)).await.unwrap();

        let receipt = store
            .settle(
                record("000AE01", TransactionStatus::Complete),
                Settlement::ClearCart {
                    shopper,
                    expected_subtotal: Money::from_units(200),
                },
            )
            .await
            .unwrap();

        assert!(matches!(receipt, SettlementReceipt::CartCleared(ref lines) if lines.len() == 1));
        assert!(store.lines_for(shopper).await.unwrap().is_empty());
        assert_eq!(store.transaction_count().await, 1);
        // stock was reserved earlier, settlement does not touch it
        let item = store.get_item(ItemId::new(1)).await.unwrap().unwrap();
        assert_eq!(item.available, 5);
    }

    #[tokio::test]
    async fn settle_with_mismatched_subtotal_commits_nothing() {
        let store = store_with_jacket(5).await;
        let shopper = ShopperId::new();
        store.add_unit(shopper, ItemId::new(1)).await.unwrap();

        let result = store
            .settle(
                record("000AE01", TransactionStatus::Complete),
                Settlement::ClearCart {
                    shopper,
                    expected_subtotal: Money::from_units(300),
                },
            )
            .await;

        assert!(matches!(result, Err(StoreError::SettlementRejected(_))));
        assert_eq!(store.lines_for(shopper).await.unwrap().len(), 1);
        assert_eq!(store.transaction_count().await, 0);
    }

    #[tokio::test]
    async fn settle_empty_cart_is_rejected() {
        let store = InMemoryStore::new();
        let result = store
            .settle(
                record("000AE01", TransactionStatus::Complete),
                Settlement::ClearCart {
                    shopper: ShopperId::new(),
                    expected_subtotal: Money::zero(),
                },
            )
            .await;
        assert!(matches!(result, Err(StoreError::SettlementRejected(_))));
        assert_eq!(store.transaction_count().await, 0);
    }

    #[tokio::test]
    async fn settle_consume_item_takes_stock() {
        let store = store_with_jacket(2).await;
        let receipt = store
            .settle(
                record("000AE02", TransactionStatus::Complete),
                Settlement::ConsumeItem {
                    item_id: ItemId::new(1),
                    quantity: 1,
                },
            )
            .await
            .unwrap();

        assert!(matches!(receipt, SettlementReceipt::ItemConsumed(ref item) if item.available == 1));
        assert_eq!(store.transaction_count().await, 1);
    }

    #[tokio::test]
    async fn settle_consume_sold_out_item_commits_nothing() {
        let store = store_with_jacket(0).await;
        let result = store
            .settle(
                record("000AE02", TransactionStatus::Complete),
                Settlement::ConsumeItem {
                    item_id: ItemId::new(1),
                    quantity: 1,
                },
            )
            .await;

        assert!(matches!(result, Err(StoreError::SettlementRejected(_))));
        assert_eq!(store.transaction_count().await, 0);
    }

    #[tokio::test]
    async fn settle_duplicate_applies_nothing() {
        let store = store_with_jacket(5).await;
        let shopper = ShopperId::new();
        store.add_unit(shopper, ItemId::new(1)).await.unwrap();
        store
            .record(record("000AE01", TransactionStatus::Pending))
            .await
            .unwrap();

        let result = store
            .settle(
                record("000AE01", TransactionStatus::Complete),
                Settlement::ClearCart {
                    shopper,
                    expected_subtotal: Money::from_units(100),
                },
            )
            .await;

        assert!(matches!(result, Err(StoreError::DuplicateTransaction(_))));
        assert_eq!(store.lines_for(shopper).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn query_is_newest_first_with_paging() {
        let store = InMemoryStore::new();
        let base = Utc::now();
        for i in 0..5 {
            let mut r = record(&format!("T{i}"), TransactionStatus::Complete);
            r.created_at = base + chrono::Duration::seconds(i);
            store.record(r).await.unwrap();
        }

        let page = store
            .query_transactions(TransactionQuery::new().offset(1).limit(2))
            .await
            .unwrap();
        let ids: Vec<_> = page.iter().map(|r| r.transaction_id.as_str()).collect();
        assert_eq!(ids, ["T3", "T2"]);
        assert_eq!(
            store
                .count_transactions(TransactionQuery::new())
                .await
                .unwrap(),
            5
        );
    }

    #[tokio::test]
    async fn summary_counts_pending_and_complete() {
        let store = InMemoryStore::new();
        store
            .record(record("A", TransactionStatus::Pending))
            .await
            .unwrap();
        store
            .record(record("B", TransactionStatus::Complete))
            .await
            .unwrap();
        store
            .record(record("C", TransactionStatus::Canceled))
            .await
            .unwrap();

        let summary = store.summary().await.unwrap();
        assert_eq!(
            summary,
            TransactionSummary {
                total: 3,
                pending: 1,
                complete: 1
            }
        );
    }
}
