//! Persistence for the storefront checkout.
//!
//! Three concerns share one backing store so that payment settlement can
//! touch all of them inside a single transaction:
//! - the catalog (items and their available stock),
//! - shopper carts,
//! - the write-once payment ledger.

pub mod catalog;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod record;
pub mod store;

pub use catalog::{CartLine, CatalogItem, Category};
pub use common::{CartLineId, ItemId, Money, ShopperId};
pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use query::{TransactionQuery, TransactionSummary};
pub use record::{TransactionRecord, TransactionRecordBuilder, TransactionStatus};
pub use store::{
    Cart, Catalog, Ledger, Settlement, SettlementReceipt, Storefront, cart_subtotal,
};
