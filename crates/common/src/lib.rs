//! Shared types for the storefront checkout system.

pub mod ids;
pub mod money;

pub use ids::{CartLineId, ItemId, ShopperId};
pub use money::{Money, MoneyParseError};
