use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CartLineId, ItemId, Money, ShopperId};

/// Product category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Men,
    Women,
    Accessories,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Men => "Men",
            Category::Women => "Women",
            Category::Accessories => "Accessories",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Men" => Ok(Category::Men),
            "Women" => Ok(Category::Women),
            "Accessories" => Ok(Category::Accessories),
            other => Err(format!("unknown category '{other}'")),
        }
    }
}

/// A sellable product and its available stock.
///
/// `available` is unsigned and only ever decremented through a checked
/// reservation, so it cannot go negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: ItemId,
    pub name: String,
    pub price: Money,
    pub category: Category,
    pub available: u32,
}

impl CatalogItem {
    pub fn new(
        id: impl Into<ItemId>,
        name: impl Into<String>,
        price: Money,
        category: Category,
        available: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            category,
            available,
        }
    }

    pub fn in_stock(&self) -> bool {
        self.available > 0
    }
}

/// One product line in a shopper's cart.
///
/// `item_name` and `unit_price` are read from the catalog when the line is
/// loaded; they are not stored on the line itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: CartLineId,
    pub shopper_id: ShopperId,
    pub item_id: ItemId,
    pub item_name: String,
    pub unit_price: Money,
    pub quantity: u32,
    /// When stock for this line was last reserved; drives reservation expiry.
    pub reserved_at: DateTime<Utc>,
}

impl CartLine {
    /// Returns `unit_price * quantity`.
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}
