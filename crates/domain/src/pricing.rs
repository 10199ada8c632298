//! Checkout modes, tax policies and quotes.

use common::{ItemId, Money, ShopperId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use store::{Cart, Catalog, cart_subtotal};

use crate::error::DomainError;

/// How tax is computed on a checkout amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaxPolicy {
    /// A fixed surcharge regardless of amount.
    Flat(Money),
    /// A fraction of the amount (`0.10` is ten percent), rounded half away
    /// from zero to two digits.
    Proportional(Decimal),
}

impl TaxPolicy {
    /// Returns the tax owed on `amount`.
    pub fn tax_on(&self, amount: Money) -> Money {
        match self {
            TaxPolicy::Flat(surcharge) => *surcharge,
            TaxPolicy::Proportional(rate) => amount.percentage(*rate),
        }
    }

    /// Recovers the pre-tax amount from a taxed total.
    ///
    /// Only a flat surcharge can be inverted exactly; proportional tax
    /// returns `None`.
    pub fn untaxed(&self, total: Money) -> Option<Money> {
        match self {
            TaxPolicy::Flat(surcharge) => Some(total - *surcharge),
            TaxPolicy::Proportional(_) => None,
        }
    }
}

/// The two ways a shopper can pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutMode {
    /// Pay for the whole cart. Flat 10.00 surcharge.
    Cart,
    /// Pay for a single item straight from the product page. 10% tax.
    BuyNow,
}

impl CheckoutMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutMode::Cart => "cart",
            CheckoutMode::BuyNow => "buy_now",
        }
    }

    /// Returns the tax policy that applies to this mode.
    pub fn tax_policy(&self) -> TaxPolicy {
        match self {
            CheckoutMode::Cart => TaxPolicy::Flat(Money::new(dec!(10.00))),
            CheckoutMode::BuyNow => TaxPolicy::Proportional(dec!(0.10)),
        }
    }
}

impl std::fmt::Display for CheckoutMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Amount, tax and total for one checkout attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub mode: CheckoutMode,
    pub amount: Money,
    pub tax: Money,
    pub total: Money,
}

impl Quote {
    /// Prices `amount` under the mode's tax policy.
    pub fn new(mode: CheckoutMode, amount: Money) -> Self {
        let tax = mode.tax_policy().tax_on(amount);
        Self {
            mode,
            amount,
            tax,
            total: amount + tax,
        }
    }
}

/// Builds quotes from the current cart or catalog state.
///
/// Quoting never mutates anything.
#[derive(Clone)]
pub struct QuoteService<S> {
    store: S,
}

impl<S: Catalog + Cart> QuoteService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Quotes the shopper's whole cart. Fails with `EmptyCart` if it has no
    /// lines.
    pub async fn quote_cart(&self, shopper: ShopperId) -> Result<Quote, DomainError> {
        let lines = self.store.lines_for(shopper).await?;
        if lines.is_empty() {
            return Err(DomainError::EmptyCart);
        }
        Ok(Quote::new(CheckoutMode::Cart, cart_subtotal(&lines)))
    }

    /// Quotes a single unit of an item. Fails with `OutOfStock` if none is
    /// available.
    pub async fn quote_buy_now(&self, item_id: ItemId) -> Result<Quote, DomainError> {
        let item = self
            .store
            .get_item(item_id)
            .await?
            .ok_or(DomainError::ItemNotFound(item_id))?;

        if !item.in_stock() {
            return Err(DomainError::OutOfStock {
                item_id,
                name: item.name,
                requested: 1,
                available: 0,
            });
        }
        Ok(Quote::new(CheckoutMode::BuyNow, item.price))
    }
}
