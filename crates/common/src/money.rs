//! Decimal money amounts with two fraction digits.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Errors produced when parsing a money amount from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyParseError {
    #[error("invalid amount '{0}'")]
    Invalid(String),

    #[error("amount '{0}' has more than two fraction digits")]
    TooPrecise(String),

    #[error("amount '{0}' is negative")]
    Negative(String),
}

/// A money amount held as a decimal with exactly two fraction digits.
///
/// All constructors round half away from zero, so `Money` never carries
/// sub-cent precision and always displays as e.g. `210.00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Creates a money amount, rounding to two fraction digits.
    pub fn new(amount: Decimal) -> Self {
        let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(2);
        Self(rounded)
    }

    /// Creates a money amount from a whole number of cents.
    pub fn from_cents(cents: i64) -> Self {
        Self::new(Decimal::new(cents, 2))
    }

    /// Creates a money amount from a whole number of major units.
    pub fn from_units(units: i64) -> Self {
        Self::new(Decimal::from(units))
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self::new(Decimal::ZERO)
    }

    /// Returns the underlying decimal.
    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Multiplies by a quantity.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money::new(self.0 * Decimal::from(quantity))
    }

    /// Returns `rate` of this amount (e.g. `0.10` for ten percent), rounded.
    pub fn percentage(&self, rate: Decimal) -> Money {
        Money::new(self.0 * rate)
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Money {
    type Err = MoneyParseError;

    /// Parses gateway-style amounts such as `"210"`, `"210.0"` or `"1,210.50"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
        let value =
            Decimal::from_str(&cleaned).map_err(|_| MoneyParseError::Invalid(s.to_string()))?;

        if value.is_sign_negative() && !value.is_zero() {
            return Err(MoneyParseError::Negative(s.to_string()));
        }
        if value.normalize().scale() > 2 {
            return Err(MoneyParseError::TooPrecise(s.to_string()));
        }
        Ok(Money::new(value))
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = <Decimal as Deserialize>::deserialize(deserializer)?;
        if value.is_sign_negative() && !value.is_zero() {
            return Err(serde::de::Error::custom(MoneyParseError::Negative(
                value.to_string(),
            )));
        }
        Ok(Money::new(value))
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Money::new(value)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money::new(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money::new(self.0 - rhs.0)
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}
