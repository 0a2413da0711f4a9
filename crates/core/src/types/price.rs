//! Type-safe price representation using decimal arithmetic.
//!
//! The catalog API sends prices either as JSON numbers or as decimal strings
//! (`"50.00"`). Both deserialize into [`Price`]; serialization always writes
//! the string form so persisted carts never lose precision.

use core::fmt;
use core::iter::Sum;
use core::ops::Add;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A non-currency-tagged amount in the catalog's standard unit (e.g. euros, not cents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// The zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price from a decimal amount.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a price from minor units (e.g. `from_cents(1999)` is `19.99`).
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Line total for `quantity` units at this price, or `None` if it overflows.
    #[must_use]
    pub fn times(&self, quantity: u32) -> Option<Self> {
        self.0.checked_mul(Decimal::from(quantity)).map(Self)
    }

    /// Sum of two amounts, or `None` if it overflows.
    #[must_use]
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

}

impl From<Decimal> for Price {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0.round_dp(2))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_times_and_sum() {
        let unit = Price::from_cents(5000);
        let total: Price = [unit.times(2).unwrap(), Price::from_cents(1999)].into_iter().sum();
        assert_eq!(total, Price::from_cents(11999));
    }

    #[test]
    fn test_overflow_is_reported() {
        let huge = Price::new(Decimal::MAX);
        assert_eq!(huge.times(2), None);
        assert_eq!(huge.checked_add(Price::from_cents(1)), None);
        assert_eq!(huge.times(1), Some(huge));
    }

    #[test]
    fn test_deserialize_number_or_string() {
        let from_number: Price = serde_json::from_str("50").unwrap();
        let from_string: Price = serde_json::from_str("\"50.00\"").unwrap();
        assert_eq!(from_number, from_string);
    }

    #[test]
    fn test_display() {
        assert_eq!(Price::from_cents(5).to_string(), "0.05");
        assert_eq!(Price::from_cents(12500).to_string(), "125.00");
    }
}
