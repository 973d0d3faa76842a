use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;
use std::str::FromStr;

use crate::currency::ExchangeRate;

/// A monetary amount. The currency is carried alongside, never inside.
///
/// Every rounding step in the workspace goes through [`Money::round`]:
/// two decimal places, midpoint away from zero (`0.125 -> 0.13`,
/// `-0.125 -> -0.13`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Money(Decimal);

/// Largest magnitude accepted from receipts and requests, in whole units.
/// Sums and shares of amounts below it stay far from `Decimal`'s range.
pub const MAX_AMOUNT_UNITS: i64 = 1_000_000_000_000;

impl Money {
    /// Wraps a decimal as-is, keeping whatever scale it was parsed with.
    pub fn new(amount: Decimal) -> Self {
        Money(amount)
    }

    /// Wraps a decimal rounded to cents.
    pub fn from_decimal(amount: Decimal) -> Self {
        Money(amount).round()
    }

    pub fn from_cents(cents: i64) -> Self {
        Money(Decimal::new(cents, 2))
    }

    pub fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn amount(self) -> Decimal {
        self.0
    }

    pub fn round(self) -> Self {
        Money(self.0.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
    }

    pub fn is_negative(self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    pub fn within_limit(self) -> bool {
        self.0.abs() <= Decimal::from(MAX_AMOUNT_UNITS)
    }

    /// Converts into the rate's target currency, rounded to cents.
    /// `None` when the product leaves `Decimal`'s range.
    pub fn convert(self, rate: ExchangeRate) -> Option<Self> {
        self.0.checked_mul(rate.value()).map(|v| Money(v).round())
    }

    /// `self / parts`, unrounded. `parts` is never zero at the call sites.
    pub fn divide(self, parts: usize) -> Self {
        Money(self.0 / Decimal::from(parts))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s).map(Money)
    }
}

impl Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Money(self.0 + rhs.0)
    }
}
