use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CurrencyError {
    #[error("Invalid currency code: '{0}' (expected three letters, e.g. EUR)")]
    Invalid(String),
    #[error("Exchange rate must be positive, got {0}")]
    NonPositiveRate(Decimal),
}

/// ISO-style three-letter currency code, always stored uppercase.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn new(code: &str) -> Result<Self, CurrencyError> {
        let code = code.trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CurrencyError::Invalid(code.to_string()));
        }
        Ok(CurrencyCode(code.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// For compile-time constants that are known to be valid.
    pub(crate) fn from_static(code: &'static str) -> Self {
        CurrencyCode(code.to_string())
    }

    pub fn eur() -> Self {
        Self::from_static("EUR")
    }

    pub fn usd() -> Self {
        Self::from_static("USD")
    }

    pub fn gbp() -> Self {
        Self::from_static("GBP")
    }

    pub fn jpy() -> Self {
        Self::from_static("JPY")
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CurrencyCode {
    type Err = CurrencyError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CurrencyCode::new(s)
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = CurrencyError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        CurrencyCode::new(&s)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

/// Multiplier turning one unit of a source currency into the target currency.
/// Only meaningful for the conversion call that fetched it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExchangeRate(Decimal);

impl ExchangeRate {
    pub fn new(value: Decimal) -> Result<Self, CurrencyError> {
        if value <= Decimal::ZERO {
            return Err(CurrencyError::NonPositiveRate(value));
        }
        Ok(ExchangeRate(value))
    }

    pub fn value(self) -> Decimal {
        self.0
    }
}

impl fmt::Display for ExchangeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
