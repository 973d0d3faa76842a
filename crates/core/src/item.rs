use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::money::Money;

/// Identifier of one person taking part in a split. Unique within a session.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Participant(String);

impl Participant {
    pub fn new(name: impl Into<String>) -> Self {
        Participant(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Participant {
    fn from(name: &str) -> Self {
        Participant(name.to_string())
    }
}

/// Receipt lines that are shared by everyone rather than ordered by someone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialKind {
    Tax,
    Tip,
    ServiceCharge,
    Discount,
}

impl fmt::Display for SpecialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecialKind::Tax => write!(f, "tax"),
            SpecialKind::Tip => write!(f, "tip"),
            SpecialKind::ServiceCharge => write!(f, "service_charge"),
            SpecialKind::Discount => write!(f, "discount"),
        }
    }
}

impl std::str::FromStr for SpecialKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tax" => Ok(SpecialKind::Tax),
            "tip" => Ok(SpecialKind::Tip),
            "service_charge" => Ok(SpecialKind::ServiceCharge),
            "discount" => Ok(SpecialKind::Discount),
            other => Err(format!("Unknown special item kind: '{other}'")),
        }
    }
}

/// One row of a receipt table.
///
/// Source-currency amounts are set by the parser; the converted amounts are
/// only present once a conversion succeeded, and `shared_by` stays empty until
/// someone is assigned.
///
/// Deserialized items are checked on the way in: quantity at least 1, every
/// amount within [`crate::MAX_AMOUNT_UNITS`], negative amounts on discounts
/// only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireLineItem")]
pub struct LineItem {
    #[serde(rename = "item")]
    pub name: String,
    #[serde(rename = "price")]
    pub unit_price: Money,
    #[serde(rename = "qty")]
    pub quantity: u32,
    #[serde(rename = "total")]
    pub line_total: Money,
    #[serde(rename = "converted_price", skip_serializing_if = "Option::is_none")]
    pub converted_unit_price: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converted_total: Option<Money>,
    pub shared_by: BTreeSet<Participant>,
    #[serde(rename = "special_type", skip_serializing_if = "Option::is_none")]
    pub special: Option<SpecialKind>,
}

#[derive(Deserialize)]
struct WireLineItem {
    item: String,
    price: Money,
    qty: u32,
    total: Money,
    #[serde(default)]
    converted_price: Option<Money>,
    #[serde(default)]
    converted_total: Option<Money>,
    #[serde(default)]
    shared_by: BTreeSet<Participant>,
    #[serde(default)]
    special_type: Option<SpecialKind>,
}

impl TryFrom<WireLineItem> for LineItem {
    type Error = String;

    fn try_from(wire: WireLineItem) -> Result<Self, Self::Error> {
        if wire.qty == 0 {
            return Err(format!("item '{}': qty must be at least 1", wire.item));
        }
        let amounts = [
            Some(wire.price),
            Some(wire.total),
            wire.converted_price,
            wire.converted_total,
        ];
        for amount in amounts.into_iter().flatten() {
            if !amount.within_limit() {
                return Err(format!("item '{}': amount {amount} out of range", wire.item));
            }
            if amount.is_negative() && wire.special_type != Some(SpecialKind::Discount) {
                return Err(format!(
                    "item '{}': negative amounts are only allowed on discounts",
                    wire.item
                ));
            }
        }
        Ok(LineItem {
            name: wire.item,
            unit_price: wire.price,
            quantity: wire.qty,
            line_total: wire.total,
            converted_unit_price: wire.converted_price,
            converted_total: wire.converted_total,
            shared_by: wire.shared_by,
            special: wire.special_type,
        })
    }
}

impl LineItem {
    pub fn new(name: impl Into<String>, unit_price: Money, quantity: u32, line_total: Money) -> Self {
        Self {
            name: name.into(),
            unit_price,
            quantity,
            line_total,
            converted_unit_price: None,
            converted_total: None,
            shared_by: BTreeSet::new(),
            special: None,
        }
    }

    pub fn is_converted(&self) -> bool {
        self.converted_total.is_some()
    }

    /// Drops converted amounts, leaving a plain source-currency row.
    pub fn clear_conversion(&mut self) {
        self.converted_unit_price = None;
        self.converted_total = None;
    }

    /// The amount a split works from: converted when available.
    pub fn split_base(&self) -> Money {
        self.converted_total.unwrap_or(self.line_total)
    }
}
