//! Value Objects for the checkout domain

use serde::{Deserialize, Serialize};
use std::fmt;

/// Amount in Vietnamese đồng. The currency has no minor unit in everyday use,
/// so amounts are whole integers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn new(amount: i64) -> Self { Self(amount) }
    pub fn amount(&self) -> i64 { self.0 }
    pub fn add(&self, other: Money) -> Money { Money(self.0.saturating_add(other.0)) }
    pub fn subtract(&self, other: Money) -> Money { Money(self.0.saturating_sub(other.0)) }
    pub fn multiply(&self, qty: u32) -> Money { Money(self.0.saturating_mul(i64::from(qty))) }
    pub fn abs_diff(&self, other: Money) -> Money { Money(self.0.saturating_sub(other.0).saturating_abs()) }

    /// Amount scaled by 100, the unit payment gateways expect.
    pub fn minor_units(&self) -> i64 { self.0.saturating_mul(100) }
}

impl fmt::Display for Money {
    /// Renders `1234567` as `1.234.567₫`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(ch);
        }
        if self.0 < 0 {
            write!(f, "-{}₫", grouped)
        } else {
            write!(f, "{}₫", grouped)
        }
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self { iter.fold(Money::ZERO, |acc, m| acc.add(m)) }
}

/// Units of stock on hand. Never negative by construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Self { Self(value) }
    pub fn value(&self) -> u32 { self.0 }
    pub fn add(&self, other: u32) -> Self { Self(self.0.saturating_add(other)) }
    pub fn subtract(&self, other: u32) -> Option<Self> { self.0.checked_sub(other).map(Self) }
    pub fn is_zero(&self) -> bool { self.0 == 0 }
    pub fn covers(&self, requested: u32) -> bool { self.0 >= requested }
}

/// Delivery contact copied onto an order at checkout. Later edits to the
/// delivery profile do not reach orders already placed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactSnapshot {
    pub full_name: String,
    pub phone: String,
    pub address: String,
}
