//! Price snapshot arithmetic shared by the cart and checkout.

use serde::{Deserialize, Serialize};
use crate::domain::value_objects::Money;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceChangeType { Increase, Decrease, NoChange }

/// How the live price moved relative to a recorded snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceChange {
    pub difference: Money,
    pub kind: PriceChangeType,
}

pub fn line_total(unit_price: Money, quantity: u32) -> Money {
    unit_price.multiply(quantity)
}

/// Sum of `unit_price × quantity` over the given lines.
pub fn sum_lines<I>(lines: I) -> Money
where
    I: IntoIterator<Item = (Money, u32)>,
{
    lines.into_iter().map(|(price, qty)| line_total(price, qty)).sum()
}

pub fn price_change(snapshot: Money, current: Money) -> PriceChange {
    let kind = match current.cmp(&snapshot) {
        std::cmp::Ordering::Greater => PriceChangeType::Increase,
        std::cmp::Ordering::Less => PriceChangeType::Decrease,
        std::cmp::Ordering::Equal => PriceChangeType::NoChange,
    };
    PriceChange { difference: snapshot.abs_diff(current), kind }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_lines() {
        let total = sum_lines([(Money::new(10_000), 2), (Money::new(2_500), 4)]);
        assert_eq!(total, Money::new(30_000));
        assert_eq!(sum_lines(std::iter::empty()), Money::ZERO);
    }

    #[test]
    fn test_price_change_direction() {
        let up = price_change(Money::new(10_000), Money::new(12_000));
        assert_eq!(up, PriceChange { difference: Money::new(2_000), kind: PriceChangeType::Increase });
        let down = price_change(Money::new(10_000), Money::new(9_000));
        assert_eq!(down.kind, PriceChangeType::Decrease);
        assert_eq!(down.difference, Money::new(1_000));
        assert_eq!(price_change(Money::new(1), Money::new(1)).kind, PriceChangeType::NoChange);
    }
}
