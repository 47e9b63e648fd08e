//! Product Aggregate
//!
//! The catalogue itself is owned elsewhere; checkout only reads the current
//! price and moves the stock counter.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use crate::domain::value_objects::{Money, Quantity};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    id: Uuid,
    title: String,
    price: Money,
    stock: Quantity,
}

impl Product {
    pub fn new(id: Uuid, title: impl Into<String>, price: Money, stock: u32) -> Self {
        Self { id, title: title.into(), price, stock: Quantity::new(stock) }
    }

    pub fn create(title: impl Into<String>, price: Money, stock: u32) -> Self {
        Self::new(Uuid::now_v7(), title, price, stock)
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn title(&self) -> &str { &self.title }
    pub fn price(&self) -> Money { self.price }
    pub fn stock(&self) -> Quantity { self.stock }
    pub fn is_out_of_stock(&self) -> bool { self.stock.is_zero() }
    pub fn can_supply(&self, qty: u32) -> bool { self.stock.covers(qty) }

    pub fn update_price(&mut self, new_price: Money) { self.price = new_price; }

    pub fn add_inventory(&mut self, qty: u32) { self.stock = self.stock.add(qty); }

    pub fn remove_inventory(&mut self, qty: u32) -> Result<(), ProductError> {
        self.stock = self.stock.subtract(qty).ok_or(ProductError::InsufficientStock {
            product_id: self.id,
            title: self.title.clone(),
            available: self.stock.value(),
            requested: qty,
        })?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductError {
    #[error("insufficient stock for {title}: {available} available, {requested} requested")]
    InsufficientStock { product_id: Uuid, title: String, available: u32, requested: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inventory() {
        let mut p = Product::create("Paracetamol 500mg", Money::new(10_000), 10);
        assert!(!p.is_out_of_stock());
        p.remove_inventory(4).unwrap();
        assert_eq!(p.stock().value(), 6);
        p.add_inventory(1);
        assert_eq!(p.stock().value(), 7);
    }

    #[test]
    fn test_remove_inventory_rejects_shortfall() {
        let mut p = Product::create("Vitamin C", Money::new(5_000), 1);
        let err = p.remove_inventory(2).unwrap_err();
        assert!(matches!(err, ProductError::InsufficientStock { available: 1, requested: 2, .. }));
        assert_eq!(p.stock().value(), 1);
    }
}
