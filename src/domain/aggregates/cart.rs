//! Cart Aggregate
//!
//! One cart per customer. Items can be selected for checkout; the running
//! total only counts selected items, priced at the product's current price,
//! and is recomputed by every mutation.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;
use crate::domain::aggregates::product::Product;
use crate::domain::pricing::{self, PriceChange};
use crate::domain::value_objects::Money;

/// Selection state given to an item the first time its product is added.
pub const NEW_ITEMS_SELECTED: bool = false;

#[derive(Clone, Debug)]
pub struct Cart {
    id: Uuid,
    customer_id: Uuid,
    total: Money,
    items: Vec<CartItem>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CartItem {
    pub id: Uuid,
    pub product: Product,
    pub quantity: u32,
    pub price_at_addition: Money,
    pub selected: bool,
    pub created_at: DateTime<Utc>,
}

impl CartItem {
    /// Line value at the product's current price.
    pub fn line_total(&self) -> Money { pricing::line_total(self.product.price(), self.quantity) }
    pub fn is_out_of_stock(&self) -> bool { self.product.is_out_of_stock() }
    pub fn price_change(&self) -> PriceChange { pricing::price_change(self.price_at_addition, self.product.price()) }
}

/// A cart mutation, as requested by the customer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CartCommand {
    AddItem { product_id: Uuid, quantity: i64 },
    UpdateQuantity { item_id: Uuid, quantity: i64 },
    SetSelection { item_id: Uuid, selected: bool },
    SelectAll { selected: bool },
    RemoveItem { item_id: Uuid },
    Clear,
}

/// Which items a command touched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CartChange {
    Item(Uuid),
    Items(Vec<Uuid>),
    Removed(Vec<Uuid>),
}

impl Cart {
    pub fn new(customer_id: Uuid) -> Self {
        let now = Utc::now();
        Self { id: Uuid::now_v7(), customer_id, total: Money::ZERO, items: vec![], created_at: now, updated_at: now }
    }

    /// Rebuilds a cart from storage. `items` must carry product data read in
    /// the same transaction.
    pub fn from_parts(
        id: Uuid, customer_id: Uuid, total: Money, items: Vec<CartItem>,
        created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
    ) -> Self {
        Self { id, customer_id, total, items, created_at, updated_at }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn customer_id(&self) -> Uuid { self.customer_id }
    pub fn total(&self) -> Money { self.total }
    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn item(&self, item_id: Uuid) -> Option<&CartItem> { self.items.iter().find(|i| i.id == item_id) }
    pub fn selected_items(&self) -> impl Iterator<Item = &CartItem> { self.items.iter().filter(|i| i.selected) }

    /// Total number of units across all items, selected or not.
    pub fn item_count(&self) -> u64 { self.items.iter().map(|i| u64::from(i.quantity)).sum() }

    /// The selected total as it would be computed from scratch right now.
    pub fn recomputed_total(&self) -> Money {
        pricing::sum_lines(self.selected_items().map(|i| (i.product.price(), i.quantity)))
    }

    /// Applies a customer command. `product` must be supplied for
    /// [`CartCommand::AddItem`] and is ignored otherwise.
    pub fn apply(&mut self, command: &CartCommand, product: Option<Product>) -> Result<CartChange, CartError> {
        match command {
            CartCommand::AddItem { product_id, quantity } => {
                let product = product
                    .filter(|p| p.id() == *product_id)
                    .ok_or(CartError::ProductNotFound(*product_id))?;
                self.add_item(product, *quantity).map(CartChange::Item)
            }
            CartCommand::UpdateQuantity { item_id, quantity } => {
                self.update_quantity(*item_id, *quantity).map(|_| CartChange::Item(*item_id))
            }
            CartCommand::SetSelection { item_id, selected } => {
                self.set_selection(*item_id, *selected).map(|_| CartChange::Item(*item_id))
            }
            CartCommand::SelectAll { selected } => Ok(CartChange::Items(self.select_all(*selected))),
            CartCommand::RemoveItem { item_id } => {
                self.remove_item(*item_id).map(|item| CartChange::Removed(vec![item.id]))
            }
            CartCommand::Clear => Ok(CartChange::Removed(self.clear().into_iter().map(|i| i.id).collect())),
        }
    }

    /// Adds `quantity` units of `product`. A repeat add merges into the
    /// existing line, caps it at current stock and refreshes the price
    /// snapshot.
    pub fn add_item(&mut self, product: Product, quantity: i64) -> Result<Uuid, CartError> {
        let quantity = positive(quantity)?;
        if !product.can_supply(quantity) {
            return Err(CartError::insufficient(&product, quantity));
        }
        let id = if let Some(existing) = self.items.iter_mut().find(|i| i.product.id() == product.id()) {
            let stock = product.stock().value();
            existing.quantity = existing.quantity.saturating_add(quantity).min(stock);
            existing.price_at_addition = product.price();
            existing.product = product;
            existing.id
        } else {
            let item = CartItem {
                id: Uuid::now_v7(),
                price_at_addition: product.price(),
                product,
                quantity,
                selected: NEW_ITEMS_SELECTED,
                created_at: Utc::now(),
            };
            let id = item.id;
            self.items.push(item);
            id
        };
        self.recalculate();
        Ok(id)
    }

    pub fn update_quantity(&mut self, item_id: Uuid, quantity: i64) -> Result<(), CartError> {
        let quantity = positive(quantity)?;
        let item = self.item_mut(item_id)?;
        if !item.product.can_supply(quantity) {
            return Err(CartError::insufficient(&item.product, quantity));
        }
        item.quantity = quantity;
        self.recalculate();
        Ok(())
    }

    pub fn set_selection(&mut self, item_id: Uuid, selected: bool) -> Result<(), CartError> {
        let item = self.item_mut(item_id)?;
        if selected && item.is_out_of_stock() {
            return Err(CartError::OutOfStock { product_id: item.product.id(), title: item.product.title().to_string() });
        }
        item.selected = selected;
        self.recalculate();
        Ok(())
    }

    /// Sets every item's selection. Out-of-stock items are left unselected
    /// when selecting. Returns the ids whose state changed.
    pub fn select_all(&mut self, selected: bool) -> Vec<Uuid> {
        let changed = self
            .items
            .iter_mut()
            .filter(|i| i.selected != selected && !(selected && i.is_out_of_stock()))
            .map(|i| {
                i.selected = selected;
                i.id
            })
            .collect();
        self.recalculate();
        changed
    }

    pub fn remove_item(&mut self, item_id: Uuid) -> Result<CartItem, CartError> {
        let pos = self.items.iter().position(|i| i.id == item_id).ok_or(CartError::ItemNotFound(item_id))?;
        let removed = self.items.remove(pos);
        self.recalculate();
        Ok(removed)
    }

    pub fn clear(&mut self) -> Vec<CartItem> {
        let removed = std::mem::take(&mut self.items);
        self.recalculate();
        removed
    }

    /// Removes and returns every selected item, leaving the rest in place.
    pub fn take_selected(&mut self) -> Vec<CartItem> {
        let (selected, kept): (Vec<CartItem>, Vec<CartItem>) =
            std::mem::take(&mut self.items).into_iter().partition(|i| i.selected);
        self.items = kept;
        self.recalculate();
        selected
    }

    fn item_mut(&mut self, item_id: Uuid) -> Result<&mut CartItem, CartError> {
        self.items.iter_mut().find(|i| i.id == item_id).ok_or(CartError::ItemNotFound(item_id))
    }

    fn recalculate(&mut self) {
        self.total = self.recomputed_total();
        self.updated_at = Utc::now();
    }
}

fn positive(quantity: i64) -> Result<u32, CartError> {
    if quantity <= 0 {
        return Err(CartError::InvalidQuantity(quantity));
    }
    // Anything past u32 can never be in stock.
    Ok(u32::try_from(quantity).unwrap_or(u32::MAX))
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("quantity must be greater than zero, got {0}")]
    InvalidQuantity(i64),
    #[error("insufficient stock for {title}: {available} available, {requested} requested")]
    InsufficientStock { product_id: Uuid, title: String, available: u32, requested: u32 },
    #[error("{title} is out of stock")]
    OutOfStock { product_id: Uuid, title: String },
    #[error("cart item {0} not found")]
    ItemNotFound(Uuid),
    #[error("product {0} not found")]
    ProductNotFound(Uuid),
    #[error("no cart items are selected for checkout")]
    EmptyCheckoutSelection,
}

impl CartError {
    pub(crate) fn insufficient(product: &Product, requested: u32) -> Self {
        CartError::InsufficientStock {
            product_id: product.id(),
            title: product.title().to_string(),
            available: product.stock().value(),
            requested,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn product(price: i64, stock: u32) -> Product { Product::create("Widget", Money::new(price), stock) }

    #[test]
    fn test_cart_operations() {
        let mut cart = Cart::new(Uuid::new_v4());
        let p = product(10_000, 5);
        let id = cart.add_item(p.clone(), 2).unwrap();
        assert_eq!(cart.items().len(), 1);
        assert!(!cart.items()[0].selected);
        assert_eq!(cart.total(), Money::ZERO);

        cart.set_selection(id, true).unwrap();
        assert_eq!(cart.total(), Money::new(20_000));

        let merged = cart.add_item(p, 1).unwrap();
        assert_eq!(merged, id);
        assert_eq!(cart.items()[0].quantity, 3); // Merged
        assert_eq!(cart.total(), Money::new(30_000));
        assert_eq!(cart.item_count(), 3);
    }

    #[test]
    fn test_merge_caps_at_stock_and_refreshes_snapshot() {
        let mut cart = Cart::new(Uuid::new_v4());
        let mut p = product(10_000, 4);
        cart.add_item(p.clone(), 3).unwrap();
        p.update_price(Money::new(12_000));
        cart.add_item(p, 3).unwrap();
        let item = &cart.items()[0];
        assert_eq!(item.quantity, 4);
        assert_eq!(item.price_at_addition, Money::new(12_000));
    }

    #[test]
    fn test_add_rejects_bad_quantities() {
        let mut cart = Cart::new(Uuid::new_v4());
        assert_eq!(cart.add_item(product(1_000, 5), 0), Err(CartError::InvalidQuantity(0)));
        assert_eq!(cart.add_item(product(1_000, 5), -3), Err(CartError::InvalidQuantity(-3)));
        assert!(matches!(
            cart.add_item(product(1_000, 5), 6),
            Err(CartError::InsufficientStock { available: 5, requested: 6, .. })
        ));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_update_quantity_reprices_at_current_price() {
        let mut cart = Cart::new(Uuid::new_v4());
        let id = cart.add_item(product(10_000, 10), 2).unwrap();
        cart.set_selection(id, true).unwrap();
        cart.items[0].product.update_price(Money::new(11_000));
        cart.update_quantity(id, 5).unwrap();
        assert_eq!(cart.total(), Money::new(55_000));
        assert_eq!(cart.items()[0].price_at_addition, Money::new(10_000));
        assert!(matches!(cart.update_quantity(id, 11), Err(CartError::InsufficientStock { .. })));
        assert_eq!(cart.update_quantity(id, 0), Err(CartError::InvalidQuantity(0)));
        assert_eq!(cart.items()[0].quantity, 5);
    }

    #[test]
    fn test_selecting_out_of_stock_item_fails() {
        let mut cart = Cart::new(Uuid::new_v4());
        let id = cart.add_item(product(10_000, 1), 1).unwrap();
        cart.items[0].product.remove_inventory(1).unwrap();
        assert!(matches!(cart.set_selection(id, true), Err(CartError::OutOfStock { .. })));
        assert!(cart.set_selection(id, false).is_ok());
        assert!(cart.select_all(true).is_empty());
        assert_eq!(cart.total(), Money::ZERO);
    }

    #[test]
    fn test_remove_and_clear_adjust_total() {
        let mut cart = Cart::new(Uuid::new_v4());
        let a = cart.add_item(product(10_000, 10), 1).unwrap();
        let b = cart.add_item(product(3_000, 10), 2).unwrap();
        assert_eq!(cart.select_all(true).len(), 2);
        assert_eq!(cart.total(), Money::new(16_000));
        cart.remove_item(a).unwrap();
        assert_eq!(cart.total(), Money::new(6_000));
        assert_eq!(cart.remove_item(a), Err(CartError::ItemNotFound(a)));
        cart.clear();
        assert!(cart.item(b).is_none());
        assert_eq!(cart.total(), Money::ZERO);
    }

    #[test]
    fn test_take_selected_leaves_unselected_items() {
        let mut cart = Cart::new(Uuid::new_v4());
        let a = cart.add_item(product(10_000, 10), 1).unwrap();
        let b = cart.add_item(product(3_000, 10), 2).unwrap();
        cart.set_selection(a, true).unwrap();
        let taken = cart.take_selected();
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].id, a);
        assert!(cart.item(b).is_some());
        assert_eq!(cart.total(), Money::ZERO);
    }

    #[test]
    fn test_apply_add_requires_matching_product() {
        let mut cart = Cart::new(Uuid::new_v4());
        let p = product(1_000, 3);
        let wrong = Uuid::new_v4();
        let cmd = CartCommand::AddItem { product_id: wrong, quantity: 1 };
        assert_eq!(cart.apply(&cmd, Some(p.clone())), Err(CartError::ProductNotFound(wrong)));
        let cmd = CartCommand::AddItem { product_id: p.id(), quantity: 1 };
        assert!(matches!(cart.apply(&cmd, Some(p)), Ok(CartChange::Item(_))));
    }

    #[derive(Clone, Debug)]
    enum Op { Add(usize, i64), Update(usize, i64), Select(usize, bool), SelectAll(bool), Remove(usize), Clear, Reprice(usize, i64) }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..4usize, -1..6i64).prop_map(|(p, q)| Op::Add(p, q)),
            (0..4usize, -1..6i64).prop_map(|(i, q)| Op::Update(i, q)),
            (0..4usize, any::<bool>()).prop_map(|(i, s)| Op::Select(i, s)),
            any::<bool>().prop_map(Op::SelectAll),
            (0..4usize).prop_map(Op::Remove),
            Just(Op::Clear),
            (0..4usize, 1..50_000i64).prop_map(|(i, p)| Op::Reprice(i, p)),
        ]
    }

    proptest! {
        #[test]
        fn total_matches_selected_lines_after_every_mutation(ops in proptest::collection::vec(op(), 1..40)) {
            let products: Vec<Product> = (0..4).map(|i| product(1_000 * (i + 1), (i as u32) * 2)).collect();
            let mut cart = Cart::new(Uuid::new_v4());
            for op in ops {
                let item_at = |cart: &Cart, i: usize| cart.items().get(i).map(|it| it.id);
                let _ = match op {
                    Op::Add(p, q) => cart.add_item(products[p].clone(), q).map(|_| ()),
                    Op::Update(i, q) => match item_at(&cart, i) { Some(id) => cart.update_quantity(id, q), None => Ok(()) },
                    Op::Select(i, s) => match item_at(&cart, i) { Some(id) => cart.set_selection(id, s), None => Ok(()) },
                    Op::SelectAll(s) => { cart.select_all(s); Ok(()) }
                    Op::Remove(i) => match item_at(&cart, i) { Some(id) => cart.remove_item(id).map(|_| ()), None => Ok(()) },
                    Op::Clear => { cart.clear(); Ok(()) }
                    Op::Reprice(i, price) => {
                        // Price moves outside the cart are only seen by the next mutation.
                        if let Some(item) = cart.items.get_mut(i) { item.product.update_price(Money::new(price)); }
                        cart.recalculate();
                        Ok(())
                    }
                };
                let expected: i64 = cart.items().iter().filter(|i| i.selected)
                    .map(|i| i.product.price().amount() * i64::from(i.quantity)).sum();
                prop_assert_eq!(cart.total(), Money::new(expected));
                prop_assert!(cart.items().iter().all(|i| i.quantity >= 1 && i.quantity <= i.product.stock().value()));
            }
        }
    }
}
