//! In-memory store for development and tests.
//!
//! One mutex guards all tables, so every operation is serialized and sees
//! a consistent snapshot, the way a transaction would.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::aggregates::{
    Cart, CartChange, CartCommand, CartItem, CustomerContext, DeliveryProfile, Order, OrderCommand, OrderStatus,
    Product,
};
use crate::domain::checkout::{self, CheckoutRequest};
use crate::domain::value_objects::Money;
use crate::store::{CommerceStore, OrderFilter, OrderStats, OrderUpdate, Page, PageRequest};
use crate::{CommerceError, Result};

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    products: HashMap<Uuid, Product>,
    profiles: HashMap<Uuid, DeliveryProfile>,
    /// Keyed by customer id.
    carts: HashMap<Uuid, CartRow>,
    orders: HashMap<Uuid, Order>,
}

/// A cart as stored: items reference products by id only.
struct CartRow {
    id: Uuid,
    total: Money,
    items: Vec<ItemRow>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

struct ItemRow {
    id: Uuid,
    product_id: Uuid,
    quantity: u32,
    price_at_addition: Money,
    selected: bool,
    created_at: DateTime<Utc>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_product(&self, product: Product) {
        self.state.lock().await.products.insert(product.id(), product);
    }

    pub async fn insert_profile(&self, profile: DeliveryProfile) {
        self.state.lock().await.profiles.insert(profile.id, profile);
    }

    pub async fn product(&self, product_id: Uuid) -> Option<Product> {
        self.state.lock().await.products.get(&product_id).cloned()
    }
}

impl State {
    fn cart(&self, customer_id: Uuid) -> Result<Cart> {
        let row = self.carts.get(&customer_id).ok_or(CommerceError::CartNotFound)?;
        let items = row
            .items
            .iter()
            .map(|item| {
                let product = self
                    .products
                    .get(&item.product_id)
                    .cloned()
                    .ok_or_else(|| CommerceError::Storage(format!("cart item {} has no product", item.id)))?;
                Ok(CartItem {
                    id: item.id,
                    product,
                    quantity: item.quantity,
                    price_at_addition: item.price_at_addition,
                    selected: item.selected,
                    created_at: item.created_at,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Cart::from_parts(row.id, customer_id, row.total, items, row.created_at, row.updated_at))
    }

    fn save_cart(&mut self, cart: &Cart) {
        let items = cart
            .items()
            .iter()
            .map(|item| ItemRow {
                id: item.id,
                product_id: item.product.id(),
                quantity: item.quantity,
                price_at_addition: item.price_at_addition,
                selected: item.selected,
                created_at: item.created_at,
            })
            .collect();
        self.carts.insert(
            cart.customer_id(),
            CartRow { id: cart.id(), total: cart.total(), items, created_at: cart.created_at(), updated_at: cart.updated_at() },
        );
    }

    fn save_order(&mut self, order: &Order) {
        let mut stored = order.clone();
        stored.take_events();
        self.orders.insert(stored.id(), stored);
    }

    fn newest_first(&self) -> Vec<&Order> {
        let mut orders: Vec<&Order> = self.orders.values().collect();
        orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()).then_with(|| b.id().cmp(&a.id())));
        orders
    }
}

#[async_trait]
impl CommerceStore for MemoryStore {
    async fn create_cart(&self, customer_id: Uuid) -> Result<Cart> {
        let mut state = self.state.lock().await;
        if state.carts.contains_key(&customer_id) {
            return Err(CommerceError::CartAlreadyExists);
        }
        let cart = Cart::new(customer_id);
        state.save_cart(&cart);
        Ok(cart)
    }

    async fn load_cart(&self, customer_id: Uuid) -> Result<Cart> {
        self.state.lock().await.cart(customer_id)
    }

    async fn apply_cart_command(&self, customer_id: Uuid, command: &CartCommand) -> Result<(Cart, CartChange)> {
        let mut state = self.state.lock().await;
        let mut cart = state.cart(customer_id)?;
        let product = match command {
            CartCommand::AddItem { product_id, .. } => state.products.get(product_id).cloned(),
            _ => None,
        };
        let change = cart.apply(command, product)?;
        state.save_cart(&cart);
        Ok((cart, change))
    }

    async fn place_order(&self, customer: &CustomerContext, request: &CheckoutRequest) -> Result<Order> {
        let mut state = self.state.lock().await;
        let mut cart = state.cart(customer.user_id)?;
        let profile = state
            .profiles
            .get(&request.delivery_profile_id)
            .cloned()
            .ok_or(CommerceError::ProfileNotFound(request.delivery_profile_id))?;

        let placement = checkout::place_order(&mut cart, customer, &profile, request)?;

        // Stage every decrement before touching the table.
        let mut staged = Vec::with_capacity(placement.stock_taken.len());
        for (product_id, quantity) in &placement.stock_taken {
            let mut product = state
                .products
                .get(product_id)
                .cloned()
                .ok_or_else(|| CommerceError::Storage(format!("product {product_id} vanished")))?;
            product.remove_inventory(*quantity)?;
            staged.push(product);
        }
        for product in staged {
            state.products.insert(product.id(), product);
        }
        state.save_cart(&cart);
        state.save_order(&placement.order);
        Ok(placement.order)
    }

    async fn find_order(&self, order_id: Uuid) -> Result<Order> {
        let state = self.state.lock().await;
        state.orders.get(&order_id).cloned().ok_or_else(|| CommerceError::OrderNotFound(order_id.to_string()))
    }

    async fn update_order(&self, order_id: Uuid, command: OrderCommand) -> Result<OrderUpdate> {
        let mut state = self.state.lock().await;
        let mut order =
            state.orders.get(&order_id).cloned().ok_or_else(|| CommerceError::OrderNotFound(order_id.to_string()))?;
        let transition = order.apply(command)?;
        if transition.restock {
            for (product_id, quantity) in order.stock_lines() {
                if let Some(product) = state.products.get_mut(&product_id) {
                    product.add_inventory(quantity);
                }
            }
        }
        if transition.changed {
            state.save_order(&order);
        }
        Ok(OrderUpdate { order, transition })
    }

    async fn list_orders(&self, filter: &OrderFilter, page: PageRequest) -> Result<Page<Order>> {
        let state = self.state.lock().await;
        let matching: Vec<&Order> = state.newest_first().into_iter().filter(|o| filter.matches(o)).collect();
        let total = matching.len() as u64;
        let content = matching
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(page.per_page() as usize)
            .cloned()
            .collect();
        Ok(Page::new(content, total, page))
    }

    async fn order_stats(&self, newest: usize) -> Result<OrderStats> {
        let state = self.state.lock().await;
        let revenue = state
            .orders
            .values()
            .filter(|o| o.status() == OrderStatus::Delivered)
            .map(|o| o.total())
            .sum();
        let newest = state.newest_first().into_iter().take(newest).cloned().collect();
        Ok(OrderStats { total_orders: state.orders.len() as u64, revenue, newest })
    }
}
