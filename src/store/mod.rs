//! Persistence for carts, orders and the stock counter.
//!
//! Every method that changes state runs as one transaction: the backend
//! locks what it reads, hands the loaded aggregate to the domain, and writes
//! the result back before releasing the lock.
//!
//! Implementations:
//! - [`PostgresStore`]: row locks inside sqlx transactions
//! - [`MemoryStore`]: a single async mutex, for development and tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::{
    Cart, CartChange, CartCommand, CustomerContext, Order, OrderCommand, OrderStatus, PaymentStatus, Transition,
};
use crate::domain::checkout::CheckoutRequest;
use crate::domain::value_objects::Money;
use crate::Result;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

#[async_trait]
pub trait CommerceStore: Send + Sync {
    /// Create the single cart for a newly registered customer.
    async fn create_cart(&self, customer_id: Uuid) -> Result<Cart>;

    async fn load_cart(&self, customer_id: Uuid) -> Result<Cart>;

    /// Apply one cart command under the cart lock.
    async fn apply_cart_command(&self, customer_id: Uuid, command: &CartCommand) -> Result<(Cart, CartChange)>;

    /// Check stock, create the order, take stock and consume cart items in
    /// one transaction. Either all of it happens or none of it does.
    async fn place_order(&self, customer: &CustomerContext, request: &CheckoutRequest) -> Result<Order>;

    async fn find_order(&self, order_id: Uuid) -> Result<Order>;

    /// Apply one command under the order row lock, restocking in the same
    /// transaction when the command cancels the order.
    async fn update_order(&self, order_id: Uuid, command: OrderCommand) -> Result<OrderUpdate>;

    async fn list_orders(&self, filter: &OrderFilter, page: PageRequest) -> Result<Page<Order>>;

    async fn order_stats(&self, newest: usize) -> Result<OrderStats>;
}

#[derive(Debug)]
pub struct OrderUpdate {
    pub order: Order,
    pub transition: Transition,
}

#[derive(Clone, Debug, Default)]
pub struct OrderFilter {
    pub customer_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    /// Case-insensitive substring of the contact phone.
    pub customer_phone: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl OrderFilter {
    pub fn for_customer(customer_id: Uuid, status: Option<OrderStatus>) -> Self {
        Self { customer_id: Some(customer_id), status, ..Self::default() }
    }

    pub fn matches(&self, order: &Order) -> bool {
        self.customer_id.map_or(true, |id| order.customer_id() == id)
            && self.order_id.map_or(true, |id| order.id() == id)
            && self.status.map_or(true, |s| order.status() == s)
            && self.payment_status.map_or(true, |s| order.payment_status() == s)
            && self.customer_phone.as_deref().filter(|p| !p.is_empty()).map_or(true, |p| {
                order.contact().phone.to_lowercase().contains(&p.to_lowercase())
            })
            && self.from.map_or(true, |from| order.created_at() >= from)
            && self.to.map_or(true, |to| order.created_at() <= to)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    per_page: u32,
}

impl PageRequest {
    pub const DEFAULT_PER_PAGE: u32 = 10;
    pub const MAX_PER_PAGE: u32 = 100;

    /// One-based page; out-of-range values fall back to the defaults.
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        let page = page.filter(|p| *p > 0).unwrap_or(1);
        let per_page = per_page.filter(|p| *p > 0).unwrap_or(Self::DEFAULT_PER_PAGE).min(Self::MAX_PER_PAGE);
        Self { page, per_page }
    }

    pub fn page(&self) -> u32 { self.page }
    pub fn per_page(&self) -> u32 { self.per_page }
    pub fn offset(&self) -> u64 { u64::from(self.page - 1) * u64::from(self.per_page) }
}

impl Default for PageRequest {
    fn default() -> Self { Self::new(None, None) }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub current_page: u32,
    pub per_page: u32,
    pub total_elements: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_previous: bool,
    pub content: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, total_elements: u64, request: PageRequest) -> Self {
        let per_page = u64::from(request.per_page());
        let total_pages = total_elements.div_ceil(per_page);
        Self {
            current_page: request.page(),
            per_page: request.per_page(),
            total_elements,
            total_pages,
            has_next: u64::from(request.page()) < total_pages,
            has_previous: request.page() > 1,
            content,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            current_page: self.current_page,
            per_page: self.per_page,
            total_elements: self.total_elements,
            total_pages: self.total_pages,
            has_next: self.has_next,
            has_previous: self.has_previous,
            content: self.content.into_iter().map(f).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrderStats {
    pub total_orders: u64,
    /// Sum of totals over delivered orders.
    pub revenue: Money,
    pub newest: Vec<Order>,
}
