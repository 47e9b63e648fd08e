//! Request bodies and response views.
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::{Cart, CartItem, Order, OrderDetail, OrderStatus, PaymentMethod, PaymentStatus};
use crate::domain::checkout::CheckoutRequest;
use crate::domain::pricing::PriceChangeType;
use crate::domain::value_objects::{ContactSnapshot, Money};
use crate::store::{OrderFilter, OrderStats, PageRequest};
use crate::Result;

/// Envelope shared by every successful response.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: u16,
    pub message: String,
    pub data: T,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn new(status: u16, message: impl Into<String>, data: T) -> Self {
        Self { status, message: message.into(), data, timestamp: Utc::now() }
    }

    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self::new(200, message, data)
    }
}

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub product_id: Uuid,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct QuantityRequest {
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct SelectionRequest {
    pub selected: bool,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub delivery_profile_id: Uuid,
    #[validate(length(max = 500))]
    pub note: Option<String>,
    #[validate(length(min = 1))]
    pub payment_method: String,
}

impl CreateOrderRequest {
    pub fn into_checkout(self) -> Result<CheckoutRequest> {
        Ok(CheckoutRequest {
            delivery_profile_id: self.delivery_profile_id,
            note: self.note,
            payment_method: self.payment_method.parse::<PaymentMethod>()?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusRequest {
    pub payment_status: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MyOrdersQuery {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl MyOrdersQuery {
    pub fn status(&self) -> Result<Option<OrderStatus>> {
        Ok(non_blank(&self.status).map(str::parse::<OrderStatus>).transpose()?)
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OrderListQuery {
    pub order_id: Option<Uuid>,
    pub status: Option<String>,
    pub payment_status: Option<String>,
    #[validate(length(max = 20))]
    pub customer_phone: Option<String>,
    /// Inclusive, `yyyy-MM-dd`.
    pub from_date: Option<NaiveDate>,
    /// Inclusive, `yyyy-MM-dd`.
    pub to_date: Option<NaiveDate>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl OrderListQuery {
    pub fn filter(&self) -> Result<OrderFilter> {
        Ok(OrderFilter {
            customer_id: None,
            order_id: self.order_id,
            status: non_blank(&self.status).map(str::parse::<OrderStatus>).transpose()?,
            payment_status: non_blank(&self.payment_status).map(str::parse::<PaymentStatus>).transpose()?,
            customer_phone: non_blank(&self.customer_phone).map(str::to_string),
            from: self.from_date.and_then(|d| d.and_hms_opt(0, 0, 0)).map(|d| d.and_utc()),
            to: self.to_date.and_then(|d| d.and_hms_milli_opt(23, 59, 59, 999)).map(|d| d.and_utc()),
        })
    }

    pub fn page(&self) -> PageRequest {
        PageRequest::new(self.page, self.per_page)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

// =============================================================================
// Views
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub id: Uuid,
    pub total_price: Money,
    pub total_items: u64,
    pub items: Vec<CartItemView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_title: String,
    pub quantity: u32,
    pub price_at_addition: Money,
    pub current_price: Money,
    pub selected: bool,
    pub is_out_of_stock: bool,
    pub price_difference: Money,
    pub price_change_type: PriceChangeType,
    pub line_total: Money,
    pub created_at: DateTime<Utc>,
}

impl From<&CartItem> for CartItemView {
    fn from(item: &CartItem) -> Self {
        let change = item.price_change();
        Self {
            id: item.id,
            product_id: item.product.id(),
            product_title: item.product.title().to_string(),
            quantity: item.quantity,
            price_at_addition: item.price_at_addition,
            current_price: item.product.price(),
            selected: item.selected,
            is_out_of_stock: item.is_out_of_stock(),
            price_difference: change.difference,
            price_change_type: change.kind,
            line_total: item.line_total(),
            created_at: item.created_at,
        }
    }
}

impl From<&Cart> for CartView {
    /// Items are listed newest first.
    fn from(cart: &Cart) -> Self {
        Self {
            id: cart.id(),
            total_price: cart.total(),
            total_items: cart.item_count(),
            items: cart.items().iter().rev().map(CartItemView::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub contact: ContactSnapshot,
    pub note: Option<String>,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub total_price: Money,
    pub details: Vec<OrderDetailView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetailView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_title: String,
    pub quantity: u32,
    pub price_at_order: Money,
    pub line_total: Money,
}

impl From<&OrderDetail> for OrderDetailView {
    fn from(d: &OrderDetail) -> Self {
        Self {
            id: d.id,
            product_id: d.product_id,
            product_title: d.product_title.clone(),
            quantity: d.quantity,
            price_at_order: d.price_at_order,
            line_total: d.line_total(),
        }
    }
}

impl From<&Order> for OrderView {
    fn from(o: &Order) -> Self {
        Self {
            id: o.id(),
            customer_id: o.customer_id(),
            contact: o.contact().clone(),
            note: o.note().map(str::to_string),
            payment_method: o.payment_method(),
            status: o.status(),
            payment_status: o.payment_status(),
            total_price: o.total(),
            details: o.details().iter().map(OrderDetailView::from).collect(),
            created_at: o.created_at(),
            updated_at: o.updated_at(),
        }
    }
}

/// Checkout result. Exactly one of `order` and `paymentUrl` is set.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutView {
    pub order_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsView {
    pub total_orders: u64,
    pub revenue: Money,
    pub newest_orders: Vec<OrderView>,
}

impl From<&OrderStats> for StatsView {
    fn from(stats: &OrderStats) -> Self {
        Self {
            total_orders: stats.total_orders,
            revenue: stats.revenue,
            newest_orders: stats.newest.iter().map(OrderView::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResultView {
    pub order_id: Uuid,
    pub approved: bool,
    pub payment_status: PaymentStatus,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}
