//! HTTP surface
//!
//! Customer identity arrives as proxy headers (see [`extract`]); the VNPay
//! return and IPN routes are unauthenticated and trust only the signature.

pub mod cart;
pub mod dto;
pub mod error;
pub mod extract;
pub mod orders;
pub mod payments;

use axum::routing::{get, post, put};
use axum::{Json, Router};

use crate::services::{CartService, OrderService, PaymentService};

#[derive(Clone)]
pub struct AppState {
    pub carts: CartService,
    pub orders: OrderService,
    pub payments: PaymentService,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "pharmacy-checkout"})) }))
        .route("/api/v1/cart", get(cart::get_cart).post(cart::create_cart).delete(cart::clear_cart))
        .route("/api/v1/cart/items", post(cart::add_item))
        .route("/api/v1/cart/items/:item_id", put(cart::update_quantity).delete(cart::remove_item))
        .route("/api/v1/cart/items/:item_id/selection", put(cart::set_selection))
        .route("/api/v1/cart/selection", put(cart::select_all))
        .route("/api/v1/cart/checkout", get(cart::checkout_items))
        .route("/api/v1/cart/count", get(cart::item_count))
        .route("/api/v1/orders", get(orders::list_orders).post(orders::create_order))
        .route("/api/v1/orders/mine", get(orders::my_orders))
        .route("/api/v1/orders/stats", get(orders::order_stats))
        .route("/api/v1/orders/:id", get(orders::get_order))
        .route("/api/v1/orders/:id/status", put(orders::change_status))
        .route("/api/v1/orders/:id/payment-status", put(orders::change_payment_status))
        .route("/api/v1/orders/:id/cancel", post(orders::cancel_order))
        .route("/api/v1/payments/vnpay/return", get(payments::vnpay_return))
        .route("/api/v1/payments/vnpay/ipn", get(payments::vnpay_ipn))
        .with_state(state)
}
