//! Order Aggregate
//!
//! Everything on an order is frozen at checkout except `status` and
//! `payment_status`, which move only through [`Order::apply`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::pricing;
use crate::domain::value_objects::{ContactSnapshot, Money};

#[derive(Clone, Debug)]
pub struct Order {
    id: Uuid,
    customer_id: Uuid,
    customer_email: String,
    contact: ContactSnapshot,
    note: Option<String>,
    payment_method: PaymentMethod,
    status: OrderStatus,
    payment_status: PaymentStatus,
    total: Money,
    details: Vec<OrderDetail>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    events: Vec<DomainEvent>,
}

/// Immutable order line with the unit price frozen at checkout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_title: String,
    pub quantity: u32,
    pub price_at_order: Money,
}

impl OrderDetail {
    pub fn line_total(&self) -> Money { pricing::line_total(self.price_at_order, self.quantity) }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus { #[default] Pending, Shipping, Delivered, Cancelled, Completed }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus { #[default] Pending, Completed, Failed }

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentMethod {
    /// Cash on delivery.
    Offline,
    /// Redirect to the VNPay gateway.
    VnPay,
}

impl PaymentMethod {
    pub fn is_gateway(&self) -> bool { matches!(self, PaymentMethod::VnPay) }
}

macro_rules! string_enum {
    ($ty:ident, $field:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self { $($ty::$variant => $text),+ }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
        }

        impl FromStr for $ty {
            type Err = OrderError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_uppercase().as_str() {
                    $($text => Ok($ty::$variant),)+
                    _ => Err(OrderError::UnknownValue { field: $field, value: s.to_string() }),
                }
            }
        }
    };
}

string_enum!(OrderStatus, "status", {
    Pending => "PENDING", Shipping => "SHIPPING", Delivered => "DELIVERED",
    Cancelled => "CANCELLED", Completed => "COMPLETED",
});
string_enum!(PaymentStatus, "paymentStatus", { Pending => "PENDING", Completed => "COMPLETED", Failed => "FAILED" });
string_enum!(PaymentMethod, "paymentMethod", { Offline => "OFFLINE", VnPay => "VNPAY" });

impl OrderStatus {
    /// Staff-driven lifecycle moves.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Shipping) | (Pending, Cancelled) | (Shipping, Delivered) | (Delivered, Completed)
        )
    }
}

impl PaymentStatus {
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!((self, next), (Pending, Completed) | (Pending, Failed) | (Failed, Completed))
    }
}

/// A state change requested against a stored order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrderCommand {
    ChangeStatus(OrderStatus),
    ChangePaymentStatus(PaymentStatus),
    Cancel,
    /// Verified gateway callback. `amount_minor` is the gateway's amount (×100).
    ApplyGatewayResult { approved: bool, amount_minor: i64, response_code: String },
}

/// What [`Order::apply`] did. `restock` asks the store to put every line's
/// quantity back on the shelf in the same transaction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Transition {
    pub changed: bool,
    pub restock: bool,
}

impl Order {
    /// Opens a new order over frozen lines. Callers go through
    /// [`crate::domain::checkout::place_order`].
    pub(crate) fn place(
        customer_id: Uuid, customer_email: impl Into<String>, contact: ContactSnapshot,
        note: Option<String>, payment_method: PaymentMethod, details: Vec<OrderDetail>,
    ) -> Self {
        let id = Uuid::now_v7();
        let now = Utc::now();
        let total = pricing::sum_lines(details.iter().map(|d| (d.price_at_order, d.quantity)));
        let mut order = Self {
            id, customer_id, customer_email: customer_email.into(), contact, note, payment_method,
            status: OrderStatus::Pending, payment_status: PaymentStatus::Pending, total, details,
            created_at: now, updated_at: now, events: vec![],
        };
        order.raise_event(OrderEvent::Placed { order_id: id, customer_id, total, payment_method });
        order
    }

    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: Uuid, customer_id: Uuid, customer_email: String, contact: ContactSnapshot, note: Option<String>,
        payment_method: PaymentMethod, status: OrderStatus, payment_status: PaymentStatus, total: Money,
        details: Vec<OrderDetail>, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id, customer_id, customer_email, contact, note, payment_method, status, payment_status,
            total, details, created_at, updated_at, events: vec![],
        }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn customer_id(&self) -> Uuid { self.customer_id }
    pub fn customer_email(&self) -> &str { &self.customer_email }
    pub fn contact(&self) -> &ContactSnapshot { &self.contact }
    pub fn note(&self) -> Option<&str> { self.note.as_deref() }
    pub fn payment_method(&self) -> PaymentMethod { self.payment_method }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn payment_status(&self) -> PaymentStatus { self.payment_status }
    pub fn total(&self) -> Money { self.total }
    pub fn details(&self) -> &[OrderDetail] { &self.details }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    /// (product, quantity) for every line, used when stock goes back.
    pub fn stock_lines(&self) -> Vec<(Uuid, u32)> {
        self.details.iter().map(|d| (d.product_id, d.quantity)).collect()
    }

    pub fn apply(&mut self, command: OrderCommand) -> Result<Transition, OrderError> {
        match command {
            OrderCommand::ChangeStatus(next) => self.change_status(next),
            OrderCommand::ChangePaymentStatus(next) => self.change_payment_status(next),
            OrderCommand::Cancel => self.cancel(),
            OrderCommand::ApplyGatewayResult { approved, amount_minor, response_code } => {
                self.apply_gateway_result(approved, amount_minor, response_code)
            }
        }
    }

    fn change_status(&mut self, next: OrderStatus) -> Result<Transition, OrderError> {
        if !self.status.can_transition_to(next) {
            return Err(OrderError::InvalidTransition { from: self.status.to_string(), to: next.to_string() });
        }
        if next == OrderStatus::Cancelled {
            return self.cancel();
        }
        let from = self.status;
        self.status = next;
        self.touch();
        self.raise_event(OrderEvent::StatusChanged { order_id: self.id, from, to: next });
        Ok(Transition { changed: true, restock: false })
    }

    fn change_payment_status(&mut self, next: PaymentStatus) -> Result<Transition, OrderError> {
        if !self.payment_status.can_transition_to(next) {
            return Err(OrderError::InvalidTransition { from: self.payment_status.to_string(), to: next.to_string() });
        }
        let from = self.payment_status;
        self.payment_status = next;
        self.touch();
        self.raise_event(OrderEvent::PaymentStatusChanged { order_id: self.id, from, to: next });
        Ok(Transition { changed: true, restock: false })
    }

    fn cancel(&mut self) -> Result<Transition, OrderError> {
        if self.status != OrderStatus::Pending {
            return Err(OrderError::NotCancellable(self.status));
        }
        self.mark_cancelled();
        Ok(Transition { changed: true, restock: true })
    }

    /// Applies a verified gateway outcome once. Replays after the payment
    /// has left PENDING are no-ops.
    fn apply_gateway_result(
        &mut self, approved: bool, amount_minor: i64, response_code: String,
    ) -> Result<Transition, OrderError> {
        if !self.payment_method.is_gateway() {
            return Err(OrderError::NotGatewayOrder(self.payment_method));
        }
        if amount_minor != self.total.minor_units() {
            return Err(OrderError::AmountMismatch { expected: self.total.minor_units(), received: amount_minor });
        }
        if self.payment_status != PaymentStatus::Pending {
            return Ok(Transition::default());
        }
        if approved {
            self.payment_status = PaymentStatus::Completed;
            self.touch();
            self.raise_event(OrderEvent::PaymentCompleted { order_id: self.id, amount: self.total });
            return Ok(Transition { changed: true, restock: false });
        }
        self.payment_status = PaymentStatus::Failed;
        self.touch();
        self.raise_event(OrderEvent::PaymentFailed { order_id: self.id, response_code });
        // Stock returns only while the order is PENDING. A shipped order keeps
        // its status; staff settle the payment with ChangePaymentStatus.
        let restock = self.status == OrderStatus::Pending;
        if restock {
            self.mark_cancelled();
        }
        Ok(Transition { changed: true, restock })
    }

    fn mark_cancelled(&mut self) {
        self.status = OrderStatus::Cancelled;
        self.touch();
        self.raise_event(OrderEvent::Cancelled { order_id: self.id });
        self.raise_event(OrderEvent::Restocked { order_id: self.id, lines: self.stock_lines() });
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: OrderEvent) { self.events.push(DomainEvent::Order(e)); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("invalid {field}: {value}")]
    UnknownValue { field: &'static str, value: String },
    #[error("cannot move from {from} to {to}")]
    InvalidTransition { from: String, to: String },
    #[error("only pending orders can be cancelled, order is {0}")]
    NotCancellable(OrderStatus),
    #[error("order is paid {0}, not through the gateway")]
    NotGatewayOrder(PaymentMethod),
    #[error("gateway amount {received} does not match order amount {expected}")]
    AmountMismatch { expected: i64, received: i64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(method: PaymentMethod) -> Order {
        let details = vec![OrderDetail {
            id: Uuid::new_v4(), product_id: Uuid::new_v4(), product_title: "Widget".into(),
            quantity: 2, price_at_order: Money::new(10_000),
        }];
        Order::place(Uuid::new_v4(), "test@example.com", ContactSnapshot::default(), None, method, details)
    }

    #[test]
    fn test_order_workflow() {
        let mut order = order(PaymentMethod::Offline);
        assert_eq!(order.total(), Money::new(20_000));
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.payment_status(), PaymentStatus::Pending);
        order.apply(OrderCommand::ChangeStatus(OrderStatus::Shipping)).unwrap();
        order.apply(OrderCommand::ChangeStatus(OrderStatus::Delivered)).unwrap();
        order.apply(OrderCommand::ChangeStatus(OrderStatus::Completed)).unwrap();
        assert_eq!(order.status(), OrderStatus::Completed);
        assert_eq!(order.take_events().len(), 4);
    }

    #[test]
    fn test_illegal_status_moves_are_rejected() {
        let mut order = order(PaymentMethod::Offline);
        assert!(matches!(
            order.apply(OrderCommand::ChangeStatus(OrderStatus::Delivered)),
            Err(OrderError::InvalidTransition { .. })
        ));
        order.apply(OrderCommand::ChangeStatus(OrderStatus::Shipping)).unwrap();
        assert_eq!(order.apply(OrderCommand::Cancel), Err(OrderError::NotCancellable(OrderStatus::Shipping)));
        assert!(order.apply(OrderCommand::ChangeStatus(OrderStatus::Cancelled)).is_err());
    }

    #[test]
    fn test_cancel_requests_restock() {
        let mut order = order(PaymentMethod::Offline);
        let t = order.apply(OrderCommand::Cancel).unwrap();
        assert_eq!(t, Transition { changed: true, restock: true });
        assert_eq!(order.status(), OrderStatus::Cancelled);
        let t = order.apply(OrderCommand::ChangeStatus(OrderStatus::Pending));
        assert!(t.is_err());
    }

    #[test]
    fn test_staff_cancel_through_status_change_restocks() {
        let mut order = order(PaymentMethod::Offline);
        let t = order.apply(OrderCommand::ChangeStatus(OrderStatus::Cancelled)).unwrap();
        assert!(t.restock);
    }

    #[test]
    fn test_gateway_result_is_applied_once() {
        let mut order = order(PaymentMethod::VnPay);
        let approve = OrderCommand::ApplyGatewayResult { approved: true, amount_minor: 2_000_000, response_code: "00".into() };
        assert_eq!(order.apply(approve.clone()).unwrap(), Transition { changed: true, restock: false });
        assert_eq!(order.payment_status(), PaymentStatus::Completed);
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.apply(approve).unwrap(), Transition::default());
        let late_failure = OrderCommand::ApplyGatewayResult { approved: false, amount_minor: 2_000_000, response_code: "24".into() };
        assert_eq!(order.apply(late_failure).unwrap(), Transition::default());
        assert_eq!(order.payment_status(), PaymentStatus::Completed);
    }

    #[test]
    fn test_gateway_failure_cancels_and_restocks() {
        let mut order = order(PaymentMethod::VnPay);
        let fail = OrderCommand::ApplyGatewayResult { approved: false, amount_minor: 2_000_000, response_code: "24".into() };
        assert_eq!(order.apply(fail).unwrap(), Transition { changed: true, restock: true });
        assert_eq!(order.payment_status(), PaymentStatus::Failed);
        assert_eq!(order.status(), OrderStatus::Cancelled);
    }

    #[test]
    fn test_gateway_failure_after_shipping_keeps_status() {
        let mut order = order(PaymentMethod::VnPay);
        order.apply(OrderCommand::ChangeStatus(OrderStatus::Shipping)).unwrap();
        let fail = OrderCommand::ApplyGatewayResult { approved: false, amount_minor: 2_000_000, response_code: "24".into() };
        assert_eq!(order.apply(fail).unwrap(), Transition { changed: true, restock: false });
        assert_eq!(order.payment_status(), PaymentStatus::Failed);
        assert_eq!(order.status(), OrderStatus::Shipping);
        order.apply(OrderCommand::ChangePaymentStatus(PaymentStatus::Completed)).unwrap();
        assert_eq!(order.payment_status(), PaymentStatus::Completed);
    }

    #[test]
    fn test_gateway_result_checks_amount_and_method() {
        let mut online = order(PaymentMethod::VnPay);
        let wrong = OrderCommand::ApplyGatewayResult { approved: true, amount_minor: 100, response_code: "00".into() };
        assert!(matches!(online.apply(wrong), Err(OrderError::AmountMismatch { .. })));
        assert_eq!(online.payment_status(), PaymentStatus::Pending);

        let mut offline = order(PaymentMethod::Offline);
        let ok = OrderCommand::ApplyGatewayResult { approved: true, amount_minor: 2_000_000, response_code: "00".into() };
        assert_eq!(offline.apply(ok), Err(OrderError::NotGatewayOrder(PaymentMethod::Offline)));
    }

    #[test]
    fn test_enum_parsing_is_validating() {
        assert_eq!("shipping".parse::<OrderStatus>().unwrap(), OrderStatus::Shipping);
        assert_eq!(" vnpay ".parse::<PaymentMethod>().unwrap(), PaymentMethod::VnPay);
        assert_eq!("FAILED".parse::<PaymentStatus>().unwrap(), PaymentStatus::Failed);
        assert!(matches!("momo".parse::<PaymentMethod>(), Err(OrderError::UnknownValue { field: "paymentMethod", .. })));
    }

    #[test]
    fn test_payment_status_table() {
        let mut order = order(PaymentMethod::Offline);
        order.apply(OrderCommand::ChangePaymentStatus(PaymentStatus::Failed)).unwrap();
        order.apply(OrderCommand::ChangePaymentStatus(PaymentStatus::Completed)).unwrap();
        assert!(order.apply(OrderCommand::ChangePaymentStatus(PaymentStatus::Pending)).is_err());
    }
}
