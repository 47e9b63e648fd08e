//! Domain events
use serde::Serialize;
use uuid::Uuid;
use crate::domain::aggregates::order::{OrderStatus, PaymentMethod, PaymentStatus};
use crate::domain::value_objects::Money;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "aggregate", content = "event")]
pub enum DomainEvent {
    Order(OrderEvent),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum OrderEvent {
    Placed { order_id: Uuid, customer_id: Uuid, total: Money, payment_method: PaymentMethod },
    StatusChanged { order_id: Uuid, from: OrderStatus, to: OrderStatus },
    PaymentStatusChanged { order_id: Uuid, from: PaymentStatus, to: PaymentStatus },
    PaymentCompleted { order_id: Uuid, amount: Money },
    PaymentFailed { order_id: Uuid, response_code: String },
    Cancelled { order_id: Uuid },
    Restocked { order_id: Uuid, lines: Vec<(Uuid, u32)> },
}

impl DomainEvent {
    /// Subject suffix used when the event leaves the process.
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::Order(e) => match e {
                OrderEvent::Placed { .. } => "orders.placed",
                OrderEvent::StatusChanged { .. } => "orders.status_changed",
                OrderEvent::PaymentStatusChanged { .. } => "orders.payment_status_changed",
                OrderEvent::PaymentCompleted { .. } => "orders.payment_completed",
                OrderEvent::PaymentFailed { .. } => "orders.payment_failed",
                OrderEvent::Cancelled { .. } => "orders.cancelled",
                OrderEvent::Restocked { .. } => "orders.restocked",
            },
        }
    }
}
