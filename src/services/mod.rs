//! Application services
//!
//! Orchestrate the store, the gateway and the side channels (mail, events)
//! around each customer or staff operation. Business rules stay in the
//! domain; atomicity stays in the store.

pub mod cart;
pub mod order;
pub mod payment;

use tracing::warn;

use crate::domain::aggregates::{CustomerContext, Order};
use crate::notification::OrderNotifier;
use crate::{CommerceError, Result};

pub use cart::CartService;
pub use order::{CheckoutOutcome, OrderService};
pub use payment::{CallbackOutcome, PaymentService};

/// Number of orders shown on the staff dashboard.
pub const NEWEST_ORDERS: usize = 5;

pub(crate) fn require_staff(caller: &CustomerContext) -> Result<()> {
    if caller.is_staff() {
        Ok(())
    } else {
        Err(CommerceError::Forbidden("staff role required".into()))
    }
}

pub(crate) fn require_owner_or_staff(caller: &CustomerContext, order: &Order) -> Result<()> {
    if caller.owns(order.customer_id()) || caller.is_staff() {
        Ok(())
    } else {
        Err(CommerceError::Forbidden("order belongs to another customer".into()))
    }
}

/// Sends the confirmation mail. A failure becomes a warning for the
/// response; it never fails the operation.
pub(crate) async fn confirm(notifier: &OrderNotifier, order: &Order) -> Option<String> {
    match notifier.send_order_confirmation(order).await {
        Ok(()) => None,
        Err(e) => {
            warn!(order_id = %order.id(), error = %e, "order confirmation mail not sent");
            Some(format!("order saved, but the confirmation email could not be sent: {e}"))
        }
    }
}
