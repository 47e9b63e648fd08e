//! Turning the selected part of a cart into an order.
//!
//! Pure over data the store has already locked: callers load the cart (with
//! product rows held for update) and the delivery profile inside one
//! transaction, call [`place_order`], and persist the returned [`Placement`]
//! before committing. Nothing is mutated unless every selected line can be
//! supplied.

use uuid::Uuid;
use crate::domain::aggregates::cart::{Cart, CartError};
use crate::domain::aggregates::customer::{CustomerContext, DeliveryProfile};
use crate::domain::aggregates::order::{Order, OrderDetail, PaymentMethod};
use crate::{CommerceError, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub delivery_profile_id: Uuid,
    pub note: Option<String>,
    pub payment_method: PaymentMethod,
}

/// Writes the store must make atomically.
#[derive(Clone, Debug)]
pub struct Placement {
    pub order: Order,
    /// Cart items to delete.
    pub consumed_items: Vec<Uuid>,
    /// (product, quantity) to take off the shelf.
    pub stock_taken: Vec<(Uuid, u32)>,
}

pub fn place_order(
    cart: &mut Cart, customer: &CustomerContext, profile: &DeliveryProfile, request: &CheckoutRequest,
) -> Result<Placement> {
    if !customer.owns(cart.customer_id()) {
        return Err(CommerceError::Forbidden("cart belongs to another customer".into()));
    }
    if !customer.owns(profile.customer_id) {
        return Err(CommerceError::Forbidden("delivery profile belongs to another customer".into()));
    }

    let mut selected = cart.selected_items().peekable();
    if selected.peek().is_none() {
        return Err(CartError::EmptyCheckoutSelection.into());
    }
    if let Some(short) = selected.find(|i| !i.product.can_supply(i.quantity)) {
        return Err(CartError::insufficient(&short.product, short.quantity).into());
    }
    drop(selected);

    let consumed = cart.take_selected();
    let details = consumed
        .iter()
        .map(|item| OrderDetail {
            id: Uuid::now_v7(),
            product_id: item.product.id(),
            product_title: item.product.title().to_string(),
            quantity: item.quantity,
            price_at_order: item.product.price(),
        })
        .collect();
    let order = Order::place(
        customer.user_id,
        customer.email.clone(),
        profile.snapshot(),
        request.note.clone().filter(|n| !n.trim().is_empty()),
        request.payment_method,
        details,
    );

    Ok(Placement {
        order,
        consumed_items: consumed.iter().map(|i| i.id).collect(),
        stock_taken: consumed.iter().map(|i| (i.product.id(), i.quantity)).collect(),
    })
}
