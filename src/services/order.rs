//! Order service: checkout plus the order lifecycle.
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::aggregates::{CustomerContext, Order, OrderCommand, OrderStatus, PaymentStatus};
use crate::domain::checkout::CheckoutRequest;
use crate::messaging::EventPublisher;
use crate::notification::OrderNotifier;
use crate::payment::VnPayGateway;
use crate::services::{confirm, require_owner_or_staff, require_staff, NEWEST_ORDERS};
use crate::store::{CommerceStore, OrderFilter, OrderStats, Page, PageRequest};
use crate::Result;

/// What the customer gets back from checkout.
#[derive(Debug)]
pub enum CheckoutOutcome {
    /// Offline order, finished. `warning` is set when the confirmation mail failed.
    Placed { order: Order, warning: Option<String> },
    /// Online order awaiting payment at the gateway.
    Redirect { order: Order, payment_url: String },
}

impl CheckoutOutcome {
    pub fn order(&self) -> &Order {
        match self {
            CheckoutOutcome::Placed { order, .. } | CheckoutOutcome::Redirect { order, .. } => order,
        }
    }
}

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn CommerceStore>,
    gateway: Arc<VnPayGateway>,
    notifier: OrderNotifier,
    events: EventPublisher,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub restocked: bool,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn CommerceStore>, gateway: Arc<VnPayGateway>, notifier: OrderNotifier, events: EventPublisher,
    ) -> Self {
        Self { store, gateway, notifier, events }
    }

    /// Turns the caller's selected cart items into an order. Stock, order and
    /// cart are committed together before any mail or redirect is produced.
    #[instrument(skip(self, customer, request), fields(customer_id = %customer.user_id, method = %request.payment_method))]
    pub async fn create_order(
        &self, customer: &CustomerContext, request: &CheckoutRequest, client_ip: &str,
    ) -> Result<CheckoutOutcome> {
        let mut order = self.store.place_order(customer, request).await?;
        info!(order_id = %order.id(), total = %order.total(), lines = order.details().len(), "order placed");
        self.events.publish_all(order.take_events()).await;

        if order.payment_method().is_gateway() {
            let payment_url = self.gateway.build_redirect_url(&order, client_ip, Utc::now())?;
            return Ok(CheckoutOutcome::Redirect { order, payment_url });
        }
        let warning = confirm(&self.notifier, &order).await;
        Ok(CheckoutOutcome::Placed { order, warning })
    }

    pub async fn my_orders(
        &self, customer: &CustomerContext, status: Option<OrderStatus>, page: PageRequest,
    ) -> Result<Page<Order>> {
        self.store.list_orders(&OrderFilter::for_customer(customer.user_id, status), page).await
    }

    pub async fn list_orders(&self, caller: &CustomerContext, filter: &OrderFilter, page: PageRequest) -> Result<Page<Order>> {
        require_staff(caller)?;
        self.store.list_orders(filter, page).await
    }

    pub async fn order_detail(&self, caller: &CustomerContext, order_id: Uuid) -> Result<Order> {
        let order = self.store.find_order(order_id).await?;
        require_owner_or_staff(caller, &order)?;
        Ok(order)
    }

    #[instrument(skip(self, caller), fields(staff_id = %caller.user_id))]
    pub async fn change_status(&self, caller: &CustomerContext, order_id: Uuid, status: OrderStatus) -> Result<StatusChange> {
        require_staff(caller)?;
        self.update(order_id, OrderCommand::ChangeStatus(status)).await
    }

    #[instrument(skip(self, caller), fields(staff_id = %caller.user_id))]
    pub async fn change_payment_status(
        &self, caller: &CustomerContext, order_id: Uuid, status: PaymentStatus,
    ) -> Result<StatusChange> {
        require_staff(caller)?;
        self.update(order_id, OrderCommand::ChangePaymentStatus(status)).await
    }

    /// Customer cancellation. Only PENDING orders can be cancelled; their
    /// stock goes back on the shelf.
    #[instrument(skip(self, caller), fields(customer_id = %caller.user_id))]
    pub async fn cancel_order(&self, caller: &CustomerContext, order_id: Uuid) -> Result<StatusChange> {
        let order = self.store.find_order(order_id).await?;
        require_owner_or_staff(caller, &order)?;
        self.update(order_id, OrderCommand::Cancel).await
    }

    pub async fn order_stats(&self, caller: &CustomerContext) -> Result<OrderStats> {
        require_staff(caller)?;
        self.store.order_stats(NEWEST_ORDERS).await
    }

    async fn update(&self, order_id: Uuid, command: OrderCommand) -> Result<StatusChange> {
        let mut update = self.store.update_order(order_id, command).await?;
        let order = &mut update.order;
        info!(
            status = %order.status(),
            payment_status = %order.payment_status(),
            restocked = update.transition.restock,
            "order updated"
        );
        self.events.publish_all(order.take_events()).await;
        Ok(StatusChange {
            order_id,
            status: order.status(),
            payment_status: order.payment_status(),
            restocked: update.transition.restock,
        })
    }
}
