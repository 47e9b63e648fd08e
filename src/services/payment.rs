//! Gateway callback reconciliation.
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::domain::aggregates::{Order, OrderCommand};
use crate::messaging::EventPublisher;
use crate::notification::OrderNotifier;
use crate::payment::{IpnReply, VnPayGateway};
use crate::services::confirm;
use crate::store::CommerceStore;
use crate::{CommerceError, OrderError, Result};

#[derive(Debug)]
pub struct CallbackOutcome {
    pub order: Order,
    pub approved: bool,
    /// False when the order had already been resolved by an earlier callback.
    pub applied: bool,
    pub warning: Option<String>,
}

impl CallbackOutcome {
    pub fn ipn_reply(&self) -> IpnReply {
        if self.applied { IpnReply::confirmed() } else { IpnReply::already_confirmed() }
    }
}

#[derive(Clone)]
pub struct PaymentService {
    store: Arc<dyn CommerceStore>,
    gateway: Arc<VnPayGateway>,
    notifier: OrderNotifier,
    events: EventPublisher,
}

impl PaymentService {
    pub fn new(
        store: Arc<dyn CommerceStore>, gateway: Arc<VnPayGateway>, notifier: OrderNotifier, events: EventPublisher,
    ) -> Self {
        Self { store, gateway, notifier, events }
    }

    /// Verifies a gateway callback and applies it to its order at most once.
    /// Serves both the browser return and the server-to-server IPN.
    #[instrument(skip_all, fields(order_ref = params.get("vnp_TxnRef").map(String::as_str).unwrap_or("")))]
    pub async fn handle_callback(&self, params: &HashMap<String, String>) -> Result<CallbackOutcome> {
        let callback = match self.gateway.verify(params) {
            Ok(callback) => callback,
            Err(CommerceError::InvalidSignature) => {
                warn!("rejected gateway callback with invalid signature, possible tampering");
                return Err(CommerceError::InvalidSignature);
            }
            Err(e) => return Err(e),
        };

        let order_id = callback.order_id()?;
        let command = OrderCommand::ApplyGatewayResult {
            approved: callback.approved(),
            amount_minor: callback.amount_minor,
            response_code: callback.response_code.clone(),
        };
        let mut update = match self.store.update_order(order_id, command).await {
            Ok(update) => update,
            Err(e @ CommerceError::Order(OrderError::AmountMismatch { .. })) => {
                warn!(%order_id, error = %e, "signed callback with wrong amount");
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let applied = update.transition.changed;
        self.events.publish_all(update.order.take_events()).await;
        info!(
            %order_id,
            response_code = %callback.response_code,
            transaction_no = callback.transaction_no.as_deref().unwrap_or(""),
            applied,
            payment_status = %update.order.payment_status(),
            "gateway callback processed"
        );

        let warning = if applied && callback.approved() { confirm(&self.notifier, &update.order).await } else { None };
        Ok(CallbackOutcome { order: update.order, approved: callback.approved(), applied, warning })
    }
}
