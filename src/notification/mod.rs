//! Order confirmation mail.
//!
//! Sending is best effort: callers log a failure and carry on, the order it
//! describes is already committed.

pub mod template;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::aggregates::Order;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("mail transport timed out after {0:?}")]
    Timeout(Duration),

    #[error("mail transport failed: {0}")]
    Transport(String),

    #[error("failed to encode mail: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<(), NotificationError>;
}

/// Hands rendered mail to the relay listening on a NATS subject.
pub struct NatsMailTransport {
    client: async_nats::Client,
    subject: String,
}

impl NatsMailTransport {
    pub fn new(client: async_nats::Client, subject: impl Into<String>) -> Self {
        Self { client, subject: subject.into() }
    }
}

#[async_trait]
impl MailTransport for NatsMailTransport {
    async fn send(&self, message: &MailMessage) -> Result<(), NotificationError> {
        let payload = serde_json::to_vec(message)?;
        self.client
            .publish(self.subject.clone(), payload.into())
            .await
            .map_err(|e| NotificationError::Transport(e.to_string()))?;
        self.client.flush().await.map_err(|e| NotificationError::Transport(e.to_string()))
    }
}

/// Logs mail instead of sending it. Used when no relay is configured.
#[derive(Default)]
pub struct LogMailTransport;

#[async_trait]
impl MailTransport for LogMailTransport {
    async fn send(&self, message: &MailMessage) -> Result<(), NotificationError> {
        info!(to = %message.to, subject = %message.subject, "mail relay not configured, mail logged only");
        debug!(html = %message.html);
        Ok(())
    }
}

#[derive(Clone)]
pub struct OrderNotifier {
    transport: Arc<dyn MailTransport>,
    from: String,
    subject_prefix: String,
    timeout: Duration,
}

impl OrderNotifier {
    pub fn new(
        transport: Arc<dyn MailTransport>, from: impl Into<String>, subject_prefix: impl Into<String>, timeout: Duration,
    ) -> Self {
        Self { transport, from: from.into(), subject_prefix: subject_prefix.into(), timeout }
    }

    /// Sends the confirmation to the email captured on the order.
    pub async fn send_order_confirmation(&self, order: &Order) -> Result<(), NotificationError> {
        let message = MailMessage {
            from: self.from.clone(),
            to: order.customer_email().to_string(),
            subject: template::subject(&self.subject_prefix, order),
            html: template::render_order_confirmation(order),
        };
        tokio::time::timeout(self.timeout, self.transport.send(&message))
            .await
            .map_err(|_| NotificationError::Timeout(self.timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;
    use uuid::Uuid;
    use crate::domain::aggregates::{OrderDetail, PaymentMethod};
    use crate::domain::value_objects::{ContactSnapshot, Money};

    #[derive(Default)]
    struct Recording(Mutex<Vec<MailMessage>>);

    #[async_trait]
    impl MailTransport for Recording {
        async fn send(&self, message: &MailMessage) -> Result<(), NotificationError> {
            self.0.lock().await.push(message.clone());
            Ok(())
        }
    }

    struct Stalled;

    #[async_trait]
    impl MailTransport for Stalled {
        async fn send(&self, _: &MailMessage) -> Result<(), NotificationError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    fn order() -> Order {
        let details = vec![OrderDetail {
            id: Uuid::new_v4(), product_id: Uuid::new_v4(), product_title: "Vitamin C".into(),
            quantity: 1, price_at_order: Money::new(25_000),
        }];
        Order::place(Uuid::new_v4(), "khach@example.vn", ContactSnapshot::default(), None, PaymentMethod::Offline, details)
    }

    #[tokio::test]
    async fn test_confirmation_goes_to_order_email() {
        let transport = Arc::new(Recording::default());
        let notifier = OrderNotifier::new(transport.clone(), "shop@example.vn", "Xác nhận đơn hàng", Duration::from_secs(1));
        notifier.send_order_confirmation(&order()).await.unwrap();
        let sent = transport.0.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "khach@example.vn");
        assert_eq!(sent[0].from, "shop@example.vn");
    }

    #[tokio::test]
    async fn test_stalled_transport_times_out() {
        let notifier = OrderNotifier::new(Arc::new(Stalled), "shop@example.vn", "x", Duration::from_millis(50));
        let err = notifier.send_order_confirmation(&order()).await.unwrap_err();
        assert!(matches!(err, NotificationError::Timeout(_)));
    }
}
