//! Domain event publication over NATS.
//!
//! Events are published after the transaction that produced them commits.
//! Delivery is fire-and-forget; failures are logged and dropped.

use tracing::{debug, warn};

use crate::domain::events::DomainEvent;

#[derive(Clone)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
    prefix: String,
}

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>, prefix: impl Into<String>) -> Self {
        Self { nats, prefix: prefix.into() }
    }

    /// A publisher with no connection; every event is dropped.
    pub fn disabled() -> Self {
        Self::new(None, "")
    }

    pub fn subject(&self, event: &DomainEvent) -> String {
        format!("{}.{}", self.prefix, event.name())
    }

    pub async fn publish_all(&self, events: Vec<DomainEvent>) {
        let Some(client) = &self.nats else {
            debug!(count = events.len(), "no NATS client, events not published");
            return;
        };
        for event in events {
            let subject = self.subject(&event);
            let payload = match serde_json::to_vec(&event) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(%subject, error = %e, "failed to encode domain event");
                    continue;
                }
            };
            if let Err(e) = client.publish(subject.clone(), payload.into()).await {
                warn!(%subject, error = %e, "failed to publish domain event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use crate::domain::events::OrderEvent;

    #[test]
    fn test_subject_uses_prefix_and_event_name() {
        let publisher = EventPublisher::new(None, "pharmacy");
        let event = DomainEvent::Order(OrderEvent::Cancelled { order_id: Uuid::nil() });
        assert_eq!(publisher.subject(&event), "pharmacy.orders.cancelled");
    }

    #[tokio::test]
    async fn test_disabled_publisher_drops_events() {
        let event = DomainEvent::Order(OrderEvent::Cancelled { order_id: Uuid::nil() });
        EventPublisher::disabled().publish_all(vec![event]).await;
    }
}
