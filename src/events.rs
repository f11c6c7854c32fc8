use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Events emitted by the gateway integration services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    PaymentAuthorized {
        order_id: Uuid,
        transaction_id: String,
    },
    PaymentCaptured {
        order_id: Uuid,
        transaction_id: String,
    },
    InvoiceCreated {
        order_id: Uuid,
        invoice_id: Uuid,
    },
}

/// Cloneable handle for publishing events onto the internal channel.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously. Failure to deliver is reported to the
    /// caller but is never fatal to the triggering operation.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("failed to send event: {e}"))
    }
}

/// Background consumer for the event channel. Today events only feed the
/// log; downstream consumers (webhooks, analytics) would hang off this loop.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        match &event {
            Event::PaymentAuthorized {
                order_id,
                transaction_id,
            } => {
                info!(%order_id, %transaction_id, "payment authorized");
            }
            Event::PaymentCaptured {
                order_id,
                transaction_id,
            } => {
                info!(%order_id, %transaction_id, "payment captured");
            }
            Event::InvoiceCreated {
                order_id,
                invoice_id,
            } => {
                info!(%order_id, %invoice_id, "invoice created");
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(%order_id, %old_status, %new_status, "order status changed");
            }
            Event::OrderCreated(order_id) => {
                info!(%order_id, "order created");
            }
        }
    }
    warn!("event channel closed, stopping event processor");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_event() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);

        sender
            .send(Event::OrderCreated(Uuid::new_v4()))
            .await
            .expect("send should succeed");

        assert!(matches!(rx.recv().await, Some(Event::OrderCreated(_))));
    }

    #[tokio::test]
    async fn send_fails_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        let result = sender.send(Event::OrderCreated(Uuid::new_v4())).await;
        assert!(result.is_err());
    }
}
