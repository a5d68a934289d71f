use crate::entities::{fulfillment::FulfillmentStatus, order::PaymentMethod};
use crate::notifications::{Notification, Notifier};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event after commit; a closed channel is logged, never surfaced.
    pub async fn send_or_log(&self, event: Event) {
        let name = event.name();
        if let Err(e) = self.send(event).await {
            warn!(event = name, error = %e, "dropping domain event");
        }
    }
}

/// Domain events published once the owning transaction has committed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Event {
    OrderPlaced {
        order_id: Uuid,
        user_id: Uuid,
        payment_method: PaymentMethod,
        total_price: Decimal,
        customer_email: String,
        /// False while an online payment is still outstanding
        confirmed: bool,
        at: DateTime<Utc>,
    },
    PaymentCaptured {
        order_id: Uuid,
        provider_order_id: String,
        total_price: Decimal,
        customer_email: String,
        at: DateTime<Utc>,
    },
    PaymentFailed {
        order_id: Uuid,
        provider_order_id: String,
        stock_released: bool,
        at: DateTime<Utc>,
    },
    FulfillmentUpdated {
        fulfillment_id: Uuid,
        order_id: Uuid,
        status: FulfillmentStatus,
        at: DateTime<Utc>,
    },
    OrderFulfilled {
        order_id: Uuid,
        customer_email: String,
        tracking_numbers: Vec<String>,
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::OrderPlaced { .. } => "order_placed",
            Event::PaymentCaptured { .. } => "payment_captured",
            Event::PaymentFailed { .. } => "payment_failed",
            Event::FulfillmentUpdated { .. } => "fulfillment_updated",
            Event::OrderFulfilled { .. } => "order_fulfilled",
        }
    }

    /// Customer notification owed for this event, if any
    pub fn notification(&self) -> Option<Notification> {
        match self {
            Event::OrderPlaced {
                order_id,
                total_price,
                customer_email,
                confirmed: true,
                ..
            } => Some(Notification::order_placed(
                *order_id,
                customer_email,
                *total_price,
            )),
            Event::PaymentCaptured {
                order_id,
                total_price,
                customer_email,
                ..
            } => Some(Notification::order_placed(
                *order_id,
                customer_email,
                *total_price,
            )),
            Event::OrderFulfilled {
                order_id,
                customer_email,
                tracking_numbers,
                ..
            } => Some(Notification::order_shipped(
                *order_id,
                customer_email,
                tracking_numbers,
            )),
            _ => None,
        }
    }
}

pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventSender::new(tx), rx)
}

/// Drains the event channel until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, notifier: Arc<dyn Notifier>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        debug!(event = event.name(), "received domain event");
        metrics::counter!("dropship_events_total", 1, "event" => event.name());

        if let Some(notification) = event.notification() {
            let order_id = notification.order_id;
            if let Err(e) = notifier.send(notification).await {
                error!(
                    "Failed to deliver notification: order_id={}, error={}",
                    order_id, e
                );
            }
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::{NotificationError, NotificationType};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, notification: Notification) -> Result<(), NotificationError> {
            self.sent.lock().await.push(notification);
            Ok(())
        }
    }

    #[tokio::test]
    async fn only_customer_facing_events_notify() {
        let (sender, rx) = channel(8);
        let notifier = Arc::new(RecordingNotifier::default());
        let order_id = Uuid::new_v4();

        sender
            .send_or_log(Event::OrderPlaced {
                order_id,
                user_id: Uuid::new_v4(),
                payment_method: PaymentMethod::Online,
                total_price: dec!(5.00),
                customer_email: "c@example.com".into(),
                confirmed: false,
                at: Utc::now(),
            })
            .await;
        sender
            .send_or_log(Event::PaymentCaptured {
                order_id,
                provider_order_id: "stub_x".into(),
                total_price: dec!(5.00),
                customer_email: "c@example.com".into(),
                at: Utc::now(),
            })
            .await;
        sender
            .send_or_log(Event::FulfillmentUpdated {
                fulfillment_id: Uuid::new_v4(),
                order_id,
                status: FulfillmentStatus::Placed,
                at: Utc::now(),
            })
            .await;
        drop(sender);

        process_events(rx, notifier.clone()).await;

        let sent = notifier.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].notification_type, NotificationType::OrderPlaced);
        assert_eq!(sent[0].order_id, order_id);
    }

    #[tokio::test]
    async fn send_on_closed_channel_does_not_panic() {
        let (sender, rx) = channel(1);
        drop(rx);
        sender
            .send_or_log(Event::OrderFulfilled {
                order_id: Uuid::new_v4(),
                customer_email: String::new(),
                tracking_numbers: vec![],
                at: Utc::now(),
            })
            .await;
        assert!(sender.send(Event::OrderFulfilled {
            order_id: Uuid::new_v4(),
            customer_email: String::new(),
            tracking_numbers: vec![],
            at: Utc::now(),
        })
        .await
        .is_err());
    }
}
