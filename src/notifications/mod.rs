use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

const FALLBACK_RECIPIENT: &str = "dev@example.local";

/// Customer-facing message derived from a domain event
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Notification {
    pub order_id: Uuid,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum NotificationType {
    OrderPlaced,
    OrderShipped,
}

impl Notification {
    pub fn order_placed(order_id: Uuid, email: &str, total: Decimal) -> Self {
        Self {
            order_id,
            recipient: recipient_or_fallback(email),
            subject: format!("Order #{} placed", order_id),
            body: format!("Thanks! Total: {}", total.round_dp(2)),
            notification_type: NotificationType::OrderPlaced,
        }
    }

    pub fn order_shipped(order_id: Uuid, email: &str, tracking_numbers: &[String]) -> Self {
        let tracking = if tracking_numbers.is_empty() {
            "TBA".to_string()
        } else {
            tracking_numbers.join(", ")
        };
        Self {
            order_id,
            recipient: recipient_or_fallback(email),
            subject: format!("Order #{} shipped", order_id),
            body: format!("Tracking: {}", tracking),
            notification_type: NotificationType::OrderShipped,
        }
    }
}

fn recipient_or_fallback(email: &str) -> String {
    let trimmed = email.trim();
    if trimmed.is_empty() {
        FALLBACK_RECIPIENT.to_string()
    } else {
        trimmed.to_string()
    }
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Outbound notification channel. Delivery is best effort.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: Notification) -> Result<(), NotificationError>;
}

/// Writes notifications to the log instead of delivering mail
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: Notification) -> Result<(), NotificationError> {
        info!(
            order_id = %notification.order_id,
            recipient = %notification.recipient,
            kind = ?notification.notification_type,
            subject = %notification.subject,
            "notification dispatched"
        );
        Ok(())
    }
}
