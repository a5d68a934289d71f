//! Applies payment provider callbacks to payments, orders and fulfillments.
//!
//! Deliveries are at-least-once. The payment row is locked by its
//! `provider_order_id` for the whole transaction, so duplicate deliveries
//! serialize and each side effect is applied at most once.

use super::stock_ledger;
use crate::{
    entities::{
        cart_item,
        fulfillment::{self, FulfillmentStatus},
        order::{self, OrderStatus, PaymentStatus},
        order_item, payment,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, QuerySelect, Set, TransactionTrait,
};
use std::{sync::Arc, time::Duration};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Provider callback payload
#[derive(Debug, Clone, Default)]
pub struct PaymentNotice {
    pub provider_order_id: Option<String>,
    pub provider_payment_id: Option<String>,
    /// `PAID` (case-insensitive) or anything else for failure; absent means `PAID`
    pub status: Option<String>,
}

impl PaymentNotice {
    pub fn reports_paid(&self) -> bool {
        self.status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map_or(true, |s| s.eq_ignore_ascii_case("PAID"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Payment moved PENDING -> PAID in this call
    Captured { order_id: Uuid },
    /// Replay of a success that was already applied
    AlreadyCaptured { order_id: Uuid },
    /// Payment moved PENDING -> FAILED in this call
    Failed { order_id: Uuid, stock_released: bool },
    /// Replay of a failure that was already applied
    AlreadyFailed { order_id: Uuid },
    /// Failure reported after the payment was captured; nothing changed
    FailureAfterCapture { order_id: Uuid },
}

impl ReconcileOutcome {
    pub fn order_id(&self) -> Uuid {
        match self {
            Self::Captured { order_id }
            | Self::AlreadyCaptured { order_id }
            | Self::Failed { order_id, .. }
            | Self::AlreadyFailed { order_id }
            | Self::FailureAfterCapture { order_id } => *order_id,
        }
    }

    /// Whether the payment ended up failed
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::AlreadyFailed { .. })
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Captured { .. } => "captured",
            Self::AlreadyCaptured { .. } => "already_captured",
            Self::Failed { .. } => "failed",
            Self::AlreadyFailed { .. } => "already_failed",
            Self::FailureAfterCapture { .. } => "failure_after_capture",
        }
    }
}

#[derive(Clone)]
pub struct PaymentReconciler {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    timeout: Duration,
}

impl PaymentReconciler {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>, timeout: Duration) -> Self {
        Self {
            db,
            event_sender,
            timeout,
        }
    }

    #[instrument(skip(self, notice), fields(provider_order_id = ?notice.provider_order_id))]
    pub async fn reconcile(&self, notice: PaymentNotice) -> Result<ReconcileOutcome, ServiceError> {
        let key = notice
            .provider_order_id
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(ServiceError::MissingIdempotencyKey)?
            .to_string();
        let paid = notice.reports_paid();
        let provider_payment_id = notice
            .provider_payment_id
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());

        let result = match tokio::time::timeout(
            self.timeout,
            self.apply(&key, paid, provider_payment_id),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(%key, "payment reconciliation timed out; rolled back");
                Err(ServiceError::Timeout)
            }
        };

        match &result {
            Ok((outcome, events)) => {
                metrics::counter!("dropship_payment_webhooks_total", 1, "outcome" => outcome.label());
                for event in events {
                    self.event_sender.send_or_log(event.clone()).await;
                }
            }
            Err(err) => {
                metrics::counter!("dropship_payment_webhooks_total", 1, "outcome" => err.kind());
            }
        }

        result.map(|(outcome, _)| outcome)
    }

    async fn apply(
        &self,
        key: &str,
        paid: bool,
        provider_payment_id: Option<String>,
    ) -> Result<(ReconcileOutcome, Vec<Event>), ServiceError> {
        let txn = self.db.begin().await?;

        let payment = payment::Entity::find()
            .filter(payment::Column::ProviderOrderId.eq(key))
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::PaymentNotFound(key.to_string()))?;

        let order = order::Entity::find_by_id(payment.order_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::InternalError(format!("order {} missing for payment", payment.order_id))
            })?;
        let order_id = order.id;

        match (paid, payment.status) {
            (true, PaymentStatus::Paid) => {
                info!(%order_id, "duplicate capture notice ignored");
                Ok((ReconcileOutcome::AlreadyCaptured { order_id }, Vec::new()))
            }
            (true, PaymentStatus::Failed) => Err(ServiceError::PaymentAlreadyFinalized(key.to_string())),
            (true, PaymentStatus::Pending) => {
                let events = capture(&txn, payment, order, provider_payment_id).await?;
                txn.commit().await?;
                info!(%order_id, "payment captured");
                Ok((ReconcileOutcome::Captured { order_id }, events))
            }
            (false, PaymentStatus::Paid) => {
                warn!(%order_id, "failure notice for captured payment ignored");
                Ok((ReconcileOutcome::FailureAfterCapture { order_id }, Vec::new()))
            }
            (false, PaymentStatus::Failed) => Ok((ReconcileOutcome::AlreadyFailed { order_id }, Vec::new())),
            (false, PaymentStatus::Pending) => {
                let (stock_released, events) = fail(&txn, payment, order, provider_payment_id).await?;
                txn.commit().await?;
                info!(%order_id, stock_released, "payment failed; order cancelled");
                Ok((
                    ReconcileOutcome::Failed {
                        order_id,
                        stock_released,
                    },
                    events,
                ))
            }
            (_, PaymentStatus::CodPending) => Err(ServiceError::InternalError(format!(
                "payment {} is in a COD state",
                payment.id
            ))),
        }
    }
}

async fn capture(
    txn: &DatabaseTransaction,
    payment: payment::Model,
    order: order::Model,
    provider_payment_id: Option<String>,
) -> Result<Vec<Event>, ServiceError> {
    let now = Utc::now();
    let provider_order_id = payment.provider_order_id.clone();

    let mut payment_update: payment::ActiveModel = payment.into();
    payment_update.status = Set(PaymentStatus::Paid);
    if provider_payment_id.is_some() {
        payment_update.provider_payment_id = Set(provider_payment_id);
    }
    payment_update.updated_at = Set(now);
    payment_update.update(txn).await?;

    let user_id = order.user_id;
    let mut order_update: order::ActiveModel = order.into();
    order_update.payment_status = Set(PaymentStatus::Paid);
    order_update.status = Set(OrderStatus::Placed);
    order_update.updated_at = Set(now);
    let order = order_update.update(txn).await?;

    let advanced = transition_pending_fulfillments(txn, order.id, FulfillmentStatus::Placed).await?;

    cart_item::Entity::delete_many()
        .filter(cart_item::Column::UserId.eq(user_id))
        .exec(txn)
        .await?;

    let mut events = vec![Event::PaymentCaptured {
        order_id: order.id,
        provider_order_id,
        total_price: order.total_price,
        customer_email: order.customer_email.clone(),
        at: now,
    }];
    events.extend(advanced.into_iter().map(|fulfillment_id| Event::FulfillmentUpdated {
        fulfillment_id,
        order_id: order.id,
        status: FulfillmentStatus::Placed,
        at: now,
    }));
    Ok(events)
}

/// Marks the payment failed, cancels the order and returns its stock.
async fn fail(
    txn: &DatabaseTransaction,
    payment: payment::Model,
    order: order::Model,
    provider_payment_id: Option<String>,
) -> Result<(bool, Vec<Event>), ServiceError> {
    let now = Utc::now();
    let provider_order_id = payment.provider_order_id.clone();

    let items = order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(order.id))
        .all(txn)
        .await?;
    let mut by_product: std::collections::BTreeMap<Uuid, i32> = std::collections::BTreeMap::new();
    for item in &items {
        *by_product.entry(item.product_id).or_insert(0) += item.quantity;
    }
    let mut stock_released = false;
    for (product_id, quantity) in by_product {
        stock_released |= stock_ledger::release(txn, product_id, quantity).await?;
    }

    let cancelled = transition_pending_fulfillments(txn, order.id, FulfillmentStatus::Cancelled).await?;

    let mut payment_update: payment::ActiveModel = payment.into();
    payment_update.status = Set(PaymentStatus::Failed);
    if provider_payment_id.is_some() {
        payment_update.provider_payment_id = Set(provider_payment_id);
    }
    payment_update.updated_at = Set(now);
    payment_update.update(txn).await?;

    let order_id = order.id;
    let mut order_update: order::ActiveModel = order.into();
    order_update.payment_status = Set(PaymentStatus::Failed);
    order_update.status = Set(OrderStatus::Cancelled);
    order_update.updated_at = Set(now);
    order_update.update(txn).await?;

    let mut events = vec![Event::PaymentFailed {
        order_id,
        provider_order_id,
        stock_released,
        at: now,
    }];
    events.extend(cancelled.into_iter().map(|fulfillment_id| Event::FulfillmentUpdated {
        fulfillment_id,
        order_id,
        status: FulfillmentStatus::Cancelled,
        at: now,
    }));
    Ok((stock_released, events))
}

/// Moves the order's PENDING fulfillments to `to` and returns their ids.
async fn transition_pending_fulfillments(
    txn: &DatabaseTransaction,
    order_id: Uuid,
    to: FulfillmentStatus,
) -> Result<Vec<Uuid>, ServiceError> {
    let ids: Vec<Uuid> = fulfillment::Entity::find()
        .select_only()
        .column(fulfillment::Column::Id)
        .filter(fulfillment::Column::OrderId.eq(order_id))
        .filter(fulfillment::Column::Status.eq(FulfillmentStatus::Pending))
        .into_tuple()
        .all(txn)
        .await?;

    if ids.is_empty() {
        return Ok(ids);
    }

    fulfillment::Entity::update_many()
        .col_expr(fulfillment::Column::Status, Expr::value(to))
        .col_expr(fulfillment::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(fulfillment::Column::Id.is_in(ids.clone()))
        .exec(txn)
        .await?;

    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_status_counts_as_paid() {
        assert!(PaymentNotice::default().reports_paid());
        assert!(PaymentNotice {
            status: Some(" paid ".into()),
            ..Default::default()
        }
        .reports_paid());
    }

    #[test]
    fn any_other_status_is_failure() {
        for status in ["FAILED", "declined", "PAID_LATER"] {
            let notice = PaymentNotice {
                status: Some(status.into()),
                ..Default::default()
            };
            assert!(!notice.reports_paid(), "{status}");
        }
    }

    #[test]
    fn outcome_failure_classification() {
        let id = Uuid::new_v4();
        assert!(ReconcileOutcome::Failed {
            order_id: id,
            stock_released: true
        }
        .is_failure());
        assert!(ReconcileOutcome::AlreadyFailed { order_id: id }.is_failure());
        assert!(!ReconcileOutcome::FailureAfterCapture { order_id: id }.is_failure());
        assert_eq!(ReconcileOutcome::AlreadyCaptured { order_id: id }.order_id(), id);
    }
}
