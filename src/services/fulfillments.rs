//! Supplier-driven fulfillment status changes.

use crate::{
    entities::{
        fulfillment::{self, FulfillmentStatus},
        order::{self, OrderStatus},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect, Set,
    TransactionTrait,
};
use std::{sync::Arc, time::Duration};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Status callback from a supplier. Tracking fields are only overwritten when present.
#[derive(Debug, Clone)]
pub struct SupplierStatusUpdate {
    pub fulfillment_id: Uuid,
    pub status: String,
    pub carrier: Option<String>,
    pub tracking_no: Option<String>,
    pub tracking_url: Option<String>,
}

#[derive(Clone)]
pub struct FulfillmentService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    timeout: Duration,
}

impl FulfillmentService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>, timeout: Duration) -> Self {
        Self {
            db,
            event_sender,
            timeout,
        }
    }

    /// Applies the update; once every fulfillment of the order has shipped the
    /// order becomes FULFILLED. Fulfillments of an unpaid order stay PENDING.
    #[instrument(skip(self, update), fields(fulfillment_id = %update.fulfillment_id, status = %update.status))]
    pub async fn apply_supplier_update(
        &self,
        update: SupplierStatusUpdate,
    ) -> Result<fulfillment::Model, ServiceError> {
        let (saved, events) = match tokio::time::timeout(self.timeout, self.apply(update)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("supplier update timed out; rolled back");
                return Err(ServiceError::Timeout);
            }
        };

        for event in events {
            self.event_sender.send_or_log(event).await;
        }
        Ok(saved)
    }

    async fn apply(
        &self,
        update: SupplierStatusUpdate,
    ) -> Result<(fulfillment::Model, Vec<Event>), ServiceError> {
        let txn = self.db.begin().await?;

        let current = fulfillment::Entity::find_by_id(update.fulfillment_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Fulfillment {} not found", update.fulfillment_id))
            })?;

        let status = update
            .status
            .parse::<FulfillmentStatus>()
            .map_err(ServiceError::InvalidFulfillmentStatus)?;

        if !current.status.can_transition_to(status) {
            return Err(ServiceError::InvalidFulfillmentTransition {
                from: current.status,
                to: status,
            });
        }
        if current.status == FulfillmentStatus::Pending && status != FulfillmentStatus::Pending {
            let awaiting_payment = order::Entity::find_by_id(current.order_id)
                .one(&txn)
                .await?
                .map_or(false, |o| o.status == OrderStatus::PaymentPending);
            if awaiting_payment {
                return Err(ServiceError::FulfillmentAwaitingPayment(current.id));
            }
        }

        let now = Utc::now();
        let mut active: fulfillment::ActiveModel = current.into();
        active.status = Set(status);
        if let Some(carrier) = update.carrier {
            active.carrier = Set(carrier);
        }
        if let Some(tracking_no) = update.tracking_no {
            active.tracking_number = Set(tracking_no);
        }
        if let Some(tracking_url) = update.tracking_url {
            active.tracking_url = Set(Some(tracking_url).filter(|u| !u.is_empty()));
        }
        active.updated_at = Set(now);
        let saved = active.update(&txn).await?;

        let mut events = vec![Event::FulfillmentUpdated {
            fulfillment_id: saved.id,
            order_id: saved.order_id,
            status,
            at: now,
        }];

        if status == FulfillmentStatus::Shipped {
            if let Some(event) = complete_order_if_shipped(&txn, saved.order_id).await? {
                events.push(event);
            }
        }

        txn.commit().await?;
        info!(order_id = %saved.order_id, "fulfillment updated");
        Ok((saved, events))
    }
}

async fn complete_order_if_shipped<C>(conn: &C, order_id: Uuid) -> Result<Option<Event>, ServiceError>
where
    C: sea_orm::ConnectionTrait,
{
    let siblings = fulfillment::Entity::find()
        .filter(fulfillment::Column::OrderId.eq(order_id))
        .all(conn)
        .await?;
    if siblings.is_empty() || siblings.iter().any(|f| f.status != FulfillmentStatus::Shipped) {
        return Ok(None);
    }

    let Some(order) = order::Entity::find_by_id(order_id).one(conn).await? else {
        return Ok(None);
    };
    if order.status != OrderStatus::Placed {
        return Ok(None);
    }

    let now = Utc::now();
    let customer_email = order.customer_email.clone();
    let mut active: order::ActiveModel = order.into();
    active.status = Set(OrderStatus::Fulfilled);
    active.updated_at = Set(now);
    active.update(conn).await?;

    Ok(Some(Event::OrderFulfilled {
        order_id,
        customer_email,
        tracking_numbers: siblings
            .into_iter()
            .map(|f| f.tracking_number)
            .filter(|t| !t.is_empty())
            .collect(),
        at: now,
    }))
}
