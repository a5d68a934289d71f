//! Groups order lines into one fulfillment per supplier.

use super::order_assembler::OrderDraft;
use crate::entities::{
    fulfillment::{self, FulfillmentStatus},
    order::PaymentMethod,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::Set;
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct FulfillmentDraft {
    pub id: Uuid,
    pub order_id: Uuid,
    pub supplier_id: Uuid,
    pub status: FulfillmentStatus,
    pub supplier_subtotal: Decimal,
}

/// COD orders go straight to the supplier; online orders wait for payment.
pub fn initial_status(method: PaymentMethod) -> FulfillmentStatus {
    match method {
        PaymentMethod::Cod => FulfillmentStatus::Placed,
        PaymentMethod::Online => FulfillmentStatus::Pending,
    }
}

/// Lines without a supplier ship directly and produce no fulfillment.
/// Output is ordered by supplier id.
pub fn split(order: &OrderDraft) -> Vec<FulfillmentDraft> {
    let mut subtotals: BTreeMap<Uuid, Decimal> = BTreeMap::new();
    for item in &order.items {
        let Some(supplier_id) = item.supplier_id else {
            continue;
        };
        let unit_cost = item.cost_basis.unwrap_or(item.unit_price);
        *subtotals.entry(supplier_id).or_insert(Decimal::ZERO) +=
            unit_cost * Decimal::from(item.quantity);
    }

    let status = initial_status(order.payment_method);
    subtotals
        .into_iter()
        .map(|(supplier_id, subtotal)| FulfillmentDraft {
            id: Uuid::new_v4(),
            order_id: order.id,
            supplier_id,
            status,
            supplier_subtotal: subtotal.round_dp(2),
        })
        .collect()
}

impl FulfillmentDraft {
    pub fn active_model(&self, now: DateTime<Utc>) -> fulfillment::ActiveModel {
        fulfillment::ActiveModel {
            id: Set(self.id),
            order_id: Set(self.order_id),
            supplier_id: Set(self.supplier_id),
            status: Set(self.status),
            carrier: Set(String::new()),
            tracking_number: Set(String::new()),
            tracking_url: Set(None),
            supplier_subtotal: Set(self.supplier_subtotal),
            created_at: Set(now),
            updated_at: Set(now),
        }
    }
}
