//! Builds the immutable order snapshot from locked cart lines.

use super::catalog::CartLine;
use crate::entities::{
    order::{self, OrderStatus, PaymentMethod, PaymentStatus},
    order_item,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::Set;
use uuid::Uuid;

/// Customer identity copied onto the order
#[derive(Debug, Clone)]
pub struct CustomerSnapshot {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderLineDraft {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub supplier_id: Option<Uuid>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub cost_basis: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderDraft {
    pub id: Uuid,
    pub user_id: Uuid,
    pub customer_name: String,
    pub customer_email: String,
    pub total_price: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub status: OrderStatus,
    pub cod_allowed_snapshot: bool,
    pub shipping_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderLineDraft>,
}

/// Initial (payment_status, status) for a freshly assembled order
pub fn initial_statuses(method: PaymentMethod) -> (PaymentStatus, OrderStatus) {
    match method {
        PaymentMethod::Cod => (PaymentStatus::CodPending, OrderStatus::Placed),
        PaymentMethod::Online => (PaymentStatus::Pending, OrderStatus::PaymentPending),
    }
}

/// Snapshot current prices into order lines and sum them exactly.
pub fn assemble(
    customer: CustomerSnapshot,
    lines: &[CartLine],
    payment_method: PaymentMethod,
    cod_allowed: bool,
    shipping_address: Option<String>,
    now: DateTime<Utc>,
) -> OrderDraft {
    let items: Vec<OrderLineDraft> = lines
        .iter()
        .map(|line| {
            let unit_price = line.product.price.round_dp(2);
            OrderLineDraft {
                id: Uuid::new_v4(),
                product_id: line.product.id,
                product_name: line.product.name.clone(),
                supplier_id: line.product.supplier.as_ref().map(|s| s.id),
                quantity: line.quantity,
                unit_price,
                total_price: (unit_price * Decimal::from(line.quantity)).round_dp(2),
                cost_basis: line.product.dropship_cost.map(|c| c.round_dp(2)),
            }
        })
        .collect();

    let total_price = items
        .iter()
        .fold(Decimal::ZERO, |acc, item| acc + item.total_price);
    let (payment_status, status) = initial_statuses(payment_method);

    OrderDraft {
        id: Uuid::new_v4(),
        user_id: customer.user_id,
        customer_name: customer.name,
        customer_email: customer.email,
        total_price,
        payment_method,
        payment_status,
        status,
        cod_allowed_snapshot: cod_allowed,
        shipping_address,
        created_at: now,
        items,
    }
}

impl OrderDraft {
    pub fn order_active_model(&self) -> order::ActiveModel {
        order::ActiveModel {
            id: Set(self.id),
            user_id: Set(self.user_id),
            customer_name: Set(self.customer_name.clone()),
            customer_email: Set(self.customer_email.clone()),
            total_price: Set(self.total_price),
            payment_method: Set(self.payment_method),
            payment_status: Set(self.payment_status),
            status: Set(self.status),
            cod_allowed_snapshot: Set(self.cod_allowed_snapshot),
            shipping_address: Set(self.shipping_address.clone()),
            created_at: Set(self.created_at),
            updated_at: Set(self.created_at),
        }
    }

    pub fn item_active_models(&self) -> Vec<order_item::ActiveModel> {
        self.items
            .iter()
            .map(|item| order_item::ActiveModel {
                id: Set(item.id),
                order_id: Set(self.id),
                product_id: Set(item.product_id),
                product_name: Set(item.product_name.clone()),
                supplier_id: Set(item.supplier_id),
                quantity: Set(item.quantity),
                unit_price: Set(item.unit_price),
                total_price: Set(item.total_price),
                cost_basis: Set(item.cost_basis),
            })
            .collect()
    }
}
