use super::common::{money, success_response, PaginationMeta, PaginationParams};
use crate::{
    auth::AuthUser,
    entities::{
        fulfillment::{self, FulfillmentStatus},
        order::{self, OrderStatus, PaymentMethod, PaymentStatus},
        order_item, payment,
    },
    errors::ServiceError,
    services::orders::OrderDetail,
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::Response,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderSummary {
    pub id: Uuid,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    #[schema(value_type = String)]
    pub total_price: Decimal,
    pub cod_allowed: bool,
    pub created_at: DateTime<Utc>,
}

impl From<order::Model> for OrderSummary {
    fn from(o: order::Model) -> Self {
        Self {
            id: o.id,
            status: o.status,
            payment_method: o.payment_method,
            payment_status: o.payment_status,
            total_price: money(o.total_price),
            cod_allowed: o.cod_allowed_snapshot,
            created_at: o.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderListResponse {
    pub orders: Vec<OrderSummary>,
    pub pagination: PaginationMeta,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItemView {
    pub product_id: Uuid,
    pub product_name: String,
    pub supplier_id: Option<Uuid>,
    pub quantity: i32,
    #[schema(value_type = String)]
    pub unit_price: Decimal,
    #[schema(value_type = String)]
    pub total_price: Decimal,
}

impl From<order_item::Model> for OrderItemView {
    fn from(i: order_item::Model) -> Self {
        Self {
            product_id: i.product_id,
            product_name: i.product_name,
            supplier_id: i.supplier_id,
            quantity: i.quantity,
            unit_price: money(i.unit_price),
            total_price: money(i.total_price),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FulfillmentView {
    pub id: Uuid,
    pub supplier_id: Uuid,
    pub status: FulfillmentStatus,
    pub carrier: String,
    pub tracking_number: String,
    pub tracking_url: Option<String>,
    #[schema(value_type = String)]
    pub supplier_subtotal: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl From<fulfillment::Model> for FulfillmentView {
    fn from(f: fulfillment::Model) -> Self {
        Self {
            id: f.id,
            supplier_id: f.supplier_id,
            status: f.status,
            carrier: f.carrier,
            tracking_number: f.tracking_number,
            tracking_url: f.tracking_url,
            supplier_subtotal: money(f.supplier_subtotal),
            updated_at: f.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaymentView {
    pub provider: String,
    pub provider_order_id: String,
    pub provider_payment_id: Option<String>,
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub status: PaymentStatus,
}

impl From<payment::Model> for PaymentView {
    fn from(p: payment::Model) -> Self {
        Self {
            provider: p.provider,
            provider_order_id: p.provider_order_id,
            provider_payment_id: p.provider_payment_id,
            amount: money(p.amount),
            status: p.status,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderDetailResponse {
    #[serde(flatten)]
    pub order: OrderSummary,
    pub customer_name: String,
    pub customer_email: String,
    pub shipping_address: Option<serde_json::Value>,
    pub items: Vec<OrderItemView>,
    pub fulfillments: Vec<FulfillmentView>,
    pub payment: Option<PaymentView>,
}

impl From<OrderDetail> for OrderDetailResponse {
    fn from(detail: OrderDetail) -> Self {
        let shipping_address = detail
            .order
            .shipping_address
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok());
        let customer_name = detail.order.customer_name.clone();
        let customer_email = detail.order.customer_email.clone();
        Self {
            order: detail.order.into(),
            customer_name,
            customer_email,
            shipping_address,
            items: detail.items.into_iter().map(Into::into).collect(),
            fulfillments: detail.fulfillments.into_iter().map(Into::into).collect(),
            payment: detail.payment.map(Into::into),
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(PaginationParams),
    responses(
        (status = 200, description = "Caller's orders, newest first", body = OrderListResponse),
        (status = 401, description = "Unauthenticated", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<PaginationParams>,
) -> Result<Response, ServiceError> {
    let page = state
        .services
        .orders
        .list_for_user(user.user_id, Some(params.page), Some(params.per_page))
        .await?;

    Ok(success_response(OrderListResponse {
        pagination: PaginationMeta::new(page.page, page.per_page, page.total),
        orders: page.orders.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order with items, fulfillments and payment", body = OrderDetailResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let detail = state.services.orders.get_for_user(user.user_id, id).await?;
    Ok(success_response(OrderDetailResponse::from(detail)))
}
