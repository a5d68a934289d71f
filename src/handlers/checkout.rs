use super::common::{created_response, money, parse_json_or_default};
use crate::{
    auth::AuthUser,
    entities::{
        fulfillment::FulfillmentStatus,
        order::{OrderStatus, PaymentMethod, PaymentStatus},
    },
    errors::ServiceError,
    services::{
        address::ShippingAddress,
        checkout::{CheckoutOutcome, CheckoutRequest},
    },
    AppState,
};
use axum::{extract::State, response::Response};
use bytes::Bytes;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Checkout request body; every field is optional
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CheckoutBody {
    /// `COD` (default) or `ONLINE`, case-insensitive
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub shipping_address: Option<ShippingAddress>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaymentReference {
    pub provider: String,
    pub provider_order_id: String,
    #[schema(value_type = String, example = "5.00")]
    pub amount: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FulfillmentSummary {
    pub id: Uuid,
    pub supplier_id: Uuid,
    pub status: FulfillmentStatus,
    #[schema(value_type = String)]
    pub supplier_subtotal: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CheckoutResponse {
    pub detail: String,
    pub order_id: Uuid,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    /// Whether the cart could have been paid with COD
    pub cod_allowed: bool,
    #[schema(value_type = String, example = "20.00")]
    pub total_price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentReference>,
    pub fulfillments: Vec<FulfillmentSummary>,
}

impl From<CheckoutOutcome> for CheckoutResponse {
    fn from(outcome: CheckoutOutcome) -> Self {
        let order = outcome.order;
        let detail = match order.payment_method {
            PaymentMethod::Online => "Payment pending",
            PaymentMethod::Cod => "Order placed successfully (COD)",
        };
        Self {
            detail: detail.to_string(),
            order_id: order.id,
            payment_method: order.payment_method,
            status: order.status,
            payment_status: order.payment_status,
            cod_allowed: order.cod_allowed_snapshot,
            total_price: money(order.total_price),
            payment: outcome.payment.map(|p| PaymentReference {
                provider: p.provider,
                provider_order_id: p.provider_order_id,
                amount: money(p.amount),
            }),
            fulfillments: outcome
                .fulfillments
                .into_iter()
                .map(|f| FulfillmentSummary {
                    id: f.id,
                    supplier_id: f.supplier_id,
                    status: f.status,
                    supplier_subtotal: money(f.supplier_subtotal),
                })
                .collect(),
        }
    }
}

/// Convert the caller's cart into an order
#[utoipa::path(
    post,
    path = "/api/v1/checkout",
    request_body(content = CheckoutBody, description = "Optional; payment_method defaults to COD"),
    responses(
        (status = 201, description = "Order created", body = CheckoutResponse),
        (status = 400, description = "Empty cart, invalid payment method, COD not eligible, invalid cart line, insufficient stock, or an earlier online payment still outstanding", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthenticated", body = crate::errors::ErrorResponse),
        (status = 503, description = "Checkout timed out and was rolled back; retryable", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn checkout(
    State(state): State<AppState>,
    user: AuthUser,
    body: Bytes,
) -> Result<Response, ServiceError> {
    let body: CheckoutBody = parse_json_or_default(&body)?;

    let outcome = state
        .services
        .checkout
        .checkout(
            &user,
            CheckoutRequest {
                payment_method: body.payment_method,
                shipping_address: body.shipping_address,
            },
        )
        .await?;

    Ok(created_response(CheckoutResponse::from(outcome)))
}
