use axum::{routing::get, Json, Router};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Dropship Checkout API",
        version = "1.0.0",
        description = r#"
Converts a customer's cart into an order, splits the order into one
fulfillment per supplier, and reconciles asynchronous payment and supplier
notifications.

## Authentication

Customer endpoints require a bearer JWT:

```
Authorization: Bearer <your-jwt-token>
```

Webhook endpoints are unauthenticated but HMAC signed when a secret is
configured (`X-Timestamp` and `X-Signature` headers).

## Errors

Every error body carries `error`, `kind`, `request_id` and `timestamp`.
Retryable failures (timeouts, database errors) also set `retryable: true`.
        "#
    ),
    tags(
        (name = "Checkout", description = "Cart to order conversion"),
        (name = "Cart", description = "Per-user cart storage"),
        (name = "Orders", description = "Order history for the caller"),
        (name = "Payments", description = "Payment provider callbacks"),
        (name = "Dropship", description = "Supplier fulfillment callbacks")
    ),
    paths(
        crate::handlers::checkout::checkout,
        crate::handlers::cart::list_cart,
        crate::handlers::cart::add_cart_item,
        crate::handlers::cart::update_cart_item,
        crate::handlers::cart::remove_cart_item,
        crate::handlers::cart::cart_summary,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::payment_webhooks::payment_webhook,
        crate::handlers::dropship::supplier_status_webhook,
    ),
    components(
        schemas(
            crate::handlers::checkout::CheckoutBody,
            crate::handlers::checkout::CheckoutResponse,
            crate::handlers::checkout::PaymentReference,
            crate::handlers::checkout::FulfillmentSummary,
            crate::handlers::cart::AddCartItemRequest,
            crate::handlers::cart::UpdateCartItemRequest,
            crate::handlers::cart::CartItemResponse,
            crate::services::cart::CartLineView,
            crate::services::cart::CartSummary,
            crate::handlers::orders::OrderSummary,
            crate::handlers::orders::OrderListResponse,
            crate::handlers::orders::OrderDetailResponse,
            crate::handlers::orders::OrderItemView,
            crate::handlers::orders::FulfillmentView,
            crate::handlers::orders::PaymentView,
            crate::handlers::common::PaginationMeta,
            crate::handlers::payment_webhooks::PaymentWebhookPayload,
            crate::handlers::payment_webhooks::PaymentWebhookResponse,
            crate::handlers::dropship::SupplierStatusPayload,
            crate::handlers::dropship::SupplierStatusResponse,
            crate::services::address::ShippingAddress,
            crate::entities::order::PaymentMethod,
            crate::entities::order::PaymentStatus,
            crate::entities::order::OrderStatus,
            crate::entities::fulfillment::FulfillmentStatus,
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDocV1;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// Serves the generated document at `/api-docs/openapi.json`.
pub fn openapi_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDocV1::openapi()) }),
    )
}
