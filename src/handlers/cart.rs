use super::common::{created_response, money, no_content_response, success_response, validate_input};
use crate::{
    auth::AuthUser,
    errors::ServiceError,
    services::cart::{CartLineView, CartSummary},
    AppState,
};
use axum::{
    extract::{Path, State},
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddCartItemRequest {
    pub product_id: Uuid,
    #[serde(default = "default_quantity")]
    #[validate(range(min = 1, max = 10000))]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateCartItemRequest {
    #[validate(range(min = 1, max = 10000))]
    pub quantity: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CartItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
}

#[utoipa::path(
    get,
    path = "/api/v1/cart",
    responses(
        (status = 200, description = "Cart lines with current prices", body = [CartLineView]),
        (status = 401, description = "Unauthenticated", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn list_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Response, ServiceError> {
    let lines: Vec<CartLineView> = state
        .services
        .cart
        .list(user.user_id)
        .await?
        .into_iter()
        .map(|line| CartLineView {
            unit_price: money(line.unit_price),
            line_total: money(line.line_total),
            ..line
        })
        .collect();
    Ok(success_response(lines))
}

#[utoipa::path(
    post,
    path = "/api/v1/cart",
    request_body = AddCartItemRequest,
    responses(
        (status = 201, description = "Line added or merged", body = CartItemResponse),
        (status = 400, description = "Invalid quantity", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_cart_item(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddCartItemRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let item = state
        .services
        .cart
        .add_item(user.user_id, payload.product_id, payload.quantity)
        .await?;
    Ok(created_response(CartItemResponse {
        id: item.id,
        product_id: item.product_id,
        quantity: item.quantity,
    }))
}

#[utoipa::path(
    patch,
    path = "/api/v1/cart/{id}",
    params(("id" = Uuid, Path, description = "Cart item id")),
    request_body = UpdateCartItemRequest,
    responses(
        (status = 200, description = "Quantity updated", body = CartItemResponse),
        (status = 404, description = "Cart item not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn update_cart_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCartItemRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let item = state
        .services
        .cart
        .update_quantity(user.user_id, id, payload.quantity)
        .await?;
    Ok(success_response(CartItemResponse {
        id: item.id,
        product_id: item.product_id,
        quantity: item.quantity,
    }))
}

#[utoipa::path(
    delete,
    path = "/api/v1/cart/{id}",
    params(("id" = Uuid, Path, description = "Cart item id")),
    responses(
        (status = 204, description = "Removed"),
        (status = 404, description = "Cart item not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_cart_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state.services.cart.remove_item(user.user_id, id).await?;
    Ok(no_content_response())
}

#[utoipa::path(
    get,
    path = "/api/v1/cart/summary",
    responses(
        (status = 200, description = "Item count and total price", body = CartSummary)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn cart_summary(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Response, ServiceError> {
    let summary = state.services.cart.summary(user.user_id).await?;
    Ok(success_response(CartSummary {
        total_items: summary.total_items,
        total_price: money(summary.total_price),
    }))
}
