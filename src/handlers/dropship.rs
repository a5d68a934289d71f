use super::common::{parse_json, success_response};
use crate::{
    entities::fulfillment::FulfillmentStatus, errors::ServiceError,
    services::fulfillments::SupplierStatusUpdate, AppState,
};
use axum::{extract::State, http::HeaderMap, response::Response};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SupplierStatusPayload {
    pub fulfillment_id: Uuid,
    /// PENDING, PLACED, ACCEPTED, SHIPPED, CANCELLED, FAILED, or CREATED / SENT / CONFIRMED
    pub status: String,
    pub carrier: Option<String>,
    pub tracking_no: Option<String>,
    pub tracking_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SupplierStatusResponse {
    pub detail: String,
    pub fulfillment: Uuid,
    pub status: FulfillmentStatus,
}

// POST /api/v1/dropship/webhook
#[utoipa::path(
    post,
    path = "/api/v1/dropship/webhook",
    request_body = SupplierStatusPayload,
    responses(
        (status = 200, description = "Fulfillment updated", body = SupplierStatusResponse),
        (status = 400, description = "Invalid status", body = crate::errors::ErrorResponse),
        (status = 401, description = "Invalid signature", body = crate::errors::ErrorResponse),
        (status = 404, description = "Fulfillment not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Backward or final-state transition, or the order is still awaiting payment", body = crate::errors::ErrorResponse)
    ),
    tag = "Dropship"
)]
pub async fn supplier_status_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ServiceError> {
    if !state.supplier_verifier.verify(&headers, &body) {
        warn!("Supplier webhook signature verification failed");
        return Err(ServiceError::InvalidSignature);
    }

    let payload: SupplierStatusPayload = parse_json(&body)?;
    let saved = state
        .services
        .fulfillments
        .apply_supplier_update(SupplierStatusUpdate {
            fulfillment_id: payload.fulfillment_id,
            status: payload.status,
            carrier: payload.carrier,
            tracking_no: payload.tracking_no,
            tracking_url: payload.tracking_url,
        })
        .await?;

    Ok(success_response(SupplierStatusResponse {
        detail: "Updated".to_string(),
        fulfillment: saved.id,
        status: saved.status,
    }))
}
