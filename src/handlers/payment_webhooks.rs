use super::common::parse_json;
use crate::{
    errors::ServiceError,
    services::payment_reconciler::{PaymentNotice, ReconcileOutcome},
    AppState,
};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct PaymentWebhookPayload {
    /// Idempotency key issued at checkout
    pub provider_order_id: Option<String>,
    pub provider_payment_id: Option<String>,
    /// `PAID` or any failure value; defaults to `PAID`
    pub status: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaymentWebhookResponse {
    pub detail: String,
    pub order_id: Uuid,
}

impl ReconcileOutcome {
    fn detail(&self) -> &'static str {
        match self {
            ReconcileOutcome::Captured { .. } => "Payment captured",
            ReconcileOutcome::AlreadyCaptured { .. } => "Payment already captured",
            ReconcileOutcome::FailureAfterCapture { .. } => {
                "Payment already captured; failure notice ignored"
            }
            ReconcileOutcome::Failed { .. } | ReconcileOutcome::AlreadyFailed { .. } => {
                "Payment failed"
            }
        }
    }
}

// POST /api/v1/payments/webhook
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    request_body = PaymentWebhookPayload,
    responses(
        (status = 200, description = "Payment reconciled (or replay of an applied capture)", body = PaymentWebhookResponse),
        (status = 400, description = "Missing provider_order_id or payment reported as failed", body = PaymentWebhookResponse),
        (status = 401, description = "Invalid signature", body = crate::errors::ErrorResponse),
        (status = 404, description = "No payment for provider_order_id", body = crate::errors::ErrorResponse),
        (status = 409, description = "Payment already failed", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ServiceError> {
    if !state.payment_verifier.verify(&headers, &body) {
        warn!("Payment webhook signature verification failed");
        return Err(ServiceError::InvalidSignature);
    }

    let payload: PaymentWebhookPayload = parse_json(&body)?;
    let outcome = state
        .services
        .payments
        .reconcile(PaymentNotice {
            provider_order_id: payload.provider_order_id,
            provider_payment_id: payload.provider_payment_id,
            status: payload.status,
        })
        .await?;

    let status = if outcome.is_failure() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };
    let body = PaymentWebhookResponse {
        detail: outcome.detail().to_string(),
        order_id: outcome.order_id(),
    };
    Ok((status, Json(body)).into_response())
}
