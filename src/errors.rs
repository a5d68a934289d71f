use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::fulfillment::FulfillmentStatus;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Error body returned by every endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Bad Request",
    "kind": "empty_cart",
    "detail": "Cart is empty.",
    "request_id": "req-abc123xyz",
    "timestamp": "2024-12-09T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    pub error: String,
    /// Stable machine-checkable error kind
    pub kind: String,
    /// Human-readable error description
    pub detail: String,
    /// Set when the caller may safely retry the same request
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// ISO 8601 timestamp when error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Cart is empty.")]
    EmptyCart,

    #[error("Invalid payment_method '{0}'. Expected COD or ONLINE.")]
    InvalidPaymentMethod(String),

    #[error("Invalid cart line for {product}: {reason}")]
    InvalidCartLine { product: String, reason: String },

    #[error("COD not available for {product}.")]
    CodNotEligible { product: String },

    #[error("Not enough stock for {product}: requested {requested}, available {available}")]
    InsufficientStock {
        product: String,
        requested: i32,
        available: i32,
    },

    #[error("provider_order_id is required")]
    MissingIdempotencyKey,

    #[error("Payment not found for provider order {0}")]
    PaymentNotFound(String),

    #[error("Payment for provider order {0} is already finalized")]
    PaymentAlreadyFinalized(String),

    #[error("Invalid shipping address: {0}")]
    InvalidAddress(String),

    #[error("Invalid fulfillment status '{0}'")]
    InvalidFulfillmentStatus(String),

    #[error("Fulfillment cannot move from {from} to {to}")]
    InvalidFulfillmentTransition {
        from: FulfillmentStatus,
        to: FulfillmentStatus,
    },

    #[error("Fulfillment {0} is waiting on payment for its order")]
    FulfillmentAwaitingPayment(Uuid),

    #[error("Order {0} is still awaiting payment. Complete or cancel that payment before checking out again.")]
    PaymentPending(Uuid),

    #[error("Authentication required: {0}")]
    Unauthenticated(String),

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Request timed out before it could be committed; retry the request")]
    Timeout,

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Stable identifier clients can match on.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DatabaseError(_) | Self::InternalError(_) | Self::Other(_) => "internal_error",
            Self::EmptyCart => "empty_cart",
            Self::InvalidPaymentMethod(_) => "invalid_payment_method",
            Self::InvalidCartLine { .. } => "invalid_cart_line",
            Self::CodNotEligible { .. } => "cod_not_eligible",
            Self::InsufficientStock { .. } => "insufficient_stock",
            Self::MissingIdempotencyKey => "missing_idempotency_key",
            Self::PaymentNotFound(_) => "payment_not_found",
            Self::PaymentAlreadyFinalized(_) => "payment_already_finalized",
            Self::InvalidAddress(_) => "invalid_address",
            Self::InvalidFulfillmentStatus(_) => "invalid_fulfillment_status",
            Self::InvalidFulfillmentTransition { .. } => "invalid_fulfillment_transition",
            Self::FulfillmentAwaitingPayment(_) => "fulfillment_awaiting_payment",
            Self::PaymentPending(_) => "payment_pending",
            Self::Unauthenticated(_) => "unauthenticated",
            Self::InvalidSignature => "invalid_signature",
            Self::NotFound(_) => "not_found",
            Self::ValidationError(_) => "validation_error",
            Self::Timeout => "timeout",
        }
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::EmptyCart
            | Self::InvalidPaymentMethod(_)
            | Self::InvalidCartLine { .. }
            | Self::CodNotEligible { .. }
            | Self::InsufficientStock { .. }
            | Self::MissingIdempotencyKey
            | Self::InvalidAddress(_)
            | Self::InvalidFulfillmentStatus(_)
            | Self::PaymentPending(_)
            | Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::PaymentNotFound(_) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::PaymentAlreadyFinalized(_)
            | Self::InvalidFulfillmentTransition { .. }
            | Self::FulfillmentAwaitingPayment(_) => StatusCode::CONFLICT,
            Self::Unauthenticated(_) | Self::InvalidSignature => StatusCode::UNAUTHORIZED,
            Self::Timeout => StatusCode::SERVICE_UNAVAILABLE,
            Self::DatabaseError(_) | Self::InternalError(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) | Self::Other(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), error = %self, "request failed");
        }

        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            kind: self.kind().to_string(),
            detail: self.response_message(),
            retryable: self.is_retryable(),
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}
