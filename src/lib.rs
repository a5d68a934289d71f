//! Dropship checkout service
//!
//! Converts carts into orders, splits each order into per-supplier
//! fulfillments, and reconciles payment and supplier webhooks.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod notifications;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    extract::{FromRef, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, patch, post},
    Router,
};
use sea_orm::DatabaseConnection;
use serde_json::json;
use std::{sync::Arc, time::Duration};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};

use crate::{
    auth::{AuthConfig, AuthService},
    events::EventSender,
    handlers::AppServices,
    services::{
        address::{AcceptAllAddressValidator, AddressValidator},
        payment_gateway::{PaymentGateway, StubPaymentGateway, WebhookVerifier},
    },
};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: Arc<EventSender>,
    pub services: AppServices,
    pub auth: Arc<AuthService>,
    pub payment_verifier: WebhookVerifier,
    pub supplier_verifier: WebhookVerifier,
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

impl AppState {
    /// State wired with the stub payment provider and the permissive
    /// address validator.
    pub fn new(db: Arc<DatabaseConnection>, config: config::AppConfig, event_sender: EventSender) -> Self {
        Self::with_integrations(
            db,
            config,
            event_sender,
            Arc::new(StubPaymentGateway),
            Arc::new(AcceptAllAddressValidator),
        )
    }

    pub fn with_integrations(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: EventSender,
        gateway: Arc<dyn PaymentGateway>,
        address_validator: Arc<dyn AddressValidator>,
    ) -> Self {
        let event_sender = Arc::new(event_sender);
        let services = AppServices::new(
            db.clone(),
            event_sender.clone(),
            gateway,
            address_validator,
            config.checkout_timeout(),
        );
        let auth = Arc::new(AuthService::new(AuthConfig::new(
            config.jwt_secret.clone(),
            config.jwt_audience.clone(),
            config.jwt_issuer.clone(),
            chrono::Duration::hours(1),
        )));
        let payment_verifier = WebhookVerifier::new(
            config.payment_webhook_secret.clone(),
            config.webhook_tolerance(),
        );
        let supplier_verifier = WebhookVerifier::new(
            config.supplier_webhook_secret.clone(),
            config.webhook_tolerance(),
        );

        Self {
            db,
            config,
            event_sender,
            services,
            auth,
            payment_verifier,
            supplier_verifier,
        }
    }
}

pub fn api_v1_routes() -> Router<AppState> {
    let cart = Router::new()
        .route(
            "/cart",
            get(handlers::cart::list_cart).post(handlers::cart::add_cart_item),
        )
        .route("/cart/summary", get(handlers::cart::cart_summary))
        .route(
            "/cart/:id",
            patch(handlers::cart::update_cart_item).delete(handlers::cart::remove_cart_item),
        );

    let orders = Router::new()
        .route("/orders", get(handlers::orders::list_orders))
        .route("/orders/:id", get(handlers::orders::get_order));

    // Webhooks carry no bearer token; they are HMAC verified in the handler
    let webhooks = Router::new()
        .route(
            "/payments/webhook",
            post(handlers::payment_webhooks::payment_webhook),
        )
        .route(
            "/dropship/webhook",
            post(handlers::dropship::supplier_status_webhook),
        );

    Router::new()
        .route("/health", get(health_check))
        .route("/checkout", post(handlers::checkout::checkout))
        .merge(cart)
        .merge(orders)
        .merge(webhooks)
}

/// Full application router: API, OpenAPI document and the HTTP layers.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    // Outer bound only; services roll back at `checkout_timeout` first
    let request_timeout = state.config.checkout_timeout() + Duration::from_secs(5);

    Router::new()
        .nest("/api/v1", api_v1_routes())
        .merge(openapi::openapi_routes())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(crate::tracing::configure_http_tracing())
        .layer(cors)
        .layer(axum::middleware::from_fn(
            crate::tracing::request_id_middleware,
        ))
        .with_state(state)
}

fn cors_layer(cfg: &config::AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cfg
        .cors_allowed_origins
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if !origins.is_empty() {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    } else if cfg.is_development() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    }
}

async fn health_check(State(state): State<AppState>) -> Response {
    let (status, db_status) = match state.db.ping().await {
        Ok(_) => (StatusCode::OK, "healthy"),
        Err(e) => {
            ::tracing::warn!(error = %e, "database ping failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
        }
    };

    let body = json!({
        "status": db_status,
        "checks": { "database": db_status },
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });
    (status, Json(body)).into_response()
}
