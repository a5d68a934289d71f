#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request},
    response::Response,
    Router,
};
use chrono::Utc;
use dropship_checkout::{
    build_router,
    config::AppConfig,
    db,
    entities::{cart_item, product, supplier},
    events,
    notifications::LogNotifier,
    services::payment_gateway::{sign, SIGNATURE_HEADER, TIMESTAMP_HEADER},
    AppState,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, Set};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

pub const JWT_SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";
pub const PAYMENT_SECRET: &str = "payment-webhook-test-secret";

/// Product row to seed; unset fields take catalog defaults.
#[derive(Debug, Clone)]
pub struct ProductSeed {
    pub name: &'static str,
    pub price: Decimal,
    pub stock: Option<i32>,
    pub cod_allowed: bool,
    pub supplier_id: Option<Uuid>,
    pub dropship_cost: Option<Decimal>,
}

impl ProductSeed {
    pub fn new(name: &'static str, price: Decimal) -> Self {
        Self {
            name,
            price,
            stock: None,
            cod_allowed: true,
            supplier_id: None,
            dropship_cost: None,
        }
    }

    pub fn stock(mut self, stock: i32) -> Self {
        self.stock = Some(stock);
        self
    }

    pub fn no_cod(mut self) -> Self {
        self.cod_allowed = false;
        self
    }

    pub fn supplier(mut self, supplier_id: Uuid) -> Self {
        self.supplier_id = Some(supplier_id);
        self
    }

    pub fn dropship_cost(mut self, cost: Decimal) -> Self {
        self.dropship_cost = Some(cost);
        self
    }
}

/// Application router backed by a private in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(tweak: impl FnOnce(&mut AppConfig)) -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            JWT_SECRET.to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // One connection so every query sees the same in-memory database
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        tweak(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_sender, event_rx) = events::channel(cfg.event_channel_capacity);
        let event_task = tokio::spawn(events::process_events(event_rx, Arc::new(LogNotifier)));

        let state = AppState::new(Arc::new(pool), cfg, event_sender);
        let router = build_router(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.state.db
    }

    /// Bearer token for a fresh customer identity
    pub fn customer(&self) -> (Uuid, String) {
        let user_id = Uuid::new_v4();
        let token = self
            .state
            .auth
            .issue_token(
                user_id,
                Some("Test Customer".to_string()),
                Some("customer@example.com".to_string()),
            )
            .expect("issue test token");
        (user_id, token)
    }

    pub async fn seed_supplier(&self, name: &str, supports_cod: bool) -> Uuid {
        let id = Uuid::new_v4();
        supplier::ActiveModel {
            id: Set(id),
            name: Set(name.to_string()),
            email: Set(Some(format!("{}@suppliers.example.com", name.to_lowercase()))),
            supports_cod: Set(supports_cod),
            lead_time_days: Set(3),
            is_active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("seed supplier");
        id
    }

    pub async fn seed_product(&self, seed: ProductSeed) -> Uuid {
        let id = Uuid::new_v4();
        product::ActiveModel {
            id: Set(id),
            name: Set(seed.name.to_string()),
            price: Set(seed.price),
            stock: Set(seed.stock),
            cod_allowed: Set(seed.cod_allowed),
            supplier_id: Set(seed.supplier_id),
            dropship_cost: Set(seed.dropship_cost),
            created_at: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("seed product");
        id
    }

    pub async fn add_to_cart(&self, token: &str, product_id: Uuid, quantity: i32) {
        let response = self
            .request(
                Method::POST,
                "/api/v1/cart",
                Some(serde_json::json!({ "product_id": product_id, "quantity": quantity })),
                Some(token),
            )
            .await;
        assert!(
            response.status().is_success(),
            "add to cart failed: {}",
            response.status()
        );
    }

    pub async fn stock_of(&self, product_id: Uuid) -> Option<i32> {
        product::Entity::find_by_id(product_id)
            .one(self.db())
            .await
            .expect("load product")
            .expect("product exists")
            .stock
    }

    pub async fn cart_len(&self, user_id: Uuid) -> u64 {
        cart_item::Entity::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .count(self.db())
            .await
            .expect("count cart")
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let body = body.map(|json| serde_json::to_vec(&json).expect("serialize request body"));
        self.send(method, uri, body, token, &[]).await
    }

    /// Raw request; the body is sent byte-for-byte.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<Vec<u8>>,
        token: Option<&str>,
        headers: &[(&str, String)],
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }
        for (name, value) in headers {
            builder = builder.header(*name, value.as_str());
        }
        let body = match body {
            Some(bytes) => {
                builder = builder.header("content-type", "application/json");
                Body::from(bytes)
            }
            None => Body::empty(),
        };
        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Payment webhook, signed when the app was built with a payment secret.
    pub async fn payment_webhook(&self, payload: Value) -> Response {
        let body = serde_json::to_vec(&payload).expect("serialize webhook");
        let headers = match self.state.config.payment_webhook_secret.as_deref() {
            Some(secret) => signed_headers(secret, &body),
            None => Vec::new(),
        };
        self.send(Method::POST, "/api/v1/payments/webhook", Some(body), None, &headers)
            .await
    }

    pub async fn supplier_webhook(&self, payload: Value) -> Response {
        let body = serde_json::to_vec(&payload).expect("serialize webhook");
        self.send(Method::POST, "/api/v1/dropship/webhook", Some(body), None, &[])
            .await
    }

    pub async fn checkout(&self, token: &str, body: Option<Value>) -> Response {
        self.request(Method::POST, "/api/v1/checkout", body, Some(token))
            .await
    }
}

pub fn signed_headers(secret: &str, body: &[u8]) -> Vec<(&'static str, String)> {
    let ts = Utc::now().timestamp().to_string();
    let sig = sign(secret, &ts, body).expect("hmac accepts any key");
    vec![(TIMESTAMP_HEADER, ts), (SIGNATURE_HEADER, sig)]
}

pub async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("response is json")
}

/// Decimal fields render as strings with two places.
pub fn money(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
