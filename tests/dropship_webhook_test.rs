mod common;

use axum::http::StatusCode;
use common::{json_body, ProductSeed, TestApp};
use dropship_checkout::entities::{
    fulfillment::{self, FulfillmentStatus},
    order::{self, OrderStatus},
};
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;
use serde_json::json;
use uuid::Uuid;

/// COD order split across two suppliers; returns (order id, fulfillment ids).
async fn two_supplier_order(app: &TestApp) -> (Uuid, Vec<Uuid>) {
    let (_, token) = app.customer();
    let s1 = app.seed_supplier("North", true).await;
    let s2 = app.seed_supplier("South", true).await;
    let a = app.seed_product(ProductSeed::new("A", dec!(10.00)).supplier(s1)).await;
    let b = app.seed_product(ProductSeed::new("B", dec!(5.00)).supplier(s2)).await;
    app.add_to_cart(&token, a, 1).await;
    app.add_to_cart(&token, b, 1).await;

    let body = json_body(app.checkout(&token, None).await).await;
    let order_id = body["order_id"].as_str().unwrap().parse().unwrap();
    let ids = body["fulfillments"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["id"].as_str().unwrap().parse().unwrap())
        .collect();
    (order_id, ids)
}

/// ONLINE order with one supplier; returns (order id, fulfillment id, payment reference).
async fn unpaid_order(app: &TestApp) -> (Uuid, Uuid, String) {
    let (_, token) = app.customer();
    let s = app.seed_supplier("East", true).await;
    let p = app.seed_product(ProductSeed::new("C", dec!(8.00)).stock(5).supplier(s)).await;
    app.add_to_cart(&token, p, 1).await;

    let body = json_body(
        app.checkout(&token, Some(json!({ "payment_method": "ONLINE" })))
            .await,
    )
    .await;
    (
        body["order_id"].as_str().unwrap().parse().unwrap(),
        body["fulfillments"][0]["id"].as_str().unwrap().parse().unwrap(),
        body["payment"]["provider_order_id"].as_str().unwrap().to_string(),
    )
}

async fn load_order(app: &TestApp, id: Uuid) -> order::Model {
    order::Entity::find_by_id(id).one(app.db()).await.unwrap().unwrap()
}

async fn load(app: &TestApp, id: Uuid) -> fulfillment::Model {
    fulfillment::Entity::find_by_id(id)
        .one(app.db())
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn supplier_update_records_tracking() {
    let app = TestApp::new().await;
    let (_, ids) = two_supplier_order(&app).await;

    let response = app
        .supplier_webhook(json!({
            "fulfillment_id": ids[0],
            "status": "accepted",
            "carrier": "DHL",
            "tracking_no": "JD0001",
            "tracking_url": "https://track.example.com/JD0001"
        }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["detail"], "Updated");
    assert_eq!(body["status"], "ACCEPTED");

    let saved = load(&app, ids[0]).await;
    assert_eq!(saved.status, FulfillmentStatus::Accepted);
    assert_eq!(saved.carrier, "DHL");
    assert_eq!(saved.tracking_number, "JD0001");
    assert_eq!(saved.tracking_url.as_deref(), Some("https://track.example.com/JD0001"));
}

#[tokio::test]
async fn legacy_status_aliases_are_accepted() {
    let app = TestApp::new().await;
    let (_, ids) = two_supplier_order(&app).await;

    for (alias, expected) in [
        ("sent", FulfillmentStatus::Placed),
        ("CONFIRMED", FulfillmentStatus::Accepted),
        ("canceled", FulfillmentStatus::Cancelled),
    ] {
        let response = app
            .supplier_webhook(json!({ "fulfillment_id": ids[1], "status": alias }))
            .await;
        assert_eq!(response.status(), StatusCode::OK, "alias {}", alias);
        assert_eq!(load(&app, ids[1]).await.status, expected);
    }
}

#[tokio::test]
async fn unknown_fulfillment_is_not_found() {
    let app = TestApp::new().await;
    let response = app
        .supplier_webhook(json!({ "fulfillment_id": Uuid::new_v4(), "status": "BOGUS" }))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_status_is_rejected_without_change() {
    let app = TestApp::new().await;
    let (_, ids) = two_supplier_order(&app).await;

    let response = app
        .supplier_webhook(json!({ "fulfillment_id": ids[0], "status": "LOST_AT_SEA" }))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["kind"], "invalid_fulfillment_status");
    assert_eq!(load(&app, ids[0]).await.status, FulfillmentStatus::Placed);
}

#[tokio::test]
async fn order_is_fulfilled_once_every_supplier_ships() {
    let app = TestApp::new().await;
    let (order_id, ids) = two_supplier_order(&app).await;
    assert_eq!(ids.len(), 2);

    app.supplier_webhook(json!({ "fulfillment_id": ids[0], "status": "SHIPPED", "tracking_no": "T1" }))
        .await;
    let order = order::Entity::find_by_id(order_id).one(app.db()).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Placed);

    app.supplier_webhook(json!({ "fulfillment_id": ids[1], "status": "SHIPPED", "tracking_no": "T2" }))
        .await;
    let order = order::Entity::find_by_id(order_id).one(app.db()).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Fulfilled);
}

#[tokio::test]
async fn status_never_moves_backwards() {
    let app = TestApp::new().await;
    let (_, ids) = two_supplier_order(&app).await;

    app.supplier_webhook(json!({ "fulfillment_id": ids[0], "status": "SHIPPED" }))
        .await;
    let response = app
        .supplier_webhook(json!({ "fulfillment_id": ids[0], "status": "PLACED" }))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(response).await["kind"], "invalid_fulfillment_transition");
    assert_eq!(load(&app, ids[0]).await.status, FulfillmentStatus::Shipped);

    let response = app
        .supplier_webhook(json!({ "fulfillment_id": ids[1], "status": "CREATED" }))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(load(&app, ids[1]).await.status, FulfillmentStatus::Placed);
}

#[tokio::test]
async fn unpaid_order_cannot_ship() {
    let app = TestApp::new().await;
    let (order_id, fulfillment_id, reference) = unpaid_order(&app).await;

    let response = app
        .supplier_webhook(json!({ "fulfillment_id": fulfillment_id, "status": "SHIPPED" }))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(response).await["kind"], "fulfillment_awaiting_payment");
    assert_eq!(load(&app, fulfillment_id).await.status, FulfillmentStatus::Pending);

    let paid = app
        .payment_webhook(json!({ "provider_order_id": reference, "status": "PAID" }))
        .await;
    assert_eq!(paid.status(), StatusCode::OK);
    assert_eq!(load(&app, fulfillment_id).await.status, FulfillmentStatus::Placed);

    let response = app
        .supplier_webhook(json!({ "fulfillment_id": fulfillment_id, "status": "SHIPPED" }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(load_order(&app, order_id).await.status, OrderStatus::Fulfilled);
}

#[tokio::test]
async fn cancelled_fulfillment_stays_cancelled() {
    let app = TestApp::new().await;
    let (order_id, fulfillment_id, reference) = unpaid_order(&app).await;

    let failed = app
        .payment_webhook(json!({ "provider_order_id": reference, "status": "FAILED" }))
        .await;
    assert_eq!(failed.status(), StatusCode::BAD_REQUEST);
    assert_eq!(load(&app, fulfillment_id).await.status, FulfillmentStatus::Cancelled);

    for status in ["SHIPPED", "PLACED", "PENDING"] {
        let response = app
            .supplier_webhook(json!({ "fulfillment_id": fulfillment_id, "status": status }))
            .await;
        assert_eq!(response.status(), StatusCode::CONFLICT, "status {}", status);
    }
    assert_eq!(load(&app, fulfillment_id).await.status, FulfillmentStatus::Cancelled);
    assert_eq!(load_order(&app, order_id).await.status, OrderStatus::Cancelled);
}
