mod common;

use axum::http::{Method, StatusCode};
use common::{json_body, money, ProductSeed, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn adding_the_same_product_merges_lines() {
    let app = TestApp::new().await;
    let (user_id, token) = app.customer();
    let p = app.seed_product(ProductSeed::new("Sock", dec!(5.00))).await;

    app.add_to_cart(&token, p, 1).await;
    app.add_to_cart(&token, p, 2).await;
    assert_eq!(app.cart_len(user_id).await, 1);

    let response = app.request(Method::GET, "/api/v1/cart", None, Some(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let lines = json_body(response).await;
    assert_eq!(lines[0]["quantity"], 3);
    assert_eq!(money(&lines[0]["unit_price"]), "5.00");
    assert_eq!(money(&lines[0]["line_total"]), "15.00");
}

#[tokio::test]
async fn quantity_defaults_to_one() {
    let app = TestApp::new().await;
    let (_, token) = app.customer();
    let p = app.seed_product(ProductSeed::new("Sock", dec!(5.00))).await;

    let response = app
        .request(Method::POST, "/api/v1/cart", Some(json!({ "product_id": p })), Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(json_body(response).await["quantity"], 1);
}

#[tokio::test]
async fn rejects_unknown_product_and_bad_quantity() {
    let app = TestApp::new().await;
    let (_, token) = app.customer();

    let response = app
        .request(
            Method::POST,
            "/api/v1/cart",
            Some(json!({ "product_id": Uuid::new_v4(), "quantity": 1 })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let p = app.seed_product(ProductSeed::new("Sock", dec!(5.00))).await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/cart",
            Some(json!({ "product_id": p, "quantity": 0 })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["kind"], "validation_error");
}

#[tokio::test]
async fn update_remove_and_summary() {
    let app = TestApp::new().await;
    let (user_id, token) = app.customer();
    let a = app.seed_product(ProductSeed::new("A", dec!(10.00))).await;
    let b = app.seed_product(ProductSeed::new("B", dec!(12.50))).await;
    app.add_to_cart(&token, a, 1).await;
    app.add_to_cart(&token, b, 1).await;

    let lines = json_body(app.request(Method::GET, "/api/v1/cart", None, Some(&token)).await).await;
    let line_id = |product: Uuid| {
        lines
            .as_array()
            .unwrap()
            .iter()
            .find(|l| l["product_id"] == product.to_string())
            .map(|l| l["id"].as_str().unwrap().to_string())
            .unwrap()
    };
    let a_line = line_id(a);
    let b_line = line_id(b);

    let response = app
        .request(
            Method::PATCH,
            &format!("/api/v1/cart/{}", a_line),
            Some(json!({ "quantity": 3 })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let summary = json_body(
        app.request(Method::GET, "/api/v1/cart/summary", None, Some(&token))
            .await,
    )
    .await;
    assert_eq!(summary["total_items"], 4);
    assert_eq!(money(&summary["total_price"]), "42.50");

    let response = app
        .request(Method::DELETE, &format!("/api/v1/cart/{}", b_line), None, Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(app.cart_len(user_id).await, 1);
}

#[tokio::test]
async fn cart_lines_are_private_to_their_owner() {
    let app = TestApp::new().await;
    let (_, owner) = app.customer();
    let (intruder_id, intruder) = app.customer();
    let p = app.seed_product(ProductSeed::new("Sock", dec!(5.00))).await;
    app.add_to_cart(&owner, p, 1).await;

    let lines = json_body(app.request(Method::GET, "/api/v1/cart", None, Some(&owner)).await).await;
    let line = lines[0]["id"].as_str().unwrap().to_string();

    let response = app
        .request(Method::DELETE, &format!("/api/v1/cart/{}", line), None, Some(&intruder))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .request(
            Method::PATCH,
            &format!("/api/v1/cart/{}", line),
            Some(json!({ "quantity": 9 })),
            Some(&intruder),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.cart_len(intruder_id).await, 0);
}
