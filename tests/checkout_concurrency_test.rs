mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use common::{json_body, ProductSeed, TestApp};
use dropship_checkout::entities::order;
use futures::future::join_all;
use rust_decimal_macros::dec;
use sea_orm::{EntityTrait, PaginatorTrait};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn double_submit_creates_exactly_one_order() {
    let app = Arc::new(TestApp::new().await);
    let (user_id, token) = app.customer();
    let p = app.seed_product(ProductSeed::new("Kettle", dec!(10.00)).stock(10)).await;
    app.add_to_cart(&token, p, 2).await;

    let handles = (0..2).map(|_| {
        let app = app.clone();
        let token = token.clone();
        tokio::spawn(async move {
            let response = app.checkout(&token, None).await;
            let status = response.status();
            (status, json_body(response).await)
        })
    });
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.expect("checkout task panicked"))
        .collect();

    let created = results.iter().filter(|(s, _)| *s == StatusCode::CREATED).count();
    assert_eq!(created, 1);
    let (status, body) = results
        .iter()
        .find(|(s, _)| *s != StatusCode::CREATED)
        .unwrap();
    assert_eq!(*status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "empty_cart");

    assert_eq!(order::Entity::find().count(app.db()).await.unwrap(), 1);
    assert_eq!(app.stock_of(p).await, Some(8));
    assert_eq!(app.cart_len(user_id).await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stock_is_never_oversold() {
    let app = Arc::new(TestApp::new().await);
    let p = app.seed_product(ProductSeed::new("Limited", dec!(5.00)).stock(3)).await;

    let mut tokens = Vec::new();
    for _ in 0..6 {
        let (_, token) = app.customer();
        app.add_to_cart(&token, p, 1).await;
        tokens.push(token);
    }

    let handles = tokens.into_iter().map(|token| {
        let app = app.clone();
        tokio::spawn(async move {
            let response = app.checkout(&token, None).await;
            let status = response.status();
            (status, json_body(response).await)
        })
    });
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.expect("checkout task panicked"))
        .collect();

    let created = results.iter().filter(|(s, _)| *s == StatusCode::CREATED).count();
    assert_eq!(created, 3);
    for (status, body) in results.iter().filter(|(s, _)| *s != StatusCode::CREATED) {
        assert_eq!(*status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "insufficient_stock");
    }

    assert_eq!(app.stock_of(p).await, Some(0));
    assert_eq!(order::Entity::find().count(app.db()).await.unwrap(), 3);
}
