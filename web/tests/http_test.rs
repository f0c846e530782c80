//! HTTP surface: status codes, bodies and headers.

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect

mod common;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{Value, json};
use wishlist_core::types::ItemId;
use wishlist_testing::RecordingSink;
use wishlist_web::{WsSettings, build_router, cors_layer};

async fn server() -> (TestServer, common::TestApp) {
    let app = common::app(WsSettings::default()).await;
    let router = build_router(app.state.clone(), cors_layer(&["*".to_string()]));
    (TestServer::new(router).unwrap(), app)
}

fn token_header(token: &str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-reserver-token"),
        HeaderValue::from_str(token).unwrap(),
    )
}

#[tokio::test]
async fn test_health_and_readiness() {
    let (server, _app) = server().await;

    let health = server.get("/health").await;
    assert_eq!(health.status_code(), StatusCode::OK);
    assert_eq!(health.text(), "ok");

    let ready = server.get("/ready").await;
    assert_eq!(ready.status_code(), StatusCode::OK);
    let body: Value = ready.json();
    assert_eq!(body["status"], "ready");
    assert_eq!(body["connections"], 0);
}

#[tokio::test]
async fn test_every_response_carries_a_request_id() {
    let (server, _app) = server().await;

    let response = server.get("/health").await;
    let request_id = response.header("x-request-id");
    assert!(!request_id.is_empty());
}

#[tokio::test]
async fn test_public_wishlist_by_slug() {
    let (server, app) = server().await;

    let response = server.get("/api/public/wishlists/by-slug/birthday").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["id"], app.wishlist.id.to_string());
    assert_eq!(body["public_slug"], "birthday");
    assert_eq!(body["items"][0]["id"], app.item.id.to_string());
    assert_eq!(body["items"][0]["price"], 100.0);
    assert_eq!(body["items"][0]["reserved_total"], 0.0);
    assert!(body.get("owner_notification_key").is_none());

    let missing = server.get("/api/public/wishlists/by-slug/nope").await;
    assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
    let body: Value = missing.json();
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_contributions_follow_the_overbooking_rules() {
    let (server, app) = server().await;
    let path = format!("/api/public/items/{}/contribute", app.item.id);

    let first = server.post(&path).json(&json!({ "amount": 60.0 })).await;
    assert_eq!(first.status_code(), StatusCode::CREATED);
    let body: Value = first.json();
    assert_eq!(body["reserved_total"], 60.0);
    assert_eq!(body["contributors_count"], 1);
    assert!(body["reserver_token"].as_str().is_some_and(|t| !t.is_empty()));

    let too_much = server.post(&path).json(&json!({ "amount": 50.0 })).await;
    assert_eq!(too_much.status_code(), StatusCode::CONFLICT);
    let body: Value = too_much.json();
    assert_eq!(body["code"], "CONFLICT");
    assert_eq!(body["message"], "amount exceeds the remaining 40.00");

    let exact = server.post(&path).json(&json!({ "amount": 40.0 })).await;
    assert_eq!(exact.status_code(), StatusCode::CREATED);
    let body: Value = exact.json();
    assert_eq!(body["reserved_total"], 100.0);
    assert_eq!(body["contributors_count"], 2);

    let after_full = server.post(&path).json(&json!({ "amount": 0.01 })).await;
    assert_eq!(after_full.status_code(), StatusCode::CONFLICT);

    let reserve = server
        .post(&format!("/api/public/items/{}/reserve", app.item.id))
        .await;
    assert_eq!(reserve.status_code(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_full_reservation_without_body() {
    let (server, app) = server().await;

    let response = server
        .post(&format!("/api/public/items/{}/reserve", app.item.id))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["item_id"], app.item.id.to_string());
    assert_eq!(body["reserved_total"], 100.0);
    assert_eq!(body["contributors_count"], 1);
}

#[tokio::test]
async fn test_unpriced_item_needs_a_declared_amount() {
    let (server, app) = server().await;
    let item = app
        .catalog
        .insert_item(wishlist_testing::fixtures::item(app.wishlist.id, None, true))
        .await;
    let path = format!("/api/public/items/{}/reserve", item.id);

    let without_body = server.post(&path).await;
    assert_eq!(without_body.status_code(), StatusCode::CONFLICT);
    let body: Value = without_body.json();
    assert_eq!(body["message"], "amount must be greater than zero");

    let zero = server.post(&path).json(&json!({ "amount": 0.0 })).await;
    assert_eq!(zero.status_code(), StatusCode::CONFLICT);

    let declared = server.post(&path).json(&json!({ "amount": 25.0 })).await;
    assert_eq!(declared.status_code(), StatusCode::CREATED);
    let body: Value = declared.json();
    assert_eq!(body["reserved_total"], 25.0);
    assert_eq!(body["contributors_count"], 1);
}

#[tokio::test]
async fn test_malformed_reserve_body_is_a_bad_request() {
    let (server, app) = server().await;

    let response = server
        .post(&format!("/api/public/items/{}/reserve", app.item.id))
        .text("{\"amount\": ")
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "BAD_REQUEST");

    let public = server.get("/api/public/wishlists/by-slug/birthday").await;
    let body: Value = public.json();
    assert_eq!(body["items"][0]["contributors_count"], 0);
}

#[tokio::test]
async fn test_oversized_contribution_is_rejected() {
    let (server, app) = server().await;
    let item = app
        .catalog
        .insert_item(wishlist_testing::fixtures::item(app.wishlist.id, None, true))
        .await;

    let response = server
        .post(&format!("/api/public/items/{}/contribute", item.id))
        .json(&json!({ "amount": 1e30 }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    let body: Value = response.json();
    assert!(body["message"].as_str().unwrap().starts_with("amount must not exceed"));
}

#[tokio::test]
async fn test_negative_contribution_is_rejected() {
    let (server, app) = server().await;

    let response = server
        .post(&format!("/api/public/items/{}/contribute", app.item.id))
        .json(&json!({ "amount": -5.0 }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["message"], "amount must be greater than zero");
}

#[tokio::test]
async fn test_unknown_item_is_not_found() {
    let (server, _app) = server().await;

    let response = server
        .post(&format!("/api/public/items/{}/reserve", ItemId::new()))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cancel_requires_the_matching_token() {
    let (server, app) = server().await;

    let created: Value = server
        .post(&format!("/api/public/items/{}/contribute", app.item.id))
        .json(&json!({ "amount": 25.0 }))
        .await
        .json();
    let reservation_id = created["reservation_id"].as_str().unwrap().to_string();
    let token = created["reserver_token"].as_str().unwrap().to_string();
    let path = format!("/api/public/reservations/{reservation_id}");

    let missing = server.delete(&path).await;
    assert_eq!(missing.status_code(), StatusCode::BAD_REQUEST);

    let (name, value) = token_header("not-the-token");
    let wrong = server.delete(&path).add_header(name, value).await;
    assert_eq!(wrong.status_code(), StatusCode::NOT_FOUND);

    let (name, value) = token_header(&token);
    let cancelled = server.delete(&path).add_header(name, value).await;
    assert_eq!(cancelled.status_code(), StatusCode::OK);
    let body: Value = cancelled.json();
    assert_eq!(body["reservation_id"], reservation_id);
    assert_eq!(body["reserved_total"], 0.0);
    assert_eq!(body["contributors_count"], 0);

    let (name, value) = token_header(&token);
    let again = server.delete(&path).add_header(name, value).await;
    assert_eq!(again.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_accepted_contribution_reaches_wishlist_subscribers() {
    let (server, app) = server().await;
    let sink = RecordingSink::new();
    app.hub.subscribe(sink.clone(), app.wishlist.id);

    let created: Value = server
        .post(&format!("/api/public/items/{}/contribute", app.item.id))
        .json(&json!({ "amount": 10.0 }))
        .await
        .json();

    let messages = sink.received_json().await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["type"], "contribution_added");
    assert_eq!(messages[0]["reservations"][0]["id"], created["reservation_id"]);
    let raw = messages[0].to_string();
    assert!(!raw.contains(created["reserver_token"].as_str().unwrap()));
}
