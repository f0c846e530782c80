//! Owner endpoints: catalog writes behind the bearer token.

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect

mod common;

use axum::http::{HeaderName, HeaderValue, StatusCode, header::AUTHORIZATION};
use axum_test::TestServer;
use serde_json::{Value, json};
use wishlist_core::store::Catalog;
use wishlist_core::types::WishlistId;
use wishlist_web::{AppState, WsSettings, build_router, cors_layer};

fn server_for(state: AppState) -> TestServer {
    TestServer::new(build_router(state, cors_layer(&["*".to_string()]))).unwrap()
}

fn bearer(token: &str) -> (HeaderName, HeaderValue) {
    (AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}")).unwrap())
}

#[tokio::test]
async fn test_owner_builds_a_wishlist_visitors_can_reserve_from() {
    let app = common::app(WsSettings::default()).await;
    let server = server_for(app.state.clone());
    let (name, value) = bearer(common::OWNER_TOKEN);

    let created = server
        .post("/api/owner/wishlists")
        .add_header(name.clone(), value.clone())
        .json(&json!({ "title": "  Housewarming ", "owner_notification_key": "ukey" }))
        .await;
    assert_eq!(created.status_code(), StatusCode::CREATED);
    let wishlist: Value = created.json();
    assert_eq!(wishlist["title"], "Housewarming");
    assert_eq!(wishlist["notifications_enabled"], true);
    assert!(wishlist.get("owner_notification_key").is_none());
    let slug = wishlist["public_slug"].as_str().unwrap().to_string();
    assert_eq!(slug.len(), 12);
    let wishlist_id = wishlist["id"].as_str().unwrap().to_string();

    let item = server
        .post(&format!("/api/owner/wishlists/{wishlist_id}/items"))
        .add_header(name.clone(), value.clone())
        .json(&json!({ "title": "Toaster", "price": 40.0, "allow_contributions": true }))
        .await;
    assert_eq!(item.status_code(), StatusCode::CREATED);
    let item: Value = item.json();
    assert_eq!(item["price"], 40.0);
    let item_id = item["id"].as_str().unwrap().to_string();

    let public = server
        .get(&format!("/api/public/wishlists/by-slug/{slug}"))
        .await;
    assert_eq!(public.status_code(), StatusCode::OK);
    let public: Value = public.json();
    assert_eq!(public["items"][0]["id"], item_id);

    let contribution = server
        .post(&format!("/api/public/items/{item_id}/contribute"))
        .json(&json!({ "amount": 15.0 }))
        .await;
    assert_eq!(contribution.status_code(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_notification_key_can_be_set_and_cleared() {
    let app = common::app(WsSettings::default()).await;
    let server = server_for(app.state.clone());
    let (name, value) = bearer(common::OWNER_TOKEN);
    let path = format!("/api/owner/wishlists/{}/notification-key", app.wishlist.id);

    let set = server
        .put(&path)
        .add_header(name.clone(), value.clone())
        .json(&json!({ "key": " ukey " }))
        .await;
    assert_eq!(set.status_code(), StatusCode::NO_CONTENT);
    let stored = app.catalog.get_wishlist(app.wishlist.id).await.unwrap().unwrap();
    assert_eq!(stored.owner_notification_key.as_deref(), Some("ukey"));

    let cleared = server
        .put(&path)
        .add_header(name, value)
        .json(&json!({ "key": "" }))
        .await;
    assert_eq!(cleared.status_code(), StatusCode::NO_CONTENT);
    let stored = app.catalog.get_wishlist(app.wishlist.id).await.unwrap().unwrap();
    assert!(stored.owner_notification_key.is_none());
}

#[tokio::test]
async fn test_owner_requests_are_validated() {
    let app = common::app(WsSettings::default()).await;
    let server = server_for(app.state.clone());
    let (name, value) = bearer(common::OWNER_TOKEN);

    let blank = server
        .post("/api/owner/wishlists")
        .add_header(name.clone(), value.clone())
        .json(&json!({ "title": "   " }))
        .await;
    assert_eq!(blank.status_code(), StatusCode::BAD_REQUEST);

    let unknown = server
        .post(&format!("/api/owner/wishlists/{}/items", WishlistId::new()))
        .add_header(name.clone(), value.clone())
        .json(&json!({ "title": "Toaster" }))
        .await;
    assert_eq!(unknown.status_code(), StatusCode::NOT_FOUND);

    let negative = server
        .post(&format!("/api/owner/wishlists/{}/items", app.wishlist.id))
        .add_header(name, value)
        .json(&json!({ "title": "Toaster", "price": -3.0 }))
        .await;
    assert_eq!(negative.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_owner_endpoints_require_the_token() {
    let app = common::app(WsSettings::default()).await;
    let server = server_for(app.state.clone());

    let missing = server
        .post("/api/owner/wishlists")
        .json(&json!({ "title": "Party" }))
        .await;
    assert_eq!(missing.status_code(), StatusCode::UNAUTHORIZED);

    let (name, value) = bearer("guess");
    let wrong = server
        .post("/api/owner/wishlists")
        .add_header(name, value)
        .json(&json!({ "title": "Party" }))
        .await;
    assert_eq!(wrong.status_code(), StatusCode::UNAUTHORIZED);
    let body: Value = wrong.json();
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_owner_endpoints_are_refused_when_not_enabled() {
    let app = common::app(WsSettings::default()).await;
    let state = AppState::new(app.state.service.clone(), WsSettings::default());
    assert!(!state.owner_api_enabled());
    let server = server_for(state);
    let (name, value) = bearer(common::OWNER_TOKEN);

    let response = server
        .post("/api/owner/wishlists")
        .add_header(name, value)
        .json(&json!({ "title": "Party" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
}
