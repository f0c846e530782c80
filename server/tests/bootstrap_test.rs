//! Start-up wiring with in-memory storage.

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect
#![allow(clippy::panic)] // Tests can panic

use axum::http::{HeaderValue, StatusCode, header::AUTHORIZATION};
use axum_test::TestServer;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::time::Duration;
use wishlist_server::{Config, Storage, build, run};
use wishlist_testing::fixtures;

fn config(vars: &[(&str, &str)]) -> Config {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    Config::from_lookup(|key| vars.get(key).cloned())
}

#[tokio::test]
async fn test_in_memory_application_serves_reservations() {
    let app = build(&config(&[])).await.unwrap();
    let Storage::InMemory(catalog) = &app.storage else {
        panic!("expected in-memory storage without DATABASE_URL");
    };

    let wishlist = catalog.insert_wishlist(fixtures::wishlist("party")).await;
    let item = catalog
        .insert_item(fixtures::item(wishlist.id, Some(5_000), true))
        .await;

    let server = TestServer::new(app.router.clone()).unwrap();

    let public = server.get("/api/public/wishlists/by-slug/party").await;
    assert_eq!(public.status_code(), StatusCode::OK);

    let contribution = server
        .post(&format!("/api/public/items/{}/contribute", item.id))
        .json(&json!({ "amount": 20.0 }))
        .await;
    assert_eq!(contribution.status_code(), StatusCode::CREATED);
    let body: Value = contribution.json();
    assert_eq!(body["reserved_total"], 20.0);

    let full = server
        .post(&format!("/api/public/items/{}/reserve", item.id))
        .await;
    assert_eq!(full.status_code(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_ws_settings_flow_into_state() {
    let app = build(&config(&[("WS_MAX_CONNECTIONS", "7")])).await.unwrap();
    assert_eq!(app.state.ws.max_connections, 7);
    assert_eq!(app.storage.kind(), "in-memory");
}

#[tokio::test]
async fn test_run_stops_on_shutdown_signal() {
    let config = config(&[
        ("HOST", "127.0.0.1"),
        ("PORT", "0"),
        ("METRICS_HOST", "127.0.0.1"),
        ("METRICS_PORT", "0"),
        ("SHUTDOWN_TIMEOUT", "1"),
    ]);

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        run(config, tokio::time::sleep(Duration::from_millis(100))),
    )
    .await
    .expect("server did not stop after the shutdown signal");

    assert!(result.is_ok(), "run failed: {result:?}");
}

#[tokio::test]
async fn test_owner_api_follows_the_configured_token() {
    let disabled = build(&config(&[])).await.unwrap();
    assert!(!disabled.state.owner_api_enabled());

    let app = build(&config(&[("OWNER_API_TOKEN", "owner-secret")])).await.unwrap();
    assert!(app.state.owner_api_enabled());
    let server = TestServer::new(app.router.clone()).unwrap();

    let created = server
        .post("/api/owner/wishlists")
        .add_header(AUTHORIZATION, HeaderValue::from_static("Bearer owner-secret"))
        .json(&json!({ "title": "Housewarming" }))
        .await;
    assert_eq!(created.status_code(), StatusCode::CREATED);
    let wishlist: Value = created.json();
    let slug = wishlist["public_slug"].as_str().unwrap();

    let item = server
        .post(&format!("/api/owner/wishlists/{}/items", wishlist["id"].as_str().unwrap()))
        .add_header(AUTHORIZATION, HeaderValue::from_static("Bearer owner-secret"))
        .json(&json!({ "title": "Teapot", "price": 35.0 }))
        .await;
    assert_eq!(item.status_code(), StatusCode::CREATED);

    let public = server
        .get(&format!("/api/public/wishlists/by-slug/{slug}"))
        .await;
    assert_eq!(public.status_code(), StatusCode::OK);
    let body: Value = public.json();
    assert_eq!(body["items"][0]["title"], "Teapot");
}
