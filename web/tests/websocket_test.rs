//! WebSocket round-trips against a real listener.

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect
#![allow(clippy::panic)] // Tests can panic on unexpected frames

mod common;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use wishlist_core::aggregator::ReservationRequest;
use wishlist_core::hub::BroadcastHub;
use wishlist_core::types::{Money, WishlistId};
use wishlist_web::{WsSettings, build_router, cors_layer};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn serve(app: &common::TestApp) -> SocketAddr {
    let router = build_router(app.state.clone(), cors_layer(&["*".to_string()]));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr, wishlist_id: WishlistId) -> Result<Client, WsError> {
    let url = format!("ws://{addr}/api/ws/wishlist/{wishlist_id}");
    connect_async(url).await.map(|(stream, _response)| stream)
}

async fn wait_for_subscribers(hub: &BroadcastHub, wishlist_id: WishlistId, expected: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while hub.subscriber_count(wishlist_id) != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("subscriber count never reached the expected value");
}

/// Next text frame as JSON, skipping control frames.
async fn next_json(client: &mut Client) -> Value {
    let frame = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match client.next().await {
                Some(Ok(Message::Text(text))) => return text,
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {},
                other => panic!("unexpected frame: {other:?}"),
            }
        }
    })
    .await
    .expect("no text frame received");
    serde_json::from_str(&frame).unwrap()
}

#[tokio::test]
async fn test_subscriber_receives_item_state_changes() {
    let app = common::app(WsSettings::default()).await;
    let addr = serve(&app).await;

    let mut client = connect(addr, app.wishlist.id).await.unwrap();
    wait_for_subscribers(&app.hub, app.wishlist.id, 1).await;

    let receipt = app
        .state
        .service
        .reserve(
            app.item.id,
            ReservationRequest::Partial {
                amount: Money::from_cents(6_000),
            },
        )
        .await
        .unwrap();
    assert_eq!(receipt.broadcast.delivered, 1);

    let event = next_json(&mut client).await;
    assert_eq!(event["type"], "contribution_added");
    assert_eq!(event["item_id"], app.item.id.to_string());
    assert_eq!(event["reserved_total"], 60.0);
    assert_eq!(event["contributors_count"], 1);
    assert_eq!(event["reservations"][0]["amount"], 60.0);
    assert_eq!(event["reservations"][0]["is_full_reservation"], false);
}

#[tokio::test]
async fn test_text_ping_is_answered_with_pong() {
    let app = common::app(WsSettings::default()).await;
    let addr = serve(&app).await;

    let mut client = connect(addr, app.wishlist.id).await.unwrap();
    client.send(Message::Text("ping".to_string())).await.unwrap();

    let reply = next_json(&mut client).await;
    assert_eq!(reply, serde_json::json!({ "type": "pong" }));
}

#[tokio::test]
async fn test_other_payloads_are_ignored_and_keep_the_socket_open() {
    let app = common::app(WsSettings::default()).await;
    let addr = serve(&app).await;

    let mut client = connect(addr, app.wishlist.id).await.unwrap();
    client.send(Message::Text("hello".to_string())).await.unwrap();
    client
        .send(Message::Text(r#"{"type":"subscribe"}"#.to_string()))
        .await
        .unwrap();
    client.send(Message::Binary(vec![1, 2, 3])).await.unwrap();
    client.send(Message::Text("ping".to_string())).await.unwrap();

    let reply = next_json(&mut client).await;
    assert_eq!(reply, serde_json::json!({ "type": "pong" }));
    assert_eq!(app.hub.subscriber_count(app.wishlist.id), 1);
}

#[tokio::test]
async fn test_closing_the_socket_unsubscribes() {
    let app = common::app(WsSettings::default()).await;
    let addr = serve(&app).await;

    let mut client = connect(addr, app.wishlist.id).await.unwrap();
    wait_for_subscribers(&app.hub, app.wishlist.id, 1).await;

    client.close(None).await.unwrap();
    drop(client);

    wait_for_subscribers(&app.hub, app.wishlist.id, 0).await;
    assert_eq!(app.hub.active_wishlists(), 0);
}

#[tokio::test]
async fn test_unknown_wishlist_is_refused() {
    let app = common::app(WsSettings::default()).await;
    let addr = serve(&app).await;

    match connect(addr, WishlistId::new()).await {
        Err(WsError::Http(response)) => assert_eq!(response.status(), 404),
        other => panic!("expected 404, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_connection_limit_returns_503() {
    let app = common::app(WsSettings {
        max_connections: 1,
        ..WsSettings::default()
    })
    .await;
    let addr = serve(&app).await;

    let _first = connect(addr, app.wishlist.id).await.unwrap();
    wait_for_subscribers(&app.hub, app.wishlist.id, 1).await;

    match connect(addr, app.wishlist.id).await {
        Err(WsError::Http(response)) => assert_eq!(response.status(), 503),
        other => panic!("expected 503, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_idle_connection_is_closed() {
    let app = common::app(WsSettings {
        idle_timeout: Duration::from_millis(200),
        ..WsSettings::default()
    })
    .await;
    let addr = serve(&app).await;

    let _client = connect(addr, app.wishlist.id).await.unwrap();
    wait_for_subscribers(&app.hub, app.wishlist.id, 1).await;

    wait_for_subscribers(&app.hub, app.wishlist.id, 0).await;
    tokio::time::timeout(Duration::from_secs(5), async {
        while app.state.active_connections() != 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("connection slot was never released");
}
