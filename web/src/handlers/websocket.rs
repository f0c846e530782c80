//! WebSocket endpoint for live wishlist updates.
//!
//! # Connection
//!
//! ```text
//! ws://localhost:8080/api/ws/wishlist/:wishlist_id
//! ```
//!
//! # Message Format
//!
//! **Server → Client (item state change):**
//! ```json
//! {
//!   "type": "contribution_added",
//!   "item_id": "550e8400-...",
//!   "reserved_total": 60.0,
//!   "contributors_count": 2,
//!   "reservations": [
//!     { "id": "660e8400-...", "amount": 40.0, "is_full_reservation": false, "created_at": "..." }
//!   ]
//! }
//! ```
//!
//! **Client → Server:** the text frame `ping` is answered with
//! `{"type":"pong"}`. Anything else is ignored.
//!
//! # Connection Limits
//!
//! - Upgrades above `WsSettings::max_connections` get 503
//! - Protocol ping every `WsSettings::ping_interval`
//! - Closed after `WsSettings::idle_timeout` without inbound frames
//! - Closed once the hub drops the subscription (failed or stalled send)

use crate::error::AppError;
use crate::state::{AppState, ConnectionSlot};
use axum::{
    extract::{
        Path, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::{IntoResponse, Response},
};
use futures::stream::{SplitSink, StreamExt};
use futures::SinkExt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Instant, interval};
use tracing::{debug, info, warn};
use wishlist_core::event::WishlistMessage;
use wishlist_core::hub::{self, BroadcastHub, DeliveryError, SubscriberSink, Subscription};
use wishlist_core::types::WishlistId;

type WsSender = SplitSink<WebSocket, Message>;

/// Outbound half of a WebSocket, shared by the hub, the ping task and the
/// pong replies.
struct WsSink {
    sender: Arc<Mutex<WsSender>>,
}

impl SubscriberSink for WsSink {
    fn send_text(
        &self,
        payload: Arc<str>,
    ) -> Pin<Box<dyn Future<Output = Result<(), DeliveryError>> + Send + '_>> {
        Box::pin(async move {
            let mut sender = self.sender.lock().await;
            sender
                .send(Message::Text(payload.to_string()))
                .await
                .map_err(|e| DeliveryError::Transport(e.to_string()))
        })
    }
}

/// Removes the subscription from the hub however the socket task ends.
struct SubscriptionGuard {
    hub: Arc<BroadcastHub>,
    subscription: Arc<Subscription>,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.hub.unsubscribe(&self.subscription);
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Subscribe to live updates for one wishlist.
///
/// Returns 503 when the connection limit is reached and 404 for an unknown
/// wishlist; both are decided before the upgrade.
///
/// # Example
///
/// ```javascript
/// const ws = new WebSocket('ws://localhost:8080/api/ws/wishlist/550e8400-...');
///
/// ws.onmessage = (event) => {
///   const msg = JSON.parse(event.data);
///   if (msg.type === 'contribution_added') {
///     render(msg.item_id, msg.reserved_total, msg.contributors_count);
///   }
/// };
/// ```
pub async fn wishlist_updates(
    ws: WebSocketUpgrade,
    Path(wishlist_id): Path<WishlistId>,
    State(state): State<AppState>,
) -> Response {
    let Some(slot) = state.try_acquire_connection() else {
        warn!(
            current_connections = state.active_connections(),
            "WebSocket connection limit exceeded"
        );
        return AppError::unavailable("Too many concurrent connections. Please try again later.")
            .into_response();
    };

    match state.service.wishlist_exists(wishlist_id).await {
        Ok(true) => {},
        Ok(false) => return AppError::not_found("Wishlist", wishlist_id).into_response(),
        Err(e) => return AppError::from(e).into_response(),
    }

    debug!(%wishlist_id, "WebSocket connection requested");
    ws.on_upgrade(move |socket| handle_wishlist_socket(socket, wishlist_id, state, slot))
}

// ============================================================================
// Socket Handler
// ============================================================================

async fn handle_wishlist_socket(
    socket: WebSocket,
    wishlist_id: WishlistId,
    state: AppState,
    _slot: ConnectionSlot,
) {
    let (sender, mut receiver) = socket.split();
    let sender = Arc::new(Mutex::new(sender));

    let hub = Arc::clone(state.hub());
    let sink: Arc<dyn SubscriberSink> = Arc::new(WsSink {
        sender: Arc::clone(&sender),
    });
    let subscription = hub.subscribe(sink, wishlist_id);
    let _guard = SubscriptionGuard {
        hub: Arc::clone(&hub),
        subscription: Arc::clone(&subscription),
    };

    info!(
        %wishlist_id,
        subscription_id = %subscription.id(),
        total_connections = state.active_connections(),
        "WebSocket connection established"
    );

    // Keep-alive.
    let ping_sender = Arc::clone(&sender);
    let ping_subscription = Arc::clone(&subscription);
    let mut ping_interval = interval(state.ws.ping_interval);
    let mut ping_task = tokio::spawn(async move {
        ping_interval.tick().await;
        loop {
            ping_interval.tick().await;
            if !ping_subscription.is_active() {
                break;
            }
            let mut sender_guard = ping_sender.lock().await;
            if sender_guard.send(Message::Ping(Vec::new())).await.is_err() {
                break;
            }
        }
        debug!("WebSocket ping task terminated");
    });

    let idle_timeout = state.ws.idle_timeout;
    let pong_sender = Arc::clone(&sender);
    let mut recv_task = tokio::spawn(async move {
        let timeout = tokio::time::sleep(idle_timeout);
        tokio::pin!(timeout);

        loop {
            tokio::select! {
                frame = receiver.next() => {
                    let msg = match frame {
                        Some(Ok(msg)) => msg,
                        Some(Err(e)) => {
                            debug!(error = %e, "WebSocket receive error");
                            break;
                        },
                        None => break,
                    };
                    timeout.as_mut().reset(Instant::now() + idle_timeout);

                    match msg {
                        Message::Text(text) if text.trim() == "ping" => {
                            if !reply_pong(&pong_sender).await {
                                break;
                            }
                        },
                        Message::Close(_) => {
                            debug!("Client requested close");
                            break;
                        },
                        _ => {},
                    }
                }
                () = &mut timeout => {
                    warn!("WebSocket idle timeout");
                    break;
                }
            }
        }

        debug!("WebSocket receive task terminated");
    });

    tokio::select! {
        _ = (&mut ping_task) => {
            debug!("Ping task completed, aborting receive task");
            recv_task.abort();
        },
        _ = (&mut recv_task) => {
            debug!("Receive task completed, aborting ping task");
            ping_task.abort();
        },
        () = subscription.closed() => {
            debug!("Subscription closed by hub, closing socket");
            ping_task.abort();
            recv_task.abort();
            // The peer may be the reason the hub gave up; do not wait on it for long.
            let close = async { sender.lock().await.send(Message::Close(None)).await };
            let _ = tokio::time::timeout(hub.send_timeout(), close).await;
        },
    }

    info!(
        %wishlist_id,
        subscription_id = %subscription.id(),
        "WebSocket connection closed"
    );
}

async fn reply_pong(sender: &Mutex<WsSender>) -> bool {
    let payload = match hub::encode(&WishlistMessage::Pong) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "Failed to encode pong");
            return true;
        },
    };
    sender
        .lock()
        .await
        .send(Message::Text(payload.to_string()))
        .await
        .is_ok()
}
