//! Per-wishlist broadcast hub.
//!
//! # Architecture
//!
//! ```text
//! publish(W, msg)
//!   │
//!   ├─ serialize once ──> Arc<str>
//!   ├─ snapshot subscribers[W]        (shard lock released here)
//!   └─ join_all(send + timeout) ──┬─> Ok      → delivered
//!                                 └─> Err/⏱   → unsubscribe, dropped
//! ```
//!
//! Subscribers are kept in a `DashMap` keyed by wishlist, so mutations and
//! snapshots for one wishlist never contend with another wishlist beyond the
//! shard they share. No map guard is held across an `.await`.
//!
//! A subscriber whose send fails or exceeds the per-send deadline is removed;
//! the remaining subscribers are unaffected. Missed messages are not replayed.

use crate::types::WishlistId;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, error, trace};

/// Default upper bound on a single subscriber send.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(2);

// ============================================================================
// Errors
// ============================================================================

/// A message could not be handed to one subscriber.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The peer went away.
    #[error("Connection closed")]
    Closed,

    /// The underlying transport rejected the frame.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The send did not finish within the per-send deadline.
    #[error("Send timed out after {0:?}")]
    Timeout(Duration),
}

/// Hub-level failures. Logged by `publish`, never surfaced to submitters.
#[derive(Error, Debug)]
pub enum HubError {
    /// The message could not be encoded as JSON.
    #[error("Failed to serialize message: {0}")]
    Serialization(#[from] serde_json::Error),
}

// ============================================================================
// Subscriber sink
// ============================================================================

/// Outbound half of a live connection.
///
/// The web layer implements this over a WebSocket sink; tests use recording
/// and failing sinks. The hub calls `send_text` concurrently for different
/// subscribers but never twice concurrently for the same publish.
pub trait SubscriberSink: Send + Sync {
    /// Deliver one text frame.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError` if the frame could not be written.
    fn send_text(
        &self,
        payload: Arc<str>,
    ) -> Pin<Box<dyn Future<Output = Result<(), DeliveryError>> + Send + '_>>;
}

// ============================================================================
// Subscriptions
// ============================================================================

/// Unique identifier for a subscription within one hub.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Lifecycle of a subscription. `Closed` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Created, not yet registered
    Connecting,
    /// Registered and receiving messages
    Active,
    /// Removed from the hub; never receives again
    Closed,
}

impl SubscriptionState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Active,
            _ => Self::Closed,
        }
    }
}

/// A live connection bound to one wishlist.
pub struct Subscription {
    id: SubscriptionId,
    wishlist_id: WishlistId,
    sink: Arc<dyn SubscriberSink>,
    state: AtomicU8,
    closed_signal: Notify,
}

impl Subscription {
    fn new(id: SubscriptionId, wishlist_id: WishlistId, sink: Arc<dyn SubscriberSink>) -> Self {
        Self {
            id,
            wishlist_id,
            sink,
            state: AtomicU8::new(SubscriptionState::Connecting as u8),
            closed_signal: Notify::new(),
        }
    }

    /// Subscription ID
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wishlist this subscription is bound to
    #[must_use]
    pub const fn wishlist_id(&self) -> WishlistId {
        self.wishlist_id
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> SubscriptionState {
        SubscriptionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether the subscription still receives messages
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state() == SubscriptionState::Active
    }

    /// Resolves once the subscription is `Closed`, immediately if it already is.
    pub async fn closed(&self) {
        let mut notified = std::pin::pin!(self.closed_signal.notified());
        notified.as_mut().enable();
        if self.state() != SubscriptionState::Closed {
            notified.await;
        }
    }

    fn activate(&self) -> bool {
        self.state
            .compare_exchange(
                SubscriptionState::Connecting as u8,
                SubscriptionState::Active as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Returns `true` on the transition into `Closed`.
    fn close(&self) -> bool {
        let transitioned = self.state.swap(SubscriptionState::Closed as u8, Ordering::AcqRel)
            != SubscriptionState::Closed as u8;
        if transitioned {
            self.closed_signal.notify_waiters();
        }
        transitioned
    }

    fn uses_sink(&self, sink: &Arc<dyn SubscriberSink>) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.sink), Arc::as_ptr(sink))
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("wishlist_id", &self.wishlist_id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Outcome of one `publish` call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscribers that received the message
    pub delivered: usize,
    /// Subscribers removed because their send failed or timed out
    pub dropped: usize,
}

// ============================================================================
// Hub
// ============================================================================

/// In-process registry of live subscribers, keyed by wishlist.
pub struct BroadcastHub {
    subscribers: DashMap<WishlistId, HashMap<SubscriptionId, Arc<Subscription>>>,
    send_timeout: Duration,
    next_id: AtomicU64,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_SEND_TIMEOUT)
    }
}

impl BroadcastHub {
    /// Create an empty hub with the given per-send deadline.
    #[must_use]
    pub fn new(send_timeout: Duration) -> Self {
        Self {
            subscribers: DashMap::new(),
            send_timeout,
            next_id: AtomicU64::new(1),
        }
    }

    /// Per-send deadline.
    #[must_use]
    pub const fn send_timeout(&self) -> Duration {
        self.send_timeout
    }

    /// Register `sink` for messages published to `wishlist_id`.
    ///
    /// Idempotent per sink: subscribing the same sink to the same wishlist
    /// again returns the existing subscription.
    pub fn subscribe(
        &self,
        sink: Arc<dyn SubscriberSink>,
        wishlist_id: WishlistId,
    ) -> Arc<Subscription> {
        let mut entry = self.subscribers.entry(wishlist_id).or_default();

        if let Some(existing) = entry.values().find(|s| s.uses_sink(&sink)) {
            return Arc::clone(existing);
        }

        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let subscription = Arc::new(Subscription::new(id, wishlist_id, sink));
        subscription.activate();
        entry.insert(id, Arc::clone(&subscription));

        debug!(%wishlist_id, subscription = %id, subscribers = entry.len(), "Subscriber added");
        subscription
    }

    /// Remove a subscription and mark it `Closed`.
    ///
    /// Drops the wishlist entry once its last subscriber is gone. Returns
    /// `false` if the subscription was not registered.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        subscription.close();

        match self.subscribers.entry(subscription.wishlist_id) {
            Entry::Occupied(mut occupied) => {
                let removed = occupied.get_mut().remove(&subscription.id).is_some();
                if occupied.get().is_empty() {
                    occupied.remove();
                }
                if removed {
                    debug!(
                        wishlist_id = %subscription.wishlist_id,
                        subscription = %subscription.id,
                        "Subscriber removed"
                    );
                }
                removed
            },
            Entry::Vacant(_) => false,
        }
    }

    /// Serialize `message` once and deliver it to every current subscriber of
    /// `wishlist_id`.
    ///
    /// The subscriber set is snapshotted when the call starts; subscribers
    /// added afterwards do not receive this message. Sends run concurrently
    /// and each one is bounded by the hub's send timeout. Failed subscribers
    /// are unsubscribed. A serialization failure is logged and nothing is
    /// sent.
    pub async fn publish<M>(&self, wishlist_id: WishlistId, message: &M) -> PublishReport
    where
        M: Serialize + ?Sized,
    {
        let payload = match encode(message) {
            Ok(payload) => payload,
            Err(e) => {
                error!(%wishlist_id, error = %e, "Dropping broadcast");
                return PublishReport::default();
            },
        };

        let snapshot: Vec<Arc<Subscription>> = self
            .subscribers
            .get(&wishlist_id)
            .map(|entry| entry.values().filter(|s| s.is_active()).cloned().collect())
            .unwrap_or_default();

        if snapshot.is_empty() {
            trace!(%wishlist_id, "No subscribers");
            return PublishReport::default();
        }

        let send_timeout = self.send_timeout;
        let sends = snapshot.iter().map(|subscription| {
            let payload = Arc::clone(&payload);
            async move {
                let result =
                    match tokio::time::timeout(send_timeout, subscription.sink.send_text(payload))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(DeliveryError::Timeout(send_timeout)),
                    };
                (subscription, result)
            }
        });

        let mut report = PublishReport::default();
        for (subscription, result) in join_all(sends).await {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    debug!(
                        %wishlist_id,
                        subscription = %subscription.id,
                        error = %e,
                        "Delivery failed, dropping subscriber"
                    );
                    self.unsubscribe(subscription);
                    report.dropped += 1;
                },
            }
        }

        metrics::counter!("wishlist_broadcast_deliveries_total", "outcome" => "delivered")
            .increment(report.delivered as u64);
        metrics::counter!("wishlist_broadcast_deliveries_total", "outcome" => "dropped")
            .increment(report.dropped as u64);

        debug!(
            %wishlist_id,
            delivered = report.delivered,
            dropped = report.dropped,
            "Broadcast complete"
        );
        report
    }

    /// Number of live subscribers for a wishlist.
    #[must_use]
    pub fn subscriber_count(&self, wishlist_id: WishlistId) -> usize {
        self.subscribers.get(&wishlist_id).map_or(0, |entry| entry.len())
    }

    /// Number of wishlists with at least one subscriber.
    #[must_use]
    pub fn active_wishlists(&self) -> usize {
        self.subscribers.len()
    }

    /// Total live subscribers across all wishlists.
    #[must_use]
    pub fn total_subscribers(&self) -> usize {
        self.subscribers.iter().map(|entry| entry.len()).sum()
    }
}

/// Encode a message for the wire.
///
/// # Errors
///
/// Returns `HubError::Serialization` if JSON encoding fails.
pub fn encode<M>(message: &M) -> Result<Arc<str>, HubError>
where
    M: Serialize + ?Sized,
{
    Ok(Arc::from(serde_json::to_string(message)?))
}
