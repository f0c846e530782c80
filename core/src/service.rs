//! Reservation workflow: aggregate, then broadcast, then notify.
//!
//! ```text
//! reserve/contribute/cancel
//!   │
//!   ├─ ReservationAggregator     (per-item boundary; commit)
//!   ├─ build_item_state_event    (after commit, boundary released)
//!   ├─ BroadcastHub::publish     (item's wishlist only)
//!   └─ tokio::spawn(notify)      (fire-and-forget; never blocks the caller)
//! ```
//!
//! The submitter's result depends only on the aggregator. Broadcast and
//! notification failures are logged and absorbed.

use crate::aggregator::{ReservationAggregator, ReservationOutcome, ReservationRequest};
use crate::error::{ReservationError, Result};
use crate::event::{ItemEventType, build_item_state_event};
use crate::hub::{BroadcastHub, PublishReport};
use crate::store::{Catalog, Notifier};
use crate::types::{
    Aggregate, Item, ItemId, Money, OwnerId, ReservationId, ReserverToken, WishlistId,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// What the submitter gets back after an accepted reservation.
#[derive(Clone, Debug)]
pub struct ReservationReceipt {
    /// The new reservation
    pub reservation_id: ReservationId,
    /// Token that authorizes cancellation; only ever returned here
    pub reserver_token: ReserverToken,
    /// Item that was reserved
    pub item_id: ItemId,
    /// Item aggregate after the change
    pub aggregate: Aggregate,
    /// How the change was broadcast
    pub broadcast: PublishReport,
}

/// Item as shown on the public wishlist page.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PublicItem {
    /// Item ID
    pub id: ItemId,
    /// Owning wishlist
    pub wishlist_id: WishlistId,
    /// Display title
    pub title: String,
    /// Target price in major units
    pub price: Option<f64>,
    /// Whether partial contributions are accepted
    pub allow_contributions: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Display ordering
    pub sort_order: i32,
    /// Sum of active reservations in major units
    pub reserved_total: f64,
    /// Number of active reservations
    pub contributors_count: u32,
}

impl PublicItem {
    fn new(item: Item, aggregate: Aggregate) -> Self {
        Self {
            id: item.id,
            wishlist_id: item.wishlist_id,
            title: item.title,
            price: item.price.as_ref().map(Money::as_major),
            allow_contributions: item.allow_contributions,
            created_at: item.created_at,
            sort_order: item.sort_order,
            reserved_total: aggregate.reserved_total.as_major(),
            contributors_count: aggregate.contributors_count,
        }
    }
}

/// Public, identity-free view of a wishlist.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PublicWishlist {
    /// Wishlist ID
    pub id: WishlistId,
    /// Owner of the wishlist
    pub owner_id: OwnerId,
    /// Display title
    pub title: String,
    /// Optional description
    pub description: Option<String>,
    /// Public slug
    pub public_slug: String,
    /// Optional occasion date
    pub deadline: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Items ordered by `(sort_order, created_at)`
    pub items: Vec<PublicItem>,
}

/// Orchestrates the aggregator, hub and notifier.
#[derive(Clone)]
pub struct ReservationService {
    aggregator: Arc<ReservationAggregator>,
    catalog: Arc<dyn Catalog>,
    hub: Arc<BroadcastHub>,
    notifier: Arc<dyn Notifier>,
}

impl ReservationService {
    /// Wire a service from its collaborators.
    #[must_use]
    pub fn new(
        aggregator: Arc<ReservationAggregator>,
        catalog: Arc<dyn Catalog>,
        hub: Arc<BroadcastHub>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            aggregator,
            catalog,
            hub,
            notifier,
        }
    }

    /// The aggregator behind this service.
    #[must_use]
    pub const fn aggregator(&self) -> &Arc<ReservationAggregator> {
        &self.aggregator
    }

    /// The hub this service publishes to.
    #[must_use]
    pub const fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    /// Submit a full reservation or contribution and broadcast the result.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the item does not exist
    /// - `Overbooking` if the item cannot take the request
    /// - `Store` if storage fails
    pub async fn reserve(
        &self,
        item_id: ItemId,
        request: ReservationRequest,
    ) -> Result<ReservationReceipt> {
        let outcome = match self.aggregator.submit_reservation(item_id, request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                record_outcome(outcome_label(&e));
                return Err(e);
            },
        };
        record_outcome("accepted");

        let event_type = if request.is_full() {
            ItemEventType::ItemReserved
        } else {
            ItemEventType::ContributionAdded
        };
        let broadcast = self.broadcast(event_type, &outcome).await;

        let message = if request.is_full() {
            format!("Someone reserved \u{201c}{}\u{201d}", outcome.item.title)
        } else {
            format!(
                "Someone contributed {} toward \u{201c}{}\u{201d}",
                outcome.reservation.amount, outcome.item.title
            )
        };
        self.spawn_owner_notification(outcome.item.wishlist_id, message);

        Ok(ReservationReceipt {
            reservation_id: outcome.reservation.id,
            reserver_token: outcome.reservation.reserver_token,
            item_id: outcome.item.id,
            aggregate: outcome.aggregate,
            broadcast,
        })
    }

    /// Cancel a reservation with its token and broadcast the new item state.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown, already cancelled or foreign reservation
    /// - `Store` if storage fails
    pub async fn cancel(
        &self,
        reservation_id: ReservationId,
        token: &ReserverToken,
    ) -> Result<Aggregate> {
        let outcome = match self.aggregator.cancel_reservation(reservation_id, token).await {
            Ok(outcome) => outcome,
            Err(e) => {
                record_outcome(outcome_label(&e));
                return Err(e);
            },
        };
        record_outcome("cancelled");

        self.broadcast(ItemEventType::ReservationCancelled, &outcome)
            .await;
        Ok(outcome.aggregate)
    }

    /// Public view of a wishlist with per-item aggregates.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no wishlist has that slug
    /// - `Store` if storage fails
    pub async fn public_wishlist(&self, slug: &str) -> Result<PublicWishlist> {
        let wishlist = self
            .catalog
            .get_wishlist_by_slug(slug)
            .await?
            .ok_or_else(|| ReservationError::not_found("Wishlist", slug))?;

        let mut items = self.catalog.list_items(wishlist.id).await?;
        items.sort_by(|a, b| {
            a.sort_order
                .cmp(&b.sort_order)
                .then(a.created_at.cmp(&b.created_at))
        });

        let mut public_items = Vec::with_capacity(items.len());
        for item in items {
            let aggregate = self.aggregator.compute_aggregate(item.id).await?;
            public_items.push(PublicItem::new(item, aggregate));
        }

        Ok(PublicWishlist {
            id: wishlist.id,
            owner_id: wishlist.owner_id,
            title: wishlist.title,
            description: wishlist.description,
            public_slug: wishlist.public_slug,
            deadline: wishlist.deadline,
            created_at: wishlist.created_at,
            items: public_items,
        })
    }

    /// Whether a wishlist exists. Used to validate WebSocket subscriptions.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the catalog read fails.
    pub async fn wishlist_exists(&self, wishlist_id: WishlistId) -> Result<bool> {
        Ok(self.catalog.get_wishlist(wishlist_id).await?.is_some())
    }

    async fn broadcast(
        &self,
        event_type: ItemEventType,
        outcome: &ReservationOutcome,
    ) -> PublishReport {
        let event = build_item_state_event(
            event_type,
            outcome.item.id,
            &outcome.aggregate,
            &outcome.active_reservations,
        );
        self.hub.publish(outcome.item.wishlist_id, &event).await
    }

    fn spawn_owner_notification(&self, wishlist_id: WishlistId, message: String) {
        let catalog = Arc::clone(&self.catalog);
        let notifier = Arc::clone(&self.notifier);

        tokio::spawn(async move {
            let wishlist = match catalog.get_wishlist(wishlist_id).await {
                Ok(Some(wishlist)) => wishlist,
                Ok(None) => return,
                Err(e) => {
                    warn!(%wishlist_id, error = %e, "Owner lookup failed, skipping notification");
                    return;
                },
            };
            let Some(owner_key) = wishlist.owner_notification_key.as_deref() else {
                return;
            };

            let sent = notifier
                .notify_owner(owner_key, &wishlist.title, &message)
                .await;
            debug!(%wishlist_id, sent, "Owner notification attempted");
        });
    }
}

const fn outcome_label(error: &ReservationError) -> &'static str {
    match error {
        ReservationError::NotFound { .. } => "not_found",
        ReservationError::Overbooking(_) => "rejected",
        ReservationError::Store(_) => "error",
    }
}

fn record_outcome(outcome: &'static str) {
    metrics::counter!("wishlist_reservations_total", "outcome" => outcome).increment(1);
}
