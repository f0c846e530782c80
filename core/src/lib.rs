//! # Wishlist Core
//!
//! Reservation aggregation, anonymized event construction and per-wishlist
//! broadcast for anonymous gift wishlists.
//!
//! ## Core Concepts
//!
//! - **Aggregator**: Derives `(reserved_total, contributors_count)` per item and
//!   rejects any submission that would overbook it
//! - **Event factory**: Turns an item state change into a wire message that
//!   carries no reserver identity
//! - **Broadcast hub**: Fans one serialized message out to every live
//!   subscriber of a wishlist
//! - **Service**: Sequences aggregate, event and broadcast so subscribers only
//!   ever see committed state
//! - **Catalog service**: Owner-side creation of wishlists and items
//!
//! ## Architecture Principles
//!
//! - Per-item consistency boundary, no global lock
//! - Storage, catalog, clock and notifier injected via traits
//! - Broadcast failures never reach the submitter
//!
//! ## Example
//!
//! ```ignore
//! use wishlist_core::*;
//!
//! let aggregator = Arc::new(ReservationAggregator::new(store, catalog.clone(), Arc::new(SystemClock)));
//! let hub = Arc::new(BroadcastHub::new(Duration::from_secs(2)));
//! let service = ReservationService::new(aggregator, catalog, hub, Arc::new(NoopNotifier));
//!
//! let receipt = service
//!     .reserve(item_id, ReservationRequest::Partial { amount: Money::from_cents(2_500) })
//!     .await?;
//! ```

#![forbid(unsafe_code)]

pub mod aggregator;
pub mod catalog;
pub mod error;
pub mod event;
pub mod hub;
pub mod service;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use aggregator::{ReservationAggregator, ReservationOutcome, ReservationRequest};
pub use catalog::{CatalogError, CatalogService, ItemDraft, WishlistDraft};
pub use chrono::{DateTime, Utc};
pub use environment::{Clock, SystemClock};
pub use error::{OverbookingReason, ReservationError, StoreError};
pub use event::{ItemEventType, ItemState, ReservationView, WishlistMessage, build_item_state_event};
pub use hub::{BroadcastHub, DeliveryError, PublishReport, SubscriberSink, Subscription, SubscriptionId};
pub use service::{PublicItem, PublicWishlist, ReservationReceipt, ReservationService};
pub use store::{Catalog, CatalogAdmin, NoopNotifier, Notifier, ReservationStore};
pub use types::{
    Aggregate, Item, ItemId, Money, NewReservation, OwnerId, Reservation, ReservationId,
    ReservationStatus, ReserverToken, Wishlist, WishlistId,
};

/// Environment module - Dependency injection traits
///
/// External dependencies the core needs but does not own. Production wiring
/// uses [`SystemClock`]; tests inject a fixed clock from `wishlist-testing`.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
