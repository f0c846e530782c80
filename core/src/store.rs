//! Collaborator traits: reservation storage, catalog lookups and writes, owner
//! notifications.
//!
//! The aggregator only ever talks to these traits. Two implementations ship
//! with the workspace:
//!
//! - `PostgresStore` (in `wishlist-postgres`): durable storage
//! - `InMemoryReservationStore` / `InMemoryCatalog` (in `wishlist-testing`):
//!   fast, deterministic tests and database-less development
//!
//! # Dyn Compatibility
//!
//! Methods return `Pin<Box<dyn Future>>` instead of using `async fn` so the
//! traits can be held as `Arc<dyn ReservationStore>` inside shared state.

use crate::error::StoreError;
use crate::types::{Item, ItemId, NewReservation, Reservation, ReservationId, Wishlist, WishlistId};
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by store and catalog methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Durable reservation rows keyed by item.
///
/// Cancellation strategy (soft or hard delete) is up to the implementation;
/// the only requirement is that `list_active_reservations` excludes cancelled
/// rows.
pub trait ReservationStore: Send + Sync {
    /// All active reservations for an item, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backing storage fails.
    fn list_active_reservations(&self, item_id: ItemId) -> StoreFuture<'_, Vec<Reservation>>;

    /// Persist a new active reservation and return the stored row.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backing storage fails.
    fn insert_reservation(&self, reservation: NewReservation) -> StoreFuture<'_, Reservation>;

    /// Look up a reservation regardless of status.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backing storage fails.
    fn get_reservation(&self, id: ReservationId) -> StoreFuture<'_, Option<Reservation>>;

    /// Mark a reservation cancelled. Returns `false` if it was not active.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backing storage fails.
    fn cancel_reservation(&self, id: ReservationId) -> StoreFuture<'_, bool>;
}

/// Read-only view of wishlists and their items.
pub trait Catalog: Send + Sync {
    /// Look up a single item.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backing storage fails.
    fn get_item(&self, item_id: ItemId) -> StoreFuture<'_, Option<Item>>;

    /// Look up a wishlist by ID.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backing storage fails.
    fn get_wishlist(&self, id: WishlistId) -> StoreFuture<'_, Option<Wishlist>>;

    /// Look up a wishlist by its public slug.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backing storage fails.
    fn get_wishlist_by_slug<'a>(&'a self, slug: &'a str) -> StoreFuture<'a, Option<Wishlist>>;

    /// Items of a wishlist ordered by `(sort_order, created_at)`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backing storage fails.
    fn list_items(&self, wishlist_id: WishlistId) -> StoreFuture<'_, Vec<Item>>;
}

/// Owner-side writes to the catalog.
///
/// Kept apart from [`Catalog`] so the reservation path only ever sees a
/// read-only view.
pub trait CatalogAdmin: Send + Sync {
    /// Store a new wishlist.
    ///
    /// Returns `None` without writing anything if its public slug is taken.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backing storage fails.
    fn create_wishlist(&self, wishlist: Wishlist) -> StoreFuture<'_, Option<Wishlist>>;

    /// Store a new item. The caller has already checked that its wishlist exists.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backing storage fails.
    fn create_item(&self, item: Item) -> StoreFuture<'_, Item>;

    /// Replace the owner's notification key. `false` for an unknown wishlist.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backing storage fails.
    fn set_notification_key(&self, id: WishlistId, key: Option<String>) -> StoreFuture<'_, bool>;
}

/// Best-effort push notification to a wishlist owner.
///
/// Implementations must never fail loudly: the return value only reports
/// whether the message went out, and callers ignore it beyond logging.
pub trait Notifier: Send + Sync {
    /// Send `title`/`message` to the owner identified by `owner_key`.
    fn notify_owner<'a>(
        &'a self,
        owner_key: &'a str,
        title: &'a str,
        message: &'a str,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>>;
}

/// Notifier that drops every message. Used when push is not configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify_owner<'a>(
        &'a self,
        _owner_key: &'a str,
        _title: &'a str,
        _message: &'a str,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        Box::pin(async { false })
    }
}
