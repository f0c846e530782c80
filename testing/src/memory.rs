//! In-memory store and catalog.
//!
//! Fast, deterministic stand-ins for `PostgresStore`. Cancelled reservations
//! stay in the table with `status = Cancelled`, matching the soft delete the
//! database does.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use wishlist_core::error::StoreError;
use wishlist_core::store::{Catalog, CatalogAdmin, ReservationStore, StoreFuture};
use wishlist_core::types::{
    Item, ItemId, NewReservation, Reservation, ReservationId, ReservationStatus, Wishlist,
    WishlistId,
};

/// Reservation rows kept in insertion order.
///
/// # Example
///
/// ```
/// use wishlist_testing::InMemoryReservationStore;
///
/// let store = InMemoryReservationStore::new();
/// assert!(store.is_empty());
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryReservationStore {
    rows: Arc<RwLock<Vec<Reservation>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryReservationStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `StoreError::Database`.
    ///
    /// Useful for exercising the 500 path.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of rows, active or cancelled
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.try_read().map_or(0, |rows| rows.len())
    }

    /// Check if the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every row, including cancelled ones
    pub async fn all(&self) -> Vec<Reservation> {
        self.rows.read().await.clone()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Database("store unavailable".to_string()));
        }
        Ok(())
    }
}

impl ReservationStore for InMemoryReservationStore {
    fn list_active_reservations(&self, item_id: ItemId) -> StoreFuture<'_, Vec<Reservation>> {
        Box::pin(async move {
            self.check_available()?;
            // Give other tasks a chance to interleave between read and write.
            tokio::task::yield_now().await;
            let rows = self.rows.read().await;
            Ok(rows
                .iter()
                .filter(|r| r.item_id == item_id && r.is_active())
                .cloned()
                .collect())
        })
    }

    fn insert_reservation(&self, reservation: NewReservation) -> StoreFuture<'_, Reservation> {
        Box::pin(async move {
            self.check_available()?;
            let row = Reservation {
                id: ReservationId::new(),
                item_id: reservation.item_id,
                amount: reservation.amount,
                is_full_reservation: reservation.is_full_reservation,
                created_at: reservation.created_at,
                reserver_token: reservation.reserver_token,
                status: ReservationStatus::Active,
            };
            self.rows.write().await.push(row.clone());
            Ok(row)
        })
    }

    fn get_reservation(&self, id: ReservationId) -> StoreFuture<'_, Option<Reservation>> {
        Box::pin(async move {
            self.check_available()?;
            Ok(self.rows.read().await.iter().find(|r| r.id == id).cloned())
        })
    }

    fn cancel_reservation(&self, id: ReservationId) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            self.check_available()?;
            let mut rows = self.rows.write().await;
            match rows.iter_mut().find(|r| r.id == id && r.is_active()) {
                Some(row) => {
                    row.status = ReservationStatus::Cancelled;
                    Ok(true)
                },
                None => Ok(false),
            }
        })
    }
}

/// Wishlists and items held in memory.
#[derive(Clone, Debug, Default)]
pub struct InMemoryCatalog {
    wishlists: Arc<RwLock<HashMap<WishlistId, Wishlist>>>,
    items: Arc<RwLock<HashMap<ItemId, Item>>>,
}

impl InMemoryCatalog {
    /// Create an empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a wishlist and return it
    pub async fn insert_wishlist(&self, wishlist: Wishlist) -> Wishlist {
        self.wishlists
            .write()
            .await
            .insert(wishlist.id, wishlist.clone());
        wishlist
    }

    /// Add or replace an item and return it
    pub async fn insert_item(&self, item: Item) -> Item {
        self.items.write().await.insert(item.id, item.clone());
        item
    }
}

impl Catalog for InMemoryCatalog {
    fn get_item(&self, item_id: ItemId) -> StoreFuture<'_, Option<Item>> {
        Box::pin(async move { Ok(self.items.read().await.get(&item_id).cloned()) })
    }

    fn get_wishlist(&self, id: WishlistId) -> StoreFuture<'_, Option<Wishlist>> {
        Box::pin(async move { Ok(self.wishlists.read().await.get(&id).cloned()) })
    }

    fn get_wishlist_by_slug<'a>(&'a self, slug: &'a str) -> StoreFuture<'a, Option<Wishlist>> {
        Box::pin(async move {
            Ok(self
                .wishlists
                .read()
                .await
                .values()
                .find(|w| w.public_slug == slug)
                .cloned())
        })
    }

    fn list_items(&self, wishlist_id: WishlistId) -> StoreFuture<'_, Vec<Item>> {
        Box::pin(async move {
            let mut items: Vec<Item> = self
                .items
                .read()
                .await
                .values()
                .filter(|i| i.wishlist_id == wishlist_id)
                .cloned()
                .collect();
            items.sort_by(|a, b| {
                a.sort_order
                    .cmp(&b.sort_order)
                    .then(a.created_at.cmp(&b.created_at))
            });
            Ok(items)
        })
    }
}

impl CatalogAdmin for InMemoryCatalog {
    fn create_wishlist(&self, wishlist: Wishlist) -> StoreFuture<'_, Option<Wishlist>> {
        Box::pin(async move {
            let mut wishlists = self.wishlists.write().await;
            if wishlists
                .values()
                .any(|w| w.public_slug == wishlist.public_slug)
            {
                return Ok(None);
            }
            wishlists.insert(wishlist.id, wishlist.clone());
            Ok(Some(wishlist))
        })
    }

    fn create_item(&self, item: Item) -> StoreFuture<'_, Item> {
        Box::pin(async move { Ok(self.insert_item(item).await) })
    }

    fn set_notification_key(&self, id: WishlistId, key: Option<String>) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            match self.wishlists.write().await.get_mut(&id) {
                Some(wishlist) => {
                    wishlist.owner_notification_key = key;
                    Ok(true)
                },
                None => Ok(false),
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use crate::fixtures;
    use chrono::Utc;
    use wishlist_core::types::{Money, ReserverToken};

    fn new_reservation(item_id: ItemId, cents: u64) -> NewReservation {
        NewReservation {
            item_id,
            amount: Money::from_cents(cents),
            is_full_reservation: false,
            created_at: Utc::now(),
            reserver_token: ReserverToken::generate(),
        }
    }

    #[tokio::test]
    async fn cancelled_rows_are_not_listed() {
        let store = InMemoryReservationStore::new();
        let item_id = ItemId::new();
        let kept = store.insert_reservation(new_reservation(item_id, 100)).await.unwrap();
        let gone = store.insert_reservation(new_reservation(item_id, 200)).await.unwrap();

        assert!(store.cancel_reservation(gone.id).await.unwrap());
        assert!(!store.cancel_reservation(gone.id).await.unwrap());

        let active = store.list_active_reservations(item_id).await.unwrap();
        assert_eq!(active, vec![kept]);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_call() {
        let store = InMemoryReservationStore::new();
        store.set_unavailable(true);
        assert!(store.list_active_reservations(ItemId::new()).await.is_err());
    }

    #[tokio::test]
    async fn catalog_lists_items_in_display_order() {
        let catalog = InMemoryCatalog::new();
        let wishlist = catalog.insert_wishlist(fixtures::wishlist("party")).await;

        let mut second = fixtures::item(wishlist.id, None, false);
        second.sort_order = 2;
        let mut first = fixtures::item(wishlist.id, None, false);
        first.sort_order = 1;
        catalog.insert_item(second.clone()).await;
        catalog.insert_item(first.clone()).await;
        catalog.insert_item(fixtures::item(WishlistId::new(), None, false)).await;

        let items = catalog.list_items(wishlist.id).await.unwrap();
        assert_eq!(items, vec![first, second]);

        let found = catalog.get_wishlist_by_slug("party").await.unwrap();
        assert_eq!(found.map(|w| w.id), Some(wishlist.id));
    }

    #[tokio::test]
    async fn taken_slug_is_not_overwritten() {
        let catalog = InMemoryCatalog::new();
        let first = catalog
            .create_wishlist(fixtures::wishlist("party"))
            .await
            .unwrap()
            .unwrap();

        let clash = catalog.create_wishlist(fixtures::wishlist("party")).await.unwrap();
        assert!(clash.is_none());

        let found = catalog.get_wishlist_by_slug("party").await.unwrap();
        assert_eq!(found.map(|w| w.id), Some(first.id));
    }

    #[tokio::test]
    async fn notification_key_updates_known_wishlists_only() {
        let catalog = InMemoryCatalog::new();
        let wishlist = catalog.insert_wishlist(fixtures::wishlist("party")).await;

        assert!(
            catalog
                .set_notification_key(wishlist.id, Some("ukey".to_string()))
                .await
                .unwrap()
        );
        assert!(!catalog.set_notification_key(WishlistId::new(), None).await.unwrap());

        let stored = catalog.get_wishlist(wishlist.id).await.unwrap().unwrap();
        assert_eq!(stored.owner_notification_key.as_deref(), Some("ukey"));
    }
}
