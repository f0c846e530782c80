//! Shared fixture: an in-memory app with one wishlist and one item.

#![allow(dead_code)] // Not every test binary uses every field

use std::sync::Arc;
use wishlist_core::aggregator::ReservationAggregator;
use wishlist_core::catalog::CatalogService;
use wishlist_core::hub::BroadcastHub;
use wishlist_core::service::ReservationService;
use wishlist_core::store::NoopNotifier;
use wishlist_core::types::{Item, Wishlist};
use wishlist_testing::{InMemoryCatalog, InMemoryReservationStore, fixtures, test_clock};
use wishlist_web::{AppState, WsSettings};

/// Bearer token the test app accepts on owner endpoints.
pub const OWNER_TOKEN: &str = "owner-secret";

pub struct TestApp {
    pub state: AppState,
    pub hub: Arc<BroadcastHub>,
    pub catalog: Arc<InMemoryCatalog>,
    pub wishlist: Wishlist,
    pub item: Item,
}

/// One wishlist with slug `birthday` and one 100.00 item that takes
/// contributions. Owner endpoints accept [`OWNER_TOKEN`].
pub async fn app(ws: WsSettings) -> TestApp {
    fixtures::init_tracing();
    let catalog = Arc::new(InMemoryCatalog::new());
    let wishlist = catalog.insert_wishlist(fixtures::wishlist("birthday")).await;
    let item = catalog
        .insert_item(fixtures::item(wishlist.id, Some(10_000), true))
        .await;

    let aggregator = Arc::new(ReservationAggregator::new(
        Arc::new(InMemoryReservationStore::new()),
        catalog.clone(),
        Arc::new(test_clock()),
    ));
    let hub = Arc::new(BroadcastHub::default());
    let service = ReservationService::new(
        aggregator,
        catalog.clone(),
        hub.clone(),
        Arc::new(NoopNotifier),
    );

    let owner_catalog = CatalogService::new(
        catalog.clone(),
        catalog.clone(),
        Arc::new(test_clock()),
    );

    TestApp {
        state: AppState::new(service, ws).with_owner_api(owner_catalog, OWNER_TOKEN),
        hub,
        catalog,
        wishlist,
        item,
    }
}
