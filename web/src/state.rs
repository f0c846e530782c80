//! Application state for Axum handlers.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use wishlist_core::catalog::CatalogService;
use wishlist_core::hub::BroadcastHub;
use wishlist_core::service::ReservationService;

/// WebSocket connection limits and keep-alive timings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WsSettings {
    /// Interval between protocol-level pings sent by the server
    pub ping_interval: Duration,
    /// Close the connection after this long without inbound traffic
    pub idle_timeout: Duration,
    /// Upgrades above this many live connections are refused with 503
    pub max_connections: usize,
}

impl Default for WsSettings {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(300),
            max_connections: 10_000,
        }
    }
}

/// Application state shared across all HTTP handlers.
///
/// Cheap to clone; everything heavy sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Reservation workflow
    pub service: ReservationService,
    /// WebSocket limits
    pub ws: WsSettings,
    active_connections: Arc<AtomicUsize>,
    owner: Option<OwnerApi>,
}

/// Catalog writes and the bearer token that unlocks them.
#[derive(Clone)]
pub(crate) struct OwnerApi {
    pub(crate) catalog: CatalogService,
    pub(crate) token: Arc<str>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(service: ReservationService, ws: WsSettings) -> Self {
        Self {
            service,
            ws,
            active_connections: Arc::new(AtomicUsize::new(0)),
            owner: None,
        }
    }

    /// Enable the owner endpoints, guarded by `Authorization: Bearer <token>`.
    ///
    /// Without this, owner endpoints answer 403.
    #[must_use]
    pub fn with_owner_api(mut self, catalog: CatalogService, token: impl Into<Arc<str>>) -> Self {
        self.owner = Some(OwnerApi {
            catalog,
            token: token.into(),
        });
        self
    }

    /// Whether the owner endpoints are enabled.
    #[must_use]
    pub const fn owner_api_enabled(&self) -> bool {
        self.owner.is_some()
    }

    pub(crate) const fn owner_api(&self) -> Option<&OwnerApi> {
        self.owner.as_ref()
    }

    /// The broadcast hub the service publishes to.
    #[must_use]
    pub fn hub(&self) -> &Arc<BroadcastHub> {
        self.service.hub()
    }

    /// Live WebSocket connections.
    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Reserve a connection slot. Returns `None` when the limit is reached.
    pub(crate) fn try_acquire_connection(&self) -> Option<ConnectionSlot> {
        let previous = self.active_connections.fetch_add(1, Ordering::SeqCst);
        if previous >= self.ws.max_connections {
            self.active_connections.fetch_sub(1, Ordering::SeqCst);
            return None;
        }
        metrics::gauge!("wishlist_ws_connections").increment(1.0);
        Some(ConnectionSlot {
            counter: Arc::clone(&self.active_connections),
        })
    }
}

/// Held for the lifetime of one WebSocket; releases the slot on drop.
#[derive(Debug)]
pub(crate) struct ConnectionSlot {
    counter: Arc<AtomicUsize>,
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
        metrics::gauge!("wishlist_ws_connections").decrement(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wishlist_core::aggregator::ReservationAggregator;
    use wishlist_core::store::NoopNotifier;
    use wishlist_testing::{InMemoryCatalog, InMemoryReservationStore, test_clock};

    fn state(max_connections: usize) -> AppState {
        let catalog = Arc::new(InMemoryCatalog::new());
        let aggregator = Arc::new(ReservationAggregator::new(
            Arc::new(InMemoryReservationStore::new()),
            catalog.clone(),
            Arc::new(test_clock()),
        ));
        let service = ReservationService::new(
            aggregator,
            catalog,
            Arc::new(BroadcastHub::default()),
            Arc::new(NoopNotifier),
        );
        AppState::new(
            service,
            WsSettings {
                max_connections,
                ..WsSettings::default()
            },
        )
    }

    #[test]
    fn test_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[test]
    fn test_connection_limit_is_enforced_and_released() {
        let state = state(2);
        let first = state.try_acquire_connection();
        let second = state.try_acquire_connection();
        assert!(first.is_some());
        assert!(second.is_some());
        assert!(state.try_acquire_connection().is_none());
        assert_eq!(state.active_connections(), 2);

        drop(first);
        assert_eq!(state.active_connections(), 1);
        assert!(state.try_acquire_connection().is_some());
    }
}
