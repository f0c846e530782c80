//! # Wishlist Testing
//!
//! Testing utilities and helpers for the wishlist workspace.
//!
//! This crate provides:
//! - Mock implementations of the core collaborator traits
//! - In-memory store and catalog (also used by the server when no database
//!   is configured)
//! - Subscriber sinks that record, fail or stall
//! - Fixtures and proptest strategies
//!
//! ## Example
//!
//! ```ignore
//! use wishlist_testing::{InMemoryCatalog, InMemoryReservationStore, test_clock, fixtures};
//!
//! #[tokio::test]
//! async fn contribution_is_recorded() {
//!     let catalog = Arc::new(InMemoryCatalog::new());
//!     let wishlist = catalog.insert_wishlist(fixtures::wishlist("birthday")).await;
//!     let item = catalog.insert_item(fixtures::item(wishlist.id, Some(10_000), true)).await;
//!
//!     let aggregator = ReservationAggregator::new(
//!         Arc::new(InMemoryReservationStore::new()),
//!         catalog,
//!         Arc::new(test_clock()),
//!     );
//!     aggregator.submit_reservation(item.id, partial(2_500)).await.unwrap();
//! }
//! ```

mod memory;
mod sinks;

pub use admission_test::AdmissionTest;
pub use memory::{InMemoryCatalog, InMemoryReservationStore};
pub use sinks::{FailingSink, RecordingSink, StalledSink};

use chrono::{DateTime, Utc};
use wishlist_core::environment::Clock;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;
    use std::time::Duration;
    use wishlist_core::store::Notifier;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use wishlist_testing::mocks::FixedClock;
    /// use wishlist_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// A notification captured by [`RecordingNotifier`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct SentNotification {
        /// Owner key the message was addressed to
        pub owner_key: String,
        /// Notification title
        pub title: String,
        /// Notification body
        pub message: String,
    }

    /// Notifier that records every call and reports success.
    #[derive(Debug, Default)]
    pub struct RecordingNotifier {
        sent: Mutex<Vec<SentNotification>>,
    }

    impl RecordingNotifier {
        /// Create an empty recorder
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Notifications sent so far
        #[must_use]
        pub fn sent(&self) -> Vec<SentNotification> {
            self.sent
                .lock()
                .map(|sent| sent.clone())
                .unwrap_or_default()
        }

        /// Wait until at least `count` notifications arrived or `timeout`
        /// elapsed. Returns what was recorded.
        ///
        /// Notifications are fire-and-forget, so tests poll for them.
        pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<SentNotification> {
            let deadline = tokio::time::Instant::now() + timeout;
            loop {
                let sent = self.sent();
                if sent.len() >= count || tokio::time::Instant::now() >= deadline {
                    return sent;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify_owner<'a>(
            &'a self,
            owner_key: &'a str,
            title: &'a str,
            message: &'a str,
        ) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
            Box::pin(async move {
                let Ok(mut sent) = self.sent.lock() else {
                    return false;
                };
                sent.push(SentNotification {
                    owner_key: owner_key.to_string(),
                    title: title.to_string(),
                    message: message.to_string(),
                });
                true
            })
        }
    }
}

/// Test helpers and utilities
///
/// Builders for catalog rows and a one-shot tracing subscriber.
pub mod fixtures {
    use super::{DateTime, Utc};
    use wishlist_core::types::{Item, ItemId, Money, OwnerId, Wishlist, WishlistId};

    fn epoch() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH
    }

    /// A wishlist with the given slug and no notification key.
    #[must_use]
    pub fn wishlist(slug: &str) -> Wishlist {
        Wishlist {
            id: WishlistId::new(),
            owner_id: OwnerId::new(),
            title: format!("Wishlist {slug}"),
            description: None,
            public_slug: slug.to_string(),
            deadline: None,
            created_at: epoch(),
            owner_notification_key: None,
        }
    }

    /// An item on `wishlist_id` priced in cents.
    #[must_use]
    pub fn item(wishlist_id: WishlistId, price_cents: Option<u64>, allow_contributions: bool) -> Item {
        Item {
            id: ItemId::new(),
            wishlist_id,
            title: "Espresso machine".to_string(),
            price: price_cents.map(Money::from_cents),
            allow_contributions,
            created_at: epoch(),
            sort_order: 0,
        }
    }

    /// Install a test-writer tracing subscriber. Safe to call repeatedly.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter("debug")
            .try_init();
    }
}

/// Property-based testing utilities
///
/// proptest strategies for reservation requests.
pub mod properties {
    use proptest::prelude::*;
    use wishlist_core::aggregator::ReservationRequest;
    use wishlist_core::types::Money;

    /// Amounts between one cent and `max_cents`.
    pub fn money(max_cents: u64) -> impl Strategy<Value = Money> {
        (1..=max_cents).prop_map(Money::from_cents)
    }

    /// Partial contributions of up to `max_cents`.
    pub fn partial_request(max_cents: u64) -> impl Strategy<Value = ReservationRequest> {
        money(max_cents).prop_map(|amount| ReservationRequest::Partial { amount })
    }

    /// Mix of full reservations and partial contributions.
    pub fn any_request(max_cents: u64) -> impl Strategy<Value = ReservationRequest> {
        prop_oneof![
            1 => Just(ReservationRequest::Full { amount: None }),
            4 => partial_request(max_cents),
        ]
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, RecordingNotifier, SentNotification, test_clock};
