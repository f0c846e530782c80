//! Reservation aggregator: per-item totals and the no-overbooking guard.
//!
//! # Consistency boundary
//!
//! ```text
//! submit(item A) ──┐
//! submit(item A) ──┼─> ItemLocks[A] ─> read aggregate ─> admit? ─> insert ─> refresh
//! submit(item B) ──┼─> ItemLocks[B] ─> ...                 (never waits on A)
//! cancel(res on A)─┘
//! ```
//!
//! The check-then-act sequence runs entirely under a per-item async mutex, so
//! two submissions for the same item are totally ordered while submissions for
//! different items proceed independently. Lock entries are removed as soon as
//! no task holds or waits on them.

use crate::environment::Clock;
use crate::error::{OverbookingReason, ReservationError, Result};
use crate::store::{Catalog, ReservationStore};
use crate::types::{
    Aggregate, Item, ItemId, Money, NewReservation, Reservation, ReservationId, ReserverToken,
};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

/// What the caller is asking for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReservationRequest {
    /// Claim the whole item. `amount` is only used when the item has no
    /// price (or a zero price), and is then required.
    Full {
        /// Declared amount for unpriced items
        amount: Option<Money>,
    },
    /// Contribute part of the price.
    Partial {
        /// Contributed amount
        amount: Money,
    },
}

impl ReservationRequest {
    /// Whether this is a full reservation.
    #[must_use]
    pub const fn is_full(&self) -> bool {
        matches!(self, Self::Full { .. })
    }
}

/// Result of an accepted submission or cancellation.
///
/// Everything the event factory and notifier need, captured while the item
/// boundary was still held.
#[derive(Clone, Debug)]
pub struct ReservationOutcome {
    /// The item the reservation belongs to
    pub item: Item,
    /// The reservation that was created or cancelled
    pub reservation: Reservation,
    /// Aggregate after the change
    pub aggregate: Aggregate,
    /// Active reservations after the change
    pub active_reservations: Vec<Reservation>,
}

/// Decide whether a request can be admitted given the item's active rows.
///
/// Returns the amount to record.
///
/// # Errors
///
/// Returns the `OverbookingReason` describing why the request is rejected.
pub fn admit(
    item: &Item,
    active: &[Reservation],
    request: ReservationRequest,
) -> std::result::Result<Money, OverbookingReason> {
    let current = Aggregate::from_reservations(active);
    let fully_reserved = active.iter().any(|r| r.is_active() && r.is_full_reservation);

    match request {
        ReservationRequest::Full { amount } => {
            if fully_reserved || !current.reserved_total.is_zero() || current.contributors_count > 0 {
                return Err(OverbookingReason::AlreadyReserved);
            }
            // A zero price counts as unpriced: the caller declares what they give.
            let recorded = match item.price {
                Some(price) if !price.is_zero() => price,
                _ => amount.unwrap_or(Money::ZERO),
            };
            check_recordable(recorded)?;
            Ok(recorded)
        },
        ReservationRequest::Partial { amount } => {
            if !item.allow_contributions {
                return Err(OverbookingReason::ContributionsNotAllowed);
            }
            check_recordable(amount)?;
            if fully_reserved {
                return Err(OverbookingReason::AlreadyReserved);
            }
            if let Some(price) = item.price {
                let remaining = price.saturating_sub(current.reserved_total);
                match current.reserved_total.checked_add(amount) {
                    Some(total) if total <= price => {},
                    _ => return Err(OverbookingReason::ExceedsPrice { remaining }),
                }
            }
            Ok(amount)
        },
    }
}

fn check_recordable(amount: Money) -> std::result::Result<(), OverbookingReason> {
    if amount.is_zero() {
        return Err(OverbookingReason::NonPositiveAmount);
    }
    if amount > Money::MAX {
        return Err(OverbookingReason::AmountTooLarge { max: Money::MAX });
    }
    Ok(())
}

// ============================================================================
// Per-item locks
// ============================================================================

/// Registry of per-item async mutexes.
#[derive(Default)]
struct ItemLocks {
    locks: DashMap<ItemId, Arc<Mutex<()>>>,
}

impl ItemLocks {
    async fn acquire(&self, item_id: ItemId) -> ItemGuard<'_> {
        let lock = Arc::clone(&self.locks.entry(item_id).or_default());
        let guard = lock.lock_owned().await;
        ItemGuard {
            locks: self,
            item_id,
            guard: Some(guard),
        }
    }

    fn len(&self) -> usize {
        self.locks.len()
    }
}

/// Holds one item's boundary; prunes the registry entry on release.
struct ItemGuard<'a> {
    locks: &'a ItemLocks,
    item_id: ItemId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ItemGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the registry itself still references the mutex: nobody holds or waits on it.
        self.locks
            .locks
            .remove_if(&self.item_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

// ============================================================================
// Aggregator
// ============================================================================

/// Computes per-item aggregates and guards the no-overbooking invariant.
pub struct ReservationAggregator {
    store: Arc<dyn ReservationStore>,
    catalog: Arc<dyn Catalog>,
    clock: Arc<dyn Clock>,
    locks: ItemLocks,
}

impl ReservationAggregator {
    /// Create an aggregator over the given collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn ReservationStore>,
        catalog: Arc<dyn Catalog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            catalog,
            clock,
            locks: ItemLocks::default(),
        }
    }

    /// Current `(reserved_total, contributors_count)` for an item.
    ///
    /// A snapshot read; not serialized against in-flight submissions.
    ///
    /// # Errors
    ///
    /// Returns `ReservationError::Store` if the store read fails.
    pub async fn compute_aggregate(&self, item_id: ItemId) -> Result<Aggregate> {
        let active = self.store.list_active_reservations(item_id).await?;
        Ok(Aggregate::from_reservations(&active))
    }

    /// Submit a full reservation or partial contribution.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the item does not exist
    /// - `Overbooking` if accepting would exceed what remains needed; nothing
    ///   is written in that case
    /// - `Store` if the store fails
    #[tracing::instrument(skip_all, fields(item_id = %item_id, full = request.is_full()))]
    pub async fn submit_reservation(
        &self,
        item_id: ItemId,
        request: ReservationRequest,
    ) -> Result<ReservationOutcome> {
        let item = self
            .catalog
            .get_item(item_id)
            .await?
            .ok_or_else(|| ReservationError::not_found("Item", item_id))?;

        let _boundary = self.locks.acquire(item_id).await;

        let active = self.store.list_active_reservations(item_id).await?;
        let amount = admit(&item, &active, request).map_err(|reason| {
            debug!(%reason, "Reservation rejected");
            ReservationError::Overbooking(reason)
        })?;

        let reservation = self
            .store
            .insert_reservation(NewReservation {
                item_id,
                amount,
                is_full_reservation: request.is_full(),
                created_at: self.clock.now(),
                reserver_token: ReserverToken::generate(),
            })
            .await?;

        let active_reservations = self.store.list_active_reservations(item_id).await?;
        let aggregate = Aggregate::from_reservations(&active_reservations);

        info!(
            reservation_id = %reservation.id,
            amount = %reservation.amount,
            full = reservation.is_full_reservation,
            reserved_total = %aggregate.reserved_total,
            contributors = aggregate.contributors_count,
            "Reservation accepted"
        );

        Ok(ReservationOutcome {
            item,
            reservation,
            aggregate,
            active_reservations,
        })
    }

    /// Cancel a reservation on behalf of whoever holds its token.
    ///
    /// An unknown reservation, a token mismatch and an already-cancelled
    /// reservation all report `NotFound`, so the endpoint cannot be used to
    /// discover which reservations exist.
    ///
    /// # Errors
    ///
    /// - `NotFound` as described above
    /// - `Store` if the store fails
    #[tracing::instrument(skip_all, fields(reservation_id = %reservation_id))]
    pub async fn cancel_reservation(
        &self,
        reservation_id: ReservationId,
        token: &ReserverToken,
    ) -> Result<ReservationOutcome> {
        let not_found = || ReservationError::not_found("Reservation", reservation_id);

        let existing = self
            .store
            .get_reservation(reservation_id)
            .await?
            .filter(|r| &r.reserver_token == token)
            .ok_or_else(not_found)?;

        let item = self
            .catalog
            .get_item(existing.item_id)
            .await?
            .ok_or_else(|| ReservationError::not_found("Item", existing.item_id))?;

        let _boundary = self.locks.acquire(existing.item_id).await;

        if !self.store.cancel_reservation(reservation_id).await? {
            return Err(not_found());
        }

        let active_reservations = self.store.list_active_reservations(existing.item_id).await?;
        let aggregate = Aggregate::from_reservations(&active_reservations);

        info!(
            item_id = %existing.item_id,
            reserved_total = %aggregate.reserved_total,
            contributors = aggregate.contributors_count,
            "Reservation cancelled"
        );

        Ok(ReservationOutcome {
            item,
            reservation: existing,
            aggregate,
            active_reservations,
        })
    }

    /// Number of items whose boundary is currently held or awaited.
    #[must_use]
    pub fn locked_items(&self) -> usize {
        self.locks.len()
    }
}
