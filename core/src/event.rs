//! Anonymized wire events for wishlist subscribers.
//!
//! `build_item_state_event` is the only way reservation state reaches a
//! subscriber. It copies exactly four fields per reservation
//! (`id`, `amount`, `is_full_reservation`, `created_at`) so nothing that could
//! identify a reserver is ever serialized.
//!
//! # Message Format
//!
//! **Server → Client (item state):**
//! ```json
//! {
//!   "type": "contribution_added",
//!   "item_id": "550e8400-...",
//!   "reserved_total": 60.0,
//!   "contributors_count": 2,
//!   "reservations": [
//!     {"id": "660e8400-...", "amount": 25.0, "is_full_reservation": false,
//!      "created_at": "2025-01-01T00:00:00.000000Z"}
//!   ]
//! }
//! ```
//!
//! **Server → Client (liveness reply):**
//! ```json
//! {"type": "pong"}
//! ```

use crate::types::{Aggregate, ItemId, Reservation, ReservationId};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// Which state change produced an item event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemEventType {
    /// A full reservation was accepted
    ItemReserved,
    /// A partial contribution was accepted
    ContributionAdded,
    /// A reservation or contribution was withdrawn
    ReservationCancelled,
}

/// Identity-free view of one reservation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReservationView {
    /// Reservation ID
    pub id: ReservationId,
    /// Amount in major units
    pub amount: f64,
    /// Whether it claims the whole item
    pub is_full_reservation: bool,
    /// RFC 3339 UTC timestamp
    pub created_at: String,
}

/// Item state carried by every reservation event.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ItemState {
    /// Item the event is about
    pub item_id: ItemId,
    /// Sum of active amounts, in major units
    pub reserved_total: f64,
    /// Number of active reservations
    pub contributors_count: u32,
    /// Active reservations, anonymized
    pub reservations: Vec<ReservationView>,
}

/// Messages sent from the server to wishlist subscribers.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WishlistMessage {
    /// A full reservation was accepted
    ItemReserved(ItemState),
    /// A partial contribution was accepted
    ContributionAdded(ItemState),
    /// A reservation was cancelled
    ReservationCancelled(ItemState),
    /// Reply to a client `ping`
    Pong,
}

/// Single textual timestamp format used on the wire.
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Build the anonymized event for an item state change.
///
/// Pure and deterministic. Pass `Aggregate::default()` and an empty slice
/// when there is nothing to report; the event then carries a zero count and
/// an empty reservation list.
#[must_use]
pub fn build_item_state_event(
    event_type: ItemEventType,
    item_id: ItemId,
    aggregate: &Aggregate,
    active_reservations: &[Reservation],
) -> WishlistMessage {
    let state = ItemState {
        item_id,
        reserved_total: aggregate.reserved_total.as_major(),
        contributors_count: aggregate.contributors_count,
        reservations: active_reservations
            .iter()
            .map(|r| ReservationView {
                id: r.id,
                amount: r.amount.as_major(),
                is_full_reservation: r.is_full_reservation,
                created_at: format_timestamp(r.created_at),
            })
            .collect(),
    };

    match event_type {
        ItemEventType::ItemReserved => WishlistMessage::ItemReserved(state),
        ItemEventType::ContributionAdded => WishlistMessage::ContributionAdded(state),
        ItemEventType::ReservationCancelled => WishlistMessage::ReservationCancelled(state),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use crate::types::{Money, ReservationStatus, ReserverToken};
    use chrono::TimeZone;

    fn reservation(cents: u64) -> Reservation {
        Reservation {
            id: ReservationId::new(),
            item_id: ItemId::new(),
            amount: Money::from_cents(cents),
            is_full_reservation: false,
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 12, 30, 0).unwrap(),
            reserver_token: ReserverToken::from_string("do-not-leak"),
            status: ReservationStatus::Active,
        }
    }

    #[test]
    fn reservation_entries_only_carry_public_fields() {
        let rows = vec![reservation(2_500), reservation(3_500)];
        let aggregate = crate::types::Aggregate::from_reservations(&rows);
        let event = build_item_state_event(
            ItemEventType::ContributionAdded,
            ItemId::new(),
            &aggregate,
            &rows,
        );

        let json = serde_json::to_value(&event).unwrap();
        let text = json.to_string();
        assert!(!text.contains("do-not-leak"));

        for entry in json["reservations"].as_array().unwrap() {
            let mut keys: Vec<_> = entry.as_object().unwrap().keys().cloned().collect();
            keys.sort();
            assert_eq!(keys, ["amount", "created_at", "id", "is_full_reservation"]);
        }
    }

    #[test]
    fn event_has_expected_shape() {
        let rows = vec![reservation(6_000)];
        let aggregate = crate::types::Aggregate::from_reservations(&rows);
        let item_id = ItemId::new();
        let event = build_item_state_event(ItemEventType::ItemReserved, item_id, &aggregate, &rows);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "item_reserved");
        assert_eq!(json["item_id"], item_id.to_string());
        assert_eq!(json["reserved_total"], 60.0);
        assert_eq!(json["contributors_count"], 1);
        assert_eq!(
            json["reservations"][0]["created_at"],
            "2025-01-01T12:30:00.000000Z"
        );
    }

    #[test]
    fn empty_inputs_default_to_zero_and_empty_list() {
        let event = build_item_state_event(
            ItemEventType::ReservationCancelled,
            ItemId::new(),
            &crate::types::Aggregate::default(),
            &[],
        );

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "reservation_cancelled");
        assert_eq!(json["contributors_count"], 0);
        assert_eq!(json["reserved_total"], 0.0);
        assert_eq!(json["reservations"], serde_json::json!([]));
    }

    #[test]
    fn pong_is_a_bare_type_tag() {
        let json = serde_json::to_string(&WishlistMessage::Pong).unwrap();
        assert_eq!(json, r#"{"type":"pong"}"#);
    }
}
