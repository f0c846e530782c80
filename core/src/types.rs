//! Domain types for anonymous wishlist reservations.
//!
//! Identifiers, the cents-based `Money` value object, catalog entities
//! (`Wishlist`, `Item`) and reservation records. The reserver token carried by
//! a `Reservation` is opaque and never leaves the crate boundary through any
//! serialized view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a wishlist
    WishlistId
);
uuid_id!(
    /// Unique identifier for an item on a wishlist
    ItemId
);
uuid_id!(
    /// Unique identifier for a reservation or contribution
    ReservationId
);
uuid_id!(
    /// Unique identifier for a wishlist owner
    OwnerId
);

/// Opaque token handed to whoever submitted a reservation.
///
/// It is the only link between a reservation and its submitter and is used
/// solely to authorize cancellation. `Debug` output is redacted so the token
/// cannot leak through logs.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ReserverToken(String);

impl ReserverToken {
    /// Generate a fresh random token.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Wrap an existing token value (e.g. loaded from storage or a header).
    #[must_use]
    pub fn from_string(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Token value as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ReserverToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ReserverToken(<redacted>)")
    }
}

/// Length of generated public slugs.
pub const PUBLIC_SLUG_LEN: usize = 12;

/// Random, URL-safe slug for a wishlist's public page.
#[must_use]
pub fn generate_public_slug() -> String {
    let mut slug = Uuid::new_v4().simple().to_string();
    slug.truncate(PUBLIC_SLUG_LEN);
    slug
}

// ============================================================================
// Money Value Object (cents-based to avoid floating point errors)
// ============================================================================

/// Represents money in cents to avoid floating-point arithmetic errors.
///
/// Non-negative by construction, which is what the item price invariant
/// requires.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(u64);

impl Money {
    /// Zero amount.
    pub const ZERO: Self = Self(0);

    /// Largest amount a single reservation may record: `i64::MAX` cents, the
    /// widest value a `BIGINT` column holds.
    #[allow(clippy::cast_sign_loss)] // i64::MAX is positive
    pub const MAX: Self = Self(i64::MAX as u64);

    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Creates a `Money` value from a major-unit decimal (e.g. `12.34`).
    ///
    /// Rounds to the nearest cent. Returns `None` for negative, non-finite or
    /// out-of-range values.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)] // Range checked above the cast
    pub fn from_major(value: f64) -> Option<Self> {
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        let cents = (value * 100.0).round();
        if cents > u64::MAX as f64 {
            return None;
        }
        Some(Self(cents as u64))
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Returns the amount in major units, for wire formats that carry numbers.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // Wishlist prices are far below 2^53 cents
    pub fn as_major(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two money amounts with overflow checking
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(sum) => Some(Self(sum)),
            None => None,
        }
    }

    /// Subtracts, clamping at zero.
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// A published wishlist.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wishlist {
    /// Wishlist ID
    pub id: WishlistId,
    /// Owner of the wishlist
    pub owner_id: OwnerId,
    /// Display title
    pub title: String,
    /// Optional description
    pub description: Option<String>,
    /// Slug used for the public URL
    pub public_slug: String,
    /// Optional occasion date
    pub deadline: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Owner's push-notification key, if they configured one
    #[serde(skip_serializing)]
    pub owner_notification_key: Option<String>,
}

/// An item on a wishlist.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Item ID
    pub id: ItemId,
    /// Wishlist the item belongs to
    pub wishlist_id: WishlistId,
    /// Display title
    pub title: String,
    /// Target price; `None` for informational items
    pub price: Option<Money>,
    /// Whether partial contributions are accepted
    pub allow_contributions: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Display ordering within the wishlist
    pub sort_order: i32,
}

// ============================================================================
// Reservations
// ============================================================================

/// Lifecycle status of a reservation row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    /// Counts toward the item's aggregate
    Active,
    /// Withdrawn by its submitter; ignored by aggregation
    Cancelled,
}

impl ReservationStatus {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Cancelled => "cancelled",
        }
    }
}

/// A reservation or partial contribution on an item.
///
/// Immutable once created except for cancellation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reservation {
    /// Reservation ID
    pub id: ReservationId,
    /// Item being reserved
    pub item_id: ItemId,
    /// Reserved or contributed amount
    pub amount: Money,
    /// Whether this claims the whole item
    pub is_full_reservation: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Opaque submitter token, never exposed to readers
    pub reserver_token: ReserverToken,
    /// Current status
    pub status: ReservationStatus,
}

impl Reservation {
    /// Whether the reservation counts toward aggregates.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == ReservationStatus::Active
    }
}

/// A reservation accepted by the aggregator and about to be persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewReservation {
    /// Item being reserved
    pub item_id: ItemId,
    /// Amount to record
    pub amount: Money,
    /// Whether this claims the whole item
    pub is_full_reservation: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Token returned to the submitter
    pub reserver_token: ReserverToken,
}

// ============================================================================
// Aggregate
// ============================================================================

/// Derived reservation state of one item. Never persisted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Aggregate {
    /// Sum of active reservation amounts
    pub reserved_total: Money,
    /// Number of active reservations (not distinct people)
    pub contributors_count: u32,
}

impl Aggregate {
    /// Reduce a set of reservations, skipping anything not active.
    ///
    /// Saturates rather than overflowing; the admission check keeps totals
    /// at or below the price so saturation is unreachable in practice.
    #[must_use]
    pub fn from_reservations(reservations: &[Reservation]) -> Self {
        reservations
            .iter()
            .filter(|r| r.is_active())
            .fold(Self::default(), |acc, r| Self {
                reserved_total: acc
                    .reserved_total
                    .checked_add(r.amount)
                    .unwrap_or(Money::from_cents(u64::MAX)),
                contributors_count: acc.contributors_count.saturating_add(1),
            })
    }
}
