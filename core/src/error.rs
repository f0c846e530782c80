//! Error taxonomy for reservation handling.
//!
//! `NotFound` and `Overbooking` are client errors that the submitter always
//! sees. Storage failures bubble up unchanged. Broadcast-side failures never
//! appear here: they are logged and absorbed by the hub.

use crate::types::Money;
use std::fmt;
use thiserror::Error;

/// Errors raised by reservation store and catalog implementations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database connection or query failed.
    #[error("Database error: {0}")]
    Database(String),

    /// A stored row could not be decoded into a domain type.
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Why a submission would violate the no-overbooking invariant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverbookingReason {
    /// The item already has active reservations or a full reservation.
    AlreadyReserved,
    /// The item only accepts full reservations.
    ContributionsNotAllowed,
    /// Recorded amounts must be strictly positive.
    NonPositiveAmount,
    /// The amount is larger than a single reservation can record.
    AmountTooLarge {
        /// Largest accepted amount
        max: Money,
    },
    /// The contribution is larger than what remains of the price.
    ExceedsPrice {
        /// Amount still needed when the submission was checked
        remaining: Money,
    },
}

impl fmt::Display for OverbookingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyReserved => f.write_str("item is already reserved"),
            Self::ContributionsNotAllowed => {
                f.write_str("item does not accept partial contributions")
            },
            Self::NonPositiveAmount => f.write_str("amount must be greater than zero"),
            Self::AmountTooLarge { max } => write!(f, "amount must not exceed {max}"),
            Self::ExceedsPrice { remaining } => {
                write!(f, "amount exceeds the remaining {remaining}")
            },
        }
    }
}

/// Errors returned by the reservation aggregator.
#[derive(Error, Debug)]
pub enum ReservationError {
    /// Unknown item, wishlist or reservation.
    #[error("{resource} {id} not found")]
    NotFound {
        /// Kind of resource that was looked up
        resource: &'static str,
        /// Identifier as supplied by the caller
        id: String,
    },

    /// Accepting the submission would overbook the item. Nothing was stored.
    #[error("Reservation rejected: {0}")]
    Overbooking(OverbookingReason),

    /// The backing store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl ReservationError {
    /// Shorthand for a `NotFound` error.
    pub fn not_found(resource: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }
}

/// Result alias for aggregator operations.
pub type Result<T> = std::result::Result<T, ReservationError>;
