//! Public, anonymous reservation endpoints.
//!
//! - GET /api/public/wishlists/by-slug/:slug - Wishlist with per-item aggregates
//! - POST /api/public/items/:item_id/reserve - Reserve the whole item
//! - POST /api/public/items/:item_id/contribute - Contribute part of the price
//! - DELETE /api/public/reservations/:reservation_id - Cancel with the reserver token
//!
//! No endpoint takes or returns reserver identity. The reserver token is
//! handed back exactly once, to the submitter, so they can cancel later.

use crate::WebResult;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use serde::{Deserialize, Serialize};
use tracing::info;
use wishlist_core::aggregator::ReservationRequest;
use wishlist_core::error::{OverbookingReason, ReservationError};
use wishlist_core::service::{PublicWishlist, ReservationReceipt};
use wishlist_core::types::{ItemId, Money, ReservationId, ReserverToken};

/// Header carrying the token returned at reservation time.
pub const RESERVER_TOKEN_HEADER: &str = "x-reserver-token";

// ============================================================================
// Request/Response Types
// ============================================================================

/// Body of a full reservation. Optional; `amount` only matters for unpriced items.
#[derive(Debug, Default, Deserialize)]
pub struct ReserveRequest {
    /// Declared amount in major units
    pub amount: Option<f64>,
}

/// Body of a contribution.
#[derive(Debug, Deserialize)]
pub struct ContributeRequest {
    /// Contributed amount in major units
    pub amount: f64,
}

/// Response after an accepted reservation or contribution.
#[derive(Debug, Serialize)]
pub struct ReservationResponse {
    /// Created reservation ID
    pub reservation_id: ReservationId,
    /// Token required to cancel this reservation
    pub reserver_token: String,
    /// Reserved item
    pub item_id: ItemId,
    /// Item total after this reservation
    pub reserved_total: f64,
    /// Active reservations on the item
    pub contributors_count: u32,
}

impl From<ReservationReceipt> for ReservationResponse {
    fn from(receipt: ReservationReceipt) -> Self {
        Self {
            reservation_id: receipt.reservation_id,
            reserver_token: receipt.reserver_token.as_str().to_string(),
            item_id: receipt.item_id,
            reserved_total: receipt.aggregate.reserved_total.as_major(),
            contributors_count: receipt.aggregate.contributors_count,
        }
    }
}

/// Response after a cancellation.
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    /// Cancelled reservation ID
    pub reservation_id: ReservationId,
    /// Item total after cancellation
    pub reserved_total: f64,
    /// Active reservations left on the item
    pub contributors_count: u32,
}

// ============================================================================
// Handlers
// ============================================================================

/// Public wishlist by slug.
///
/// # Errors
///
/// 404 for an unknown slug, 500 on storage failure.
pub async fn get_wishlist_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> WebResult<Json<PublicWishlist>> {
    let wishlist = state.service.public_wishlist(&slug).await?;
    Ok(Json(wishlist))
}

/// Reserve an entire item.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/api/public/items/<item_id>/reserve
/// ```
///
/// Response (201):
/// ```json
/// {
///   "reservation_id": "660e8400-e29b-41d4-a716-446655440001",
///   "reserver_token": "3f0c...",
///   "item_id": "550e8400-e29b-41d4-a716-446655440000",
///   "reserved_total": 100.0,
///   "contributors_count": 1
/// }
/// ```
///
/// # Errors
///
/// 400 for a body that is present but not valid JSON, 404 for an unknown
/// item, 409 if the item already has reservations or an unpriced item is
/// reserved without a positive `amount`.
pub async fn reserve_item(
    State(state): State<AppState>,
    Path(item_id): Path<ItemId>,
    body: Bytes,
) -> WebResult<(StatusCode, Json<ReservationResponse>)> {
    let body = parse_reserve_body(&body)?;
    let amount = body.amount.map(parse_amount).transpose()?;

    let receipt = state
        .service
        .reserve(item_id, ReservationRequest::Full { amount })
        .await?;

    info!(%item_id, reservation_id = %receipt.reservation_id, "Item reserved");
    Ok((StatusCode::CREATED, Json(receipt.into())))
}

/// Contribute toward an item's price.
///
/// # Errors
///
/// 404 for an unknown item, 409 if the amount is not positive, the item
/// takes no contributions, or the amount exceeds what remains.
pub async fn contribute_to_item(
    State(state): State<AppState>,
    Path(item_id): Path<ItemId>,
    Json(body): Json<ContributeRequest>,
) -> WebResult<(StatusCode, Json<ReservationResponse>)> {
    let amount = parse_amount(body.amount)?;

    let receipt = state
        .service
        .reserve(item_id, ReservationRequest::Partial { amount })
        .await?;

    info!(%item_id, reservation_id = %receipt.reservation_id, "Contribution added");
    Ok((StatusCode::CREATED, Json(receipt.into())))
}

/// Cancel a reservation using its reserver token.
///
/// # Errors
///
/// 400 without the token header; 404 for an unknown, already cancelled or
/// foreign reservation.
pub async fn cancel_reservation(
    State(state): State<AppState>,
    Path(reservation_id): Path<ReservationId>,
    headers: HeaderMap,
) -> WebResult<Json<CancelResponse>> {
    let token = headers
        .get(RESERVER_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(ReserverToken::from_string)
        .ok_or_else(|| AppError::bad_request("Missing X-Reserver-Token header"))?;

    let aggregate = state.service.cancel(reservation_id, &token).await?;

    info!(%reservation_id, "Reservation cancelled");
    Ok(Json(CancelResponse {
        reservation_id,
        reserved_total: aggregate.reserved_total.as_major(),
        contributors_count: aggregate.contributors_count,
    }))
}

/// An empty body means "no declared amount"; anything else must be valid JSON.
fn parse_reserve_body(body: &Bytes) -> Result<ReserveRequest, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ReserveRequest::default());
    }
    Json::<ReserveRequest>::from_bytes(body)
        .map(|Json(request)| request)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))
}

/// Negative and non-finite amounts can never be admitted; finite amounts
/// beyond the cent range are reported as too large.
fn parse_amount(amount: f64) -> Result<Money, AppError> {
    let reason = if amount.is_finite() && amount > 0.0 {
        OverbookingReason::AmountTooLarge { max: Money::MAX }
    } else {
        OverbookingReason::NonPositiveAmount
    };
    Money::from_major(amount)
        .ok_or(ReservationError::Overbooking(reason))
        .map_err(AppError::from)
}
