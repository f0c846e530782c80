//! Owner endpoints: catalog writes behind the owner bearer token.
//!
//! - POST /api/owner/wishlists - Create a wishlist with a generated public slug
//! - POST /api/owner/wishlists/:wishlist_id/items - Add an item
//! - PUT /api/owner/wishlists/:wishlist_id/notification-key - Set or clear the push key
//!
//! Nothing here exposes reservations or their submitters.

use crate::WebResult;
use crate::error::AppError;
use crate::extractors::OwnerAccess;
use axum::{Json, extract::Path, http::StatusCode};
use serde::{Deserialize, Serialize};
use wishlist_core::catalog::{ItemDraft, WishlistDraft};
use wishlist_core::types::{Item, ItemId, Money, OwnerId, Wishlist, WishlistId};
use wishlist_core::{DateTime, Utc};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Body of a new wishlist.
#[derive(Debug, Deserialize)]
pub struct CreateWishlistRequest {
    /// Owner; generated when absent
    pub owner_id: Option<OwnerId>,
    /// Display title
    pub title: String,
    /// Optional description
    pub description: Option<String>,
    /// Optional occasion date (RFC 3339)
    pub deadline: Option<DateTime<Utc>>,
    /// Owner's push-notification key
    pub owner_notification_key: Option<String>,
}

/// Body of a new item.
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    /// Display title
    pub title: String,
    /// Target price in major units
    pub price: Option<f64>,
    /// Whether partial contributions are accepted
    #[serde(default)]
    pub allow_contributions: bool,
    /// Display ordering
    #[serde(default)]
    pub sort_order: i32,
}

/// Body of a notification key update. `null` or blank clears the key.
#[derive(Debug, Deserialize)]
pub struct NotificationKeyRequest {
    /// Push-notification key
    pub key: Option<String>,
}

/// A wishlist as its owner sees it.
#[derive(Debug, Serialize)]
pub struct OwnerWishlistResponse {
    /// Wishlist fields; the notification key itself is never echoed
    #[serde(flatten)]
    pub wishlist: Wishlist,
    /// Whether a notification key is set
    pub notifications_enabled: bool,
}

impl From<Wishlist> for OwnerWishlistResponse {
    fn from(wishlist: Wishlist) -> Self {
        let notifications_enabled = wishlist.owner_notification_key.is_some();
        Self {
            wishlist,
            notifications_enabled,
        }
    }
}

/// A newly added item.
#[derive(Debug, Serialize)]
pub struct ItemResponse {
    /// Item ID
    pub id: ItemId,
    /// Owning wishlist
    pub wishlist_id: WishlistId,
    /// Display title
    pub title: String,
    /// Target price in major units
    pub price: Option<f64>,
    /// Whether partial contributions are accepted
    pub allow_contributions: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Display ordering
    pub sort_order: i32,
}

impl From<Item> for ItemResponse {
    fn from(item: Item) -> Self {
        Self {
            id: item.id,
            wishlist_id: item.wishlist_id,
            title: item.title,
            price: item.price.as_ref().map(Money::as_major),
            allow_contributions: item.allow_contributions,
            created_at: item.created_at,
            sort_order: item.sort_order,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a wishlist.
///
/// # Errors
///
/// 401/403 without owner access, 400 for a blank title.
pub async fn create_wishlist(
    OwnerAccess(catalog): OwnerAccess,
    Json(body): Json<CreateWishlistRequest>,
) -> WebResult<(StatusCode, Json<OwnerWishlistResponse>)> {
    let wishlist = catalog
        .create_wishlist(WishlistDraft {
            owner_id: body.owner_id,
            title: body.title,
            description: body.description,
            deadline: body.deadline,
            owner_notification_key: body.owner_notification_key,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(wishlist.into())))
}

/// Add an item to a wishlist.
///
/// # Errors
///
/// 401/403 without owner access, 400 for a blank title or an invalid price,
/// 404 for an unknown wishlist.
pub async fn add_item(
    OwnerAccess(catalog): OwnerAccess,
    Path(wishlist_id): Path<WishlistId>,
    Json(body): Json<AddItemRequest>,
) -> WebResult<(StatusCode, Json<ItemResponse>)> {
    let price = body.price.map(parse_price).transpose()?;
    let item = catalog
        .add_item(
            wishlist_id,
            ItemDraft {
                title: body.title,
                price,
                allow_contributions: body.allow_contributions,
                sort_order: body.sort_order,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(item.into())))
}

/// Set or clear the owner's notification key.
///
/// # Errors
///
/// 401/403 without owner access, 404 for an unknown wishlist.
pub async fn set_notification_key(
    OwnerAccess(catalog): OwnerAccess,
    Path(wishlist_id): Path<WishlistId>,
    Json(body): Json<NotificationKeyRequest>,
) -> WebResult<StatusCode> {
    catalog.set_notification_key(wishlist_id, body.key).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn parse_price(price: f64) -> Result<Money, AppError> {
    Money::from_major(price)
        .filter(|money| *money <= Money::MAX)
        .ok_or_else(|| AppError::bad_request("price must be a non-negative amount"))
}
