//! Owner-side catalog management.
//!
//! Creating wishlists and items and setting the owner's notification key.
//! Reservation handling never goes through here; it only reads the catalog.

use crate::environment::Clock;
use crate::error::StoreError;
use crate::store::{Catalog, CatalogAdmin};
use crate::types::{Item, ItemId, Money, OwnerId, Wishlist, WishlistId, generate_public_slug};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Attempts at drawing an unused public slug before giving up.
const SLUG_ATTEMPTS: usize = 5;

/// Errors from catalog management.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The wishlist does not exist.
    #[error("Wishlist {0} not found")]
    WishlistNotFound(WishlistId),

    /// The request is malformed (e.g. an empty title).
    #[error("{0}")]
    Invalid(&'static str),

    /// Every generated slug collided with an existing wishlist.
    #[error("Could not allocate a unique public slug")]
    SlugExhausted,

    /// The backing store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Input for a new wishlist. The slug, ID and timestamp are assigned here.
#[derive(Clone, Debug, Default)]
pub struct WishlistDraft {
    /// Owner; a fresh ID is assigned when absent
    pub owner_id: Option<OwnerId>,
    /// Display title
    pub title: String,
    /// Optional description
    pub description: Option<String>,
    /// Optional occasion date
    pub deadline: Option<DateTime<Utc>>,
    /// Push-notification key for the owner
    pub owner_notification_key: Option<String>,
}

/// Input for a new item.
#[derive(Clone, Debug, Default)]
pub struct ItemDraft {
    /// Display title
    pub title: String,
    /// Target price; `None` (or zero) lets visitors declare an amount
    pub price: Option<Money>,
    /// Whether partial contributions are accepted
    pub allow_contributions: bool,
    /// Display ordering within the wishlist
    pub sort_order: i32,
}

/// Writes wishlists and items through a [`CatalogAdmin`].
#[derive(Clone)]
pub struct CatalogService {
    admin: Arc<dyn CatalogAdmin>,
    catalog: Arc<dyn Catalog>,
    clock: Arc<dyn Clock>,
}

impl CatalogService {
    /// Wire a service from its collaborators.
    #[must_use]
    pub fn new(admin: Arc<dyn CatalogAdmin>, catalog: Arc<dyn Catalog>, clock: Arc<dyn Clock>) -> Self {
        Self {
            admin,
            catalog,
            clock,
        }
    }

    /// Create a wishlist under a freshly generated public slug.
    ///
    /// # Errors
    ///
    /// - `Invalid` for a blank title
    /// - `SlugExhausted` if no free slug was found
    /// - `Store` if storage fails
    pub async fn create_wishlist(&self, draft: WishlistDraft) -> Result<Wishlist, CatalogError> {
        let title = required_title(&draft.title)?;
        let owner_id = draft.owner_id.unwrap_or_default();

        for _ in 0..SLUG_ATTEMPTS {
            let wishlist = Wishlist {
                id: WishlistId::new(),
                owner_id,
                title: title.clone(),
                description: normalize(draft.description.clone()),
                public_slug: generate_public_slug(),
                deadline: draft.deadline,
                created_at: self.clock.now(),
                owner_notification_key: normalize(draft.owner_notification_key.clone()),
            };
            if let Some(created) = self.admin.create_wishlist(wishlist).await? {
                info!(wishlist_id = %created.id, slug = %created.public_slug, "Wishlist created");
                return Ok(created);
            }
            warn!("Public slug collision, retrying");
        }
        Err(CatalogError::SlugExhausted)
    }

    /// Add an item to an existing wishlist.
    ///
    /// # Errors
    ///
    /// - `WishlistNotFound` for an unknown wishlist
    /// - `Invalid` for a blank title
    /// - `Store` if storage fails
    pub async fn add_item(
        &self,
        wishlist_id: WishlistId,
        draft: ItemDraft,
    ) -> Result<Item, CatalogError> {
        let title = required_title(&draft.title)?;
        if self.catalog.get_wishlist(wishlist_id).await?.is_none() {
            return Err(CatalogError::WishlistNotFound(wishlist_id));
        }

        let item = self
            .admin
            .create_item(Item {
                id: ItemId::new(),
                wishlist_id,
                title,
                price: draft.price,
                allow_contributions: draft.allow_contributions,
                created_at: self.clock.now(),
                sort_order: draft.sort_order,
            })
            .await?;
        info!(%wishlist_id, item_id = %item.id, "Item added");
        Ok(item)
    }

    /// Set or clear the owner's notification key. Blank keys clear it.
    ///
    /// # Errors
    ///
    /// - `WishlistNotFound` for an unknown wishlist
    /// - `Store` if storage fails
    pub async fn set_notification_key(
        &self,
        wishlist_id: WishlistId,
        key: Option<String>,
    ) -> Result<(), CatalogError> {
        let key = normalize(key);
        let enabled = key.is_some();
        if !self.admin.set_notification_key(wishlist_id, key).await? {
            return Err(CatalogError::WishlistNotFound(wishlist_id));
        }
        info!(%wishlist_id, enabled, "Owner notification key updated");
        Ok(())
    }
}

fn required_title(title: &str) -> Result<String, CatalogError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(CatalogError::Invalid("title must not be empty"));
    }
    Ok(title.to_string())
}

fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
