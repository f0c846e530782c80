//! Custom Axum extractors.
//!
//! - `OwnerAccess`: Bearer-token gate in front of the owner endpoints
//!
//! # Examples
//!
//! ```ignore
//! async fn handler(OwnerAccess(catalog): OwnerAccess) -> WebResult<Json<Item>> {
//!     let item = catalog.add_item(wishlist_id, draft).await?;
//!     Ok(Json(item))
//! }
//! ```

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use tracing::warn;
use wishlist_core::catalog::CatalogService;

/// Catalog writes, available once the request proved it holds the owner token.
///
/// Rejects with 403 when the owner API is not configured and 401 when the
/// `Authorization: Bearer` token is missing or wrong.
#[derive(Clone)]
pub struct OwnerAccess(pub CatalogService);

#[async_trait]
impl FromRequestParts<AppState> for OwnerAccess {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(owner) = state.owner_api() else {
            return Err(AppError::forbidden("Owner API is not enabled"));
        };

        match bearer_token(&parts.headers) {
            Some(token) if constant_time_eq(token.as_bytes(), owner.token.as_bytes()) => {
                Ok(Self(owner.catalog.clone()))
            },
            Some(_) => {
                warn!(uri = %parts.uri, "Rejected owner request with a wrong token");
                Err(AppError::unauthorized("Invalid owner token"))
            },
            None => Err(AppError::unauthorized("Missing bearer token")),
        }
    }
}

/// Token from `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Compares without short-circuiting on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
