//! Route configuration.
//!
//! ```text
//! GET    /health
//! GET    /ready
//! GET    /api/public/wishlists/by-slug/:slug
//! POST   /api/public/items/:item_id/reserve
//! POST   /api/public/items/:item_id/contribute
//! DELETE /api/public/reservations/:reservation_id
//! POST   /api/owner/wishlists                                (bearer token)
//! POST   /api/owner/wishlists/:wishlist_id/items             (bearer token)
//! PUT    /api/owner/wishlists/:wishlist_id/notification-key  (bearer token)
//! GET    /api/ws/wishlist/:wishlist_id          (WebSocket)
//! ```

use crate::handlers::{health_check, owner, public, readiness_check, websocket};
use crate::state::AppState;
use axum::{
    Router,
    extract::Request,
    http::{HeaderValue, Method},
    routing::{delete, get, post, put},
};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Build the application router.
///
/// Every request gets an `x-request-id` (generated when absent) that is
/// recorded on its trace span and echoed on the response.
pub fn build_router(state: AppState, cors: CorsLayer) -> Router {
    let public_routes = Router::new()
        .route(
            "/wishlists/by-slug/:slug",
            get(public::get_wishlist_by_slug),
        )
        .route("/items/:item_id/reserve", post(public::reserve_item))
        .route(
            "/items/:item_id/contribute",
            post(public::contribute_to_item),
        )
        .route(
            "/reservations/:reservation_id",
            delete(public::cancel_reservation),
        );

    let owner_routes = Router::new()
        .route("/wishlists", post(owner::create_wishlist))
        .route("/wishlists/:wishlist_id/items", post(owner::add_item))
        .route(
            "/wishlists/:wishlist_id/notification-key",
            put(owner::set_notification_key),
        );

    let ws_routes =
        Router::new().route("/wishlist/:wishlist_id", get(websocket::wishlist_updates));

    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id,
                )
            }),
        )
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(cors);

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .nest("/api/public", public_routes)
        .nest("/api/owner", owner_routes)
        .nest("/api/ws", ws_routes)
        .layer(middleware)
        .with_state(state)
}

/// CORS policy from a list of allowed origins. `*` allows any origin.
///
/// Origins that are not valid header values are skipped with a warning.
#[must_use]
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    if origins.iter().any(|origin| origin == "*") {
        return base.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Ignoring invalid CORS origin");
                None
            },
        })
        .collect();

    base.allow_origin(AllowOrigin::list(allowed))
}
