//! Health check endpoints.
//!
//! These endpoints are used by load balancers and monitoring systems
//! to verify service health.

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

/// Simple health check endpoint (for basic liveness).
///
/// Returns 200 OK to indicate the service is running.
/// This endpoint does NOT check dependencies (database, etc.).
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Readiness report with live-connection statistics.
#[derive(Debug, Serialize)]
pub struct ReadinessReport {
    /// Always `"ready"` when the handler answers
    pub status: &'static str,
    /// Open WebSocket connections
    pub connections: usize,
    /// Registered hub subscribers across all wishlists
    pub subscribers: usize,
    /// Wishlists with at least one subscriber
    pub watched_wishlists: usize,
}

/// Readiness check.
///
/// # Endpoint
///
/// ```text
/// GET /ready
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "ready",
///   "connections": 3,
///   "subscribers": 3,
///   "watched_wishlists": 2
/// }
/// ```
#[allow(clippy::unused_async)]
pub async fn readiness_check(State(state): State<AppState>) -> Json<ReadinessReport> {
    let hub = state.hub();
    Json(ReadinessReport {
        status: "ready",
        connections: state.active_connections(),
        subscribers: hub.total_subscribers(),
        watched_wishlists: hub.active_wishlists(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simple_health_check() {
        let (status, body) = health_check().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }
}
