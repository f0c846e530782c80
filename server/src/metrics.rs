//! Prometheus metrics for the wishlist server.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `wishlist_reservations_total{outcome}` - Submissions by outcome
//!   (accepted, cancelled, rejected, not_found, error)
//! - `wishlist_broadcast_deliveries_total{outcome}` - Hub sends by outcome
//!   (delivered, dropped)
//! - `wishlist_notifications_total{outcome}` - Pushover sends (sent, failed)
//! - `wishlist_store_errors_total{operation}` - Failed database operations
//!
//! ## Gauges
//! - `wishlist_ws_connections` - Open WebSocket connections

use axum::{Router, routing::get};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use thiserror::Error;
use tokio::net::TcpListener;

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
    /// Failed to bind HTTP server
    #[error("Failed to bind metrics server: {0}")]
    Bind(#[from] std::io::Error),
}

/// Register all metric descriptions.
///
/// Call once at start-up, after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "wishlist_reservations_total",
        "Reservation submissions and cancellations by outcome"
    );
    describe_counter!(
        "wishlist_broadcast_deliveries_total",
        "Broadcast sends to WebSocket subscribers by outcome"
    );
    describe_counter!(
        "wishlist_notifications_total",
        "Owner push notifications by outcome"
    );
    describe_counter!(
        "wishlist_store_errors_total",
        "Failed database operations"
    );
    describe_gauge!(
        "wishlist_ws_connections",
        "Current number of open WebSocket connections"
    );

    tracing::info!("Metrics registered");
}

/// Install the Prometheus recorder and register descriptions.
///
/// # Errors
///
/// Returns `MetricsError::Install` if a recorder is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, MetricsError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| MetricsError::Install(e.to_string()))?;
    register_metrics();
    Ok(handle)
}

/// Router exposing `GET /metrics` in Prometheus text format.
pub fn metrics_router(handle: PrometheusHandle) -> Router {
    Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    )
}

/// Bind the metrics listener.
///
/// # Errors
///
/// Returns `MetricsError::Bind` if the address cannot be bound.
pub async fn bind(addr: &str) -> Result<TcpListener, MetricsError> {
    Ok(TcpListener::bind(addr).await?)
}
