//! Axum HTTP and WebSocket surface for anonymous wishlist reservations.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │           Axum shell (this crate)       │  ← HTTP, JSON, WebSocket frames
//! │  - Request parsing / AppError mapping   │  ← CORS, request ids, tracing
//! │  - WebSocket sinks for the hub          │  ← Connection limits, keep-alive
//! ├─────────────────────────────────────────┤
//! │           wishlist-core                 │
//! │  - ReservationAggregator                │  ← No-overbooking boundary
//! │  - Event factory / BroadcastHub         │  ← Per-wishlist fan-out
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Request Flow
//!
//! 1. **HTTP Request** arrives at an Axum handler
//! 2. **Extract data** from the path, body and headers
//! 3. **Build a `ReservationRequest`** from the amount, if any
//! 4. **Submit** through `ReservationService`
//! 5. **Broadcast** the new item state to the wishlist's sockets
//! 6. **Map result** to an HTTP response (`201`, `404`, `409`, ...)
//!
//! # Example
//!
//! ```ignore
//! use wishlist_web::{AppState, WsSettings, build_router, cors_layer};
//!
//! let state = AppState::new(service, WsSettings::default())
//!     .with_owner_api(catalog_service, owner_token);
//! let app = build_router(state, cors_layer(&["*".to_string()]));
//! axum::serve(listener, app).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod routes;
pub mod state;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::OwnerAccess;
pub use routes::{build_router, cors_layer};
pub use state::{AppState, WsSettings};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
