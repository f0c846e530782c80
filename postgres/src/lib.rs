//! `PostgreSQL` reservation store and catalog for the wishlist workspace.
//!
//! This crate provides a PostgreSQL-backed implementation of the
//! `ReservationStore` and `Catalog` traits from `wishlist-core`. It uses sqlx
//! and supports:
//!
//! - Soft-deleted reservations (`status = 'cancelled'`)
//! - Amounts stored as integer cents
//! - Connection pooling
//! - Embedded migrations
//!
//! # Example
//!
//! ```ignore
//! use wishlist_postgres::PostgresStore;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresStore::connect("postgres://localhost/wishlist", 10, Duration::from_secs(5)).await?;
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod store;

pub use store::PostgresStore;
