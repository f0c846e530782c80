//! Wishlist reservation server.
//!
//! Configuration, owner push notifications, Prometheus metrics and the
//! bootstrap that wires `wishlist-core`, `wishlist-postgres` and
//! `wishlist-web` into a running process. The `server` binary is a thin
//! wrapper around [`bootstrap::run`].

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bootstrap;
pub mod config;
pub mod metrics;
pub mod pushover;

pub use bootstrap::{Application, BootstrapError, Storage, build, run};
pub use config::Config;
pub use pushover::{NotifyError, PushoverNotifier};
