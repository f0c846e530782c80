//! HTTP request handlers.
//!
//! This module contains all HTTP handlers organized by surface.

pub mod health;
pub mod owner;
pub mod public;
pub mod websocket;

pub use health::{health_check, readiness_check};
