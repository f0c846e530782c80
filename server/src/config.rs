//! Configuration management for the wishlist server.
//!
//! Loads configuration from environment variables with sensible defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use wishlist_web::WsSettings;

/// Default Pushover messages endpoint.
pub const DEFAULT_PUSHOVER_API_URL: &str = "https://api.pushover.net/1/messages.json";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// `PostgreSQL` configuration; `None` runs on in-memory storage
    pub database: Option<DatabaseConfig>,
    /// WebSocket and broadcast configuration
    pub websocket: WebSocketConfig,
    /// Owner push notifications
    pub pushover: PushoverConfig,
    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,
    /// Bearer token for the owner endpoints; they are disabled when absent
    #[serde(skip_serializing)]
    pub owner_api_token: Option<String>,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Log level
    pub log_level: String,
    /// Metrics server host
    pub metrics_host: String,
    /// Metrics server port
    pub metrics_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout: u64,
}

/// `PostgreSQL` configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout: u64,
}

/// WebSocket configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketConfig {
    /// Per-subscriber send deadline in milliseconds
    pub send_timeout_ms: u64,
    /// Keep-alive ping interval in seconds
    pub ping_interval_secs: u64,
    /// Idle timeout in seconds
    pub idle_timeout_secs: u64,
    /// Maximum concurrent connections
    pub max_connections: usize,
}

/// Pushover configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushoverConfig {
    /// Application token; notifications are skipped when absent
    pub app_token: Option<String>,
    /// Messages endpoint
    pub api_url: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Falls back to defaults if environment variables are not set.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let text = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Self {
            server: ServerConfig {
                host: text("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parsed(&lookup, "PORT", 8080),
                log_level: text("RUST_LOG").unwrap_or_else(|| "info".to_string()),
                metrics_host: text("METRICS_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                metrics_port: parsed(&lookup, "METRICS_PORT", 9090),
                shutdown_timeout: parsed(&lookup, "SHUTDOWN_TIMEOUT", 30),
            },
            database: text("DATABASE_URL").map(|url| DatabaseConfig {
                url,
                max_connections: parsed(&lookup, "DATABASE_MAX_CONNECTIONS", 10),
                connect_timeout: parsed(&lookup, "DATABASE_CONNECT_TIMEOUT", 30),
            }),
            websocket: WebSocketConfig {
                send_timeout_ms: parsed(&lookup, "WS_SEND_TIMEOUT_MS", 2_000),
                ping_interval_secs: parsed(&lookup, "WS_PING_INTERVAL_SECS", 30),
                idle_timeout_secs: parsed(&lookup, "WS_IDLE_TIMEOUT_SECS", 300),
                max_connections: parsed(&lookup, "WS_MAX_CONNECTIONS", 10_000),
            },
            pushover: PushoverConfig {
                app_token: text("PUSHOVER_APP_TOKEN"),
                api_url: text("PUSHOVER_API_URL")
                    .unwrap_or_else(|| DEFAULT_PUSHOVER_API_URL.to_string()),
            },
            cors_origins: text("CORS_ORIGINS").map_or_else(
                || vec!["*".to_string()],
                |origins| {
                    origins
                        .split(',')
                        .map(str::trim)
                        .filter(|origin| !origin.is_empty())
                        .map(ToString::to_string)
                        .collect()
                },
            ),
            owner_api_token: text("OWNER_API_TOKEN").map(|token| token.trim().to_string()),
        }
    }

    /// Address the HTTP server binds to.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Address the metrics server binds to.
    #[must_use]
    pub fn metrics_address(&self) -> String {
        format!("{}:{}", self.server.metrics_host, self.server.metrics_port)
    }

    /// Graceful shutdown deadline.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout)
    }

    /// Per-subscriber send deadline for the broadcast hub.
    #[must_use]
    pub const fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.websocket.send_timeout_ms)
    }

    /// WebSocket limits for the web layer.
    #[must_use]
    pub const fn ws_settings(&self) -> WsSettings {
        WsSettings {
            ping_interval: Duration::from_secs(self.websocket.ping_interval_secs),
            idle_timeout: Duration::from_secs(self.websocket.idle_timeout_secs),
            max_connections: self.websocket.max_connections,
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}
