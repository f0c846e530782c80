//! Wishlist Reservation Server
//!
//! # Usage
//!
//! ```bash
//! # In-memory storage, no notifications
//! cargo run --bin server
//!
//! # PostgreSQL and Pushover
//! DATABASE_URL=postgres://localhost/wishlist PUSHOVER_APP_TOKEN=... cargo run --bin server
//! ```

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wishlist_server::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wishlist=debug,tower_http=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting wishlist reservation server...");

    let config = Config::from_env();
    tracing::info!(
        bind = %config.bind_address(),
        database = config.database.is_some(),
        pushover = config.pushover.app_token.is_some(),
        "Configuration loaded"
    );

    wishlist_server::run(config, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Unable to listen for shutdown signal");
        }
    })
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}
