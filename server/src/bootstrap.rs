//! Wires configuration into a running application.
//!
//! ```text
//! Config
//!   ├─ DATABASE_URL? ── PostgresStore (migrated) ─┐
//!   │                └─ in-memory store/catalog ──┤
//!   ├─ PushoverNotifier                           ├─> ReservationService ─> AppState ─> Router
//!   ├─ BroadcastHub(send_timeout)  ───────────────┘                           ▲
//!   └─ OWNER_API_TOKEN? ── CatalogService (catalog writes) ───────────────────┘
//! ```

use crate::config::Config;
use crate::metrics::{self, MetricsError};
use crate::pushover::{NotifyError, PushoverNotifier};
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use wishlist_core::aggregator::ReservationAggregator;
use wishlist_core::catalog::CatalogService;
use wishlist_core::environment::SystemClock;
use wishlist_core::error::StoreError;
use wishlist_core::hub::BroadcastHub;
use wishlist_core::service::ReservationService;
use wishlist_core::store::{Catalog, CatalogAdmin, ReservationStore};
use wishlist_postgres::PostgresStore;
use wishlist_testing::{InMemoryCatalog, InMemoryReservationStore};
use wishlist_web::{AppState, build_router, cors_layer};

/// Errors that stop the server from starting.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Database connection or migration failed
    #[error("Storage initialization failed: {0}")]
    Store(#[from] StoreError),

    /// Notification client could not be created
    #[error("Notifier initialization failed: {0}")]
    Notifier(#[from] NotifyError),

    /// Metrics exporter could not be installed or bound
    #[error(transparent)]
    Metrics(#[from] MetricsError),

    /// HTTP listener could not be bound or served
    #[error("HTTP server error: {0}")]
    Server(#[from] std::io::Error),
}

/// Where reservations and the catalog live.
#[derive(Clone)]
pub enum Storage {
    /// `PostgreSQL`, migrated at start-up
    Postgres(PostgresStore),
    /// Process memory; the catalog handle allows seeding
    InMemory(Arc<InMemoryCatalog>),
}

impl Storage {
    /// Short label for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::InMemory(_) => "in-memory",
        }
    }
}

/// A fully wired application, ready to serve.
pub struct Application {
    /// Shared handler state
    pub state: AppState,
    /// Router with all routes and middleware
    pub router: Router,
    /// Backing storage
    pub storage: Storage,
}

/// Build the application from configuration.
///
/// # Errors
///
/// - `Store` if the database is configured but unreachable or migrations fail
/// - `Notifier` if the HTTP client cannot be built
pub async fn build(config: &Config) -> Result<Application, BootstrapError> {
    let (store, catalog, admin, storage): (
        Arc<dyn ReservationStore>,
        Arc<dyn Catalog>,
        Arc<dyn CatalogAdmin>,
        Storage,
    ) = if let Some(database) = &config.database {
        let postgres = PostgresStore::connect(
            &database.url,
            database.max_connections,
            std::time::Duration::from_secs(database.connect_timeout),
        )
        .await?;
        postgres.migrate().await?;
        info!("Connected to PostgreSQL, migrations applied");
        let shared = Arc::new(postgres.clone());
        let store: Arc<dyn ReservationStore> = shared.clone();
        let catalog: Arc<dyn Catalog> = shared.clone();
        let admin: Arc<dyn CatalogAdmin> = shared;
        (store, catalog, admin, Storage::Postgres(postgres))
    } else {
        warn!("DATABASE_URL not set, using in-memory storage");
        let memory = Arc::new(InMemoryCatalog::new());
        let store: Arc<dyn ReservationStore> = Arc::new(InMemoryReservationStore::new());
        let catalog: Arc<dyn Catalog> = memory.clone();
        let admin: Arc<dyn CatalogAdmin> = memory.clone();
        (store, catalog, admin, Storage::InMemory(memory))
    };

    let notifier = PushoverNotifier::new(&config.pushover)?;
    if !notifier.is_configured() {
        info!("PUSHOVER_APP_TOKEN not set, owner notifications disabled");
    }

    let hub = Arc::new(BroadcastHub::new(config.send_timeout()));
    let aggregator = Arc::new(ReservationAggregator::new(
        store,
        catalog.clone(),
        Arc::new(SystemClock),
    ));
    let owner_catalog = CatalogService::new(admin, catalog.clone(), Arc::new(SystemClock));
    let service = ReservationService::new(aggregator, catalog, hub, Arc::new(notifier));

    let mut state = AppState::new(service, config.ws_settings());
    match &config.owner_api_token {
        Some(token) => state = state.with_owner_api(owner_catalog, token.as_str()),
        None => warn!("OWNER_API_TOKEN not set, owner endpoints disabled"),
    }
    let router = build_router(state.clone(), cors_layer(&config.cors_origins));

    Ok(Application {
        state,
        router,
        storage,
    })
}

/// Run the HTTP and metrics servers until `shutdown` resolves.
///
/// In-flight requests get `config.shutdown_timeout()` to finish.
///
/// # Errors
///
/// Returns `BootstrapError` if start-up fails or a listener cannot be bound.
pub async fn run<F>(config: Config, shutdown: F) -> Result<(), BootstrapError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let prometheus = metrics::install_recorder()?;
    let app = build(&config).await?;
    info!(storage = app.storage.kind(), "Application initialized");

    let listener = TcpListener::bind(config.bind_address()).await?;
    let metrics_listener = metrics::bind(&config.metrics_address()).await?;
    info!(addr = %config.bind_address(), "HTTP server listening");
    info!(addr = %config.metrics_address(), "Prometheus metrics available at /metrics");

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    let mut http_shutdown = shutdown_tx.subscribe();
    let mut server_task = tokio::spawn(async move {
        axum::serve(listener, app.router)
            .with_graceful_shutdown(async move {
                let _ = http_shutdown.recv().await;
            })
            .await
    });

    let mut metrics_shutdown = shutdown_tx.subscribe();
    let metrics_task = tokio::spawn(async move {
        axum::serve(metrics_listener, metrics::metrics_router(prometheus))
            .with_graceful_shutdown(async move {
                let _ = metrics_shutdown.recv().await;
            })
            .await
    });

    tokio::select! {
        () = shutdown => {
            info!("Shutdown signal received, draining connections");
        },
        result = &mut server_task => {
            // The server stopped on its own; nothing left to drain.
            metrics_task.abort();
            return match result {
                Ok(served) => served.map_err(BootstrapError::from),
                Err(e) => {
                    error!(error = %e, "HTTP server task failed");
                    Err(BootstrapError::Server(std::io::Error::other(e)))
                },
            };
        },
    }

    let _ = shutdown_tx.send(());

    match tokio::time::timeout(config.shutdown_timeout(), server_task).await {
        Ok(Ok(Ok(()))) => info!("HTTP server stopped"),
        Ok(Ok(Err(e))) => warn!(error = %e, "HTTP server error during shutdown"),
        Ok(Err(e)) => warn!(error = %e, "HTTP server task error during shutdown"),
        Err(_) => warn!(
            timeout_secs = config.server.shutdown_timeout,
            "Graceful shutdown timed out"
        ),
    }

    if let Err(e) = metrics_task.await {
        warn!(error = %e, "Metrics server task error during shutdown");
    }

    Ok(())
}
