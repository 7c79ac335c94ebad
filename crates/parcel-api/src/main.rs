//! # parcel-api: Binary Entry Point
//!
//! Starts the Axum HTTP server. With `DATABASE_URL` set, the in-memory
//! stores are hydrated from Postgres before the listener opens and every
//! committed change is written back by the storage writer; without it the
//! service runs in-memory only.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use parcel_api::db::{self, PgJournal};
use parcel_api::middleware::metrics::ApiMetrics;
use parcel_api::state::{AppConfig, AppState, Core, LogFormat, PersistenceHealth};
use parcel_lifecycle::ChangeJournal;
use parcel_state::AuditTrail;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env();

    // Initialize structured tracing.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(?config, "configuration loaded");

    // Initialize database pool (optional: absent means in-memory only).
    let db_pool = db::init_pool(config.database_url.as_deref())
        .await
        .map_err(|e| {
            tracing::error!("Database initialization failed: {e}");
            e
        })?;

    let metrics = ApiMetrics::new();
    let persistence = PersistenceHealth::new();

    let (core, writer) = match &db_pool {
        Some(pool) => {
            // Hydrate fully before accepting traffic.
            let snapshot = db::load::load_snapshot(pool).await.map_err(|e| {
                tracing::error!("Database hydration failed: {e}");
                e
            })?;
            let (journal, writer) =
                PgJournal::spawn(pool.clone(), metrics.clone(), persistence.clone());
            let journal: Arc<dyn ChangeJournal> = Arc::new(journal);
            let core = Core::open(Some(journal), snapshot).map_err(|e| {
                tracing::error!("Restoring persisted state failed: {e}");
                e
            })?;
            (core, Some(writer))
        }
        None => (Core::build(None, AuditTrail::new()), None),
    };

    let port = config.port;
    let state = AppState::assemble(config, core, metrics, persistence, db_pool);
    let shutdown = state.shutdown.clone();
    let app = parcel_api::app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("parcel API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {e}");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutdown requested");
            shutdown.cancel();
        })
        .await?;

    // The router (and with it every journal sender) is gone; let the
    // writer drain what was already committed.
    if let Some(writer) = writer {
        if let Err(e) = writer.await {
            tracing::error!("Storage writer task failed: {e}");
        }
    }

    Ok(())
}
