//! # Database Persistence Layer
//!
//! Optional Postgres write-through for the lifecycle stores via SQLx.
//!
//! ## Architecture
//!
//! The in-memory stores are authoritative while the process runs. When
//! `DATABASE_URL` is set, every committed change is handed to [`PgJournal`],
//! which forwards it over a channel to a single writer task; the writer
//! applies each change in its own transaction, in commit order. On start-up
//! the stores are hydrated from the database with [`load::load_snapshot`].
//! When `DATABASE_URL` is absent the API runs in in-memory only mode.
//!
//! A write that fails after the in-memory commit cannot be reported to the
//! caller that made it. It is logged, counted in
//! `parcel_persistence_failures_total`, and readiness turns 503.

pub mod journal;
pub mod load;

pub use journal::PgJournal;

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Initialize the database connection pool and run migrations.
///
/// Returns `None` if no URL is configured (in-memory only mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool(database_url: Option<&str>) -> Result<Option<PgPool>, sqlx::Error> {
    let Some(url) = database_url else {
        tracing::warn!(
            "DATABASE_URL not set: running in-memory only mode. \
             State will not survive restarts."
        );
        return Ok(None);
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    // Run embedded migrations.
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}
