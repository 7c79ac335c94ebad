//! # Application State
//!
//! Shared state for the Axum application: configuration, the lifecycle
//! engine and reference registry, the bulk pipeline, metrics and the
//! persistence health flag. The in-memory stores are the consistency domain;
//! the database (when configured) is written behind them by a single writer
//! task fed through the [`ChangeJournal`].

use std::sync::Arc;

use parking_lot::RwLock;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use parcel_ingest::BulkIngestionPipeline;
use parcel_lifecycle::{
    CapacityLedger, ChangeJournal, DriverRoster, InMemoryDirectory, LifecycleError,
    LifecycleParts, Lookup, Registry, StatusTransitionEngine,
};
use parcel_state::AuditTrail;

use crate::db::load::Snapshot;
use crate::middleware::metrics::ApiMetrics;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Application configuration.
///
/// Custom `Debug` redacts the database URL, which usually embeds a password.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Postgres URL. `None` runs in in-memory only mode.
    pub database_url: Option<String>,
    /// Body limit for `POST /shipments/bulk`.
    pub max_upload_bytes: usize,
    /// Mount `/metrics` and the metrics middleware.
    pub metrics_enabled: bool,
    pub log_format: LogFormat,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("metrics_enabled", &self.metrics_enabled)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            metrics_enabled: true,
            log_format: LogFormat::Text,
        }
    }
}

impl AppConfig {
    /// Build configuration from environment variables.
    ///
    /// Unparsable values fall back to the default with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            port: parse_or("PORT", get("PORT"), defaults.port),
            database_url: get("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            max_upload_bytes: parse_or(
                "PARCEL_MAX_UPLOAD_BYTES",
                get("PARCEL_MAX_UPLOAD_BYTES"),
                defaults.max_upload_bytes,
            ),
            // Enabled unless explicitly "false".
            metrics_enabled: get("PARCEL_METRICS_ENABLED")
                .map(|v| v.to_lowercase() != "false")
                .unwrap_or(true),
            log_format: match get("PARCEL_LOG_FORMAT").as_deref().map(str::to_lowercase) {
                Some(f) if f == "json" => LogFormat::Json,
                _ => LogFormat::Text,
            },
        }
    }
}

fn parse_or<T: std::str::FromStr + Copy + std::fmt::Display>(
    key: &str,
    raw: Option<String>,
    default: T,
) -> T {
    match raw {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, %default, "unparsable configuration value, using default");
            default
        }),
    }
}

/// Whether committed changes are reaching the database.
///
/// Once a write fails the in-memory state and the database have diverged;
/// the flag stays set until restart and readiness reports 503.
#[derive(Debug, Clone, Default)]
pub struct PersistenceHealth {
    failure: Arc<RwLock<Option<String>>>,
}

impl PersistenceHealth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure. The first message is kept.
    pub fn mark_failed(&self, message: impl Into<String>) {
        let mut failure = self.failure.write();
        if failure.is_none() {
            *failure = Some(message.into());
        }
    }

    pub fn failure(&self) -> Option<String> {
        self.failure.read().clone()
    }

    pub fn is_healthy(&self) -> bool {
        self.failure.read().is_none()
    }
}

/// The lifecycle components, wired over one directory, ledger, roster and
/// audit trail.
pub struct Core {
    pub engine: Arc<StatusTransitionEngine>,
    pub registry: Arc<Registry>,
    pub pipeline: Arc<BulkIngestionPipeline>,
}

impl Core {
    /// Fresh components over empty stores and the given audit trail.
    pub fn build(journal: Option<Arc<dyn ChangeJournal>>, audit: AuditTrail) -> Self {
        let directory = Arc::new(InMemoryDirectory::new());
        let lookup: Arc<dyn Lookup> = directory.clone();
        let ledger = Arc::new(CapacityLedger::new());
        let roster = Arc::new(DriverRoster::new());
        let engine = Arc::new(StatusTransitionEngine::new(LifecycleParts {
            lookup,
            ledger: Arc::clone(&ledger),
            roster: Arc::clone(&roster),
            audit: Arc::new(audit),
            journal: journal.clone(),
        }));
        let registry = Arc::new(Registry::new(directory, ledger, roster, journal));
        let pipeline = Arc::new(BulkIngestionPipeline::new(Arc::clone(&engine)));
        Self {
            engine,
            registry,
            pipeline,
        }
    }

    /// Build the components and restore `snapshot` into them.
    ///
    /// Restoration does not journal: the restored rows came from the store
    /// the journal writes to.
    pub fn open(
        journal: Option<Arc<dyn ChangeJournal>>,
        mut snapshot: Snapshot,
    ) -> Result<Self, LifecycleError> {
        let history = std::mem::take(&mut snapshot.history);
        let core = Self::build(journal, AuditTrail::from_entries(history));

        let counts = (
            snapshot.merchants.len(),
            snapshot.warehouses.len(),
            snapshot.drivers.len(),
            snapshot.shipments.len(),
        );
        for merchant in snapshot.merchants {
            core.registry.restore_merchant(merchant);
        }
        for (profile, account) in snapshot.warehouses {
            core.registry.restore_warehouse(profile, account)?;
        }
        for (profile, slot) in snapshot.drivers {
            core.registry.restore_driver(profile, slot)?;
        }
        for shipment in snapshot.shipments {
            core.engine.restore_shipment(shipment)?;
        }
        for retired in &snapshot.retired {
            core.engine.restore_retired_references(
                retired.shipment_id,
                &retired.tracking_number,
                &retired.barcode,
            )?;
        }
        tracing::info!(
            merchants = counts.0,
            warehouses = counts.1,
            drivers = counts.2,
            shipments = counts.3,
            retired_references = snapshot.retired.len(),
            history = core.engine.audit().len(),
            "hydrated in-memory stores"
        );
        Ok(core)
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub engine: Arc<StatusTransitionEngine>,
    pub registry: Arc<Registry>,
    pub pipeline: Arc<BulkIngestionPipeline>,
    pub metrics: ApiMetrics,
    pub persistence: PersistenceHealth,
    /// Cancelled on shutdown; bulk uploads stop at the next row.
    pub shutdown: CancellationToken,
    /// Present when `DATABASE_URL` is configured.
    pub db_pool: Option<PgPool>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("shipments", &self.engine.shipment_count())
            .field("persistence", &self.persistence)
            .field("db", &self.db_pool.is_some())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// In-memory state with default configuration.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    /// In-memory state, no journal, no database.
    pub fn with_config(config: AppConfig) -> Self {
        let core = Core::build(None, AuditTrail::new());
        Self::assemble(config, core, ApiMetrics::new(), PersistenceHealth::new(), None)
    }

    /// Wire already-built components into the shared state.
    pub fn assemble(
        config: AppConfig,
        core: Core,
        metrics: ApiMetrics,
        persistence: PersistenceHealth,
        db_pool: Option<PgPool>,
    ) -> Self {
        Self {
            config,
            engine: core.engine,
            registry: core.registry,
            pipeline: core.pipeline,
            metrics,
            persistence,
            shutdown: CancellationToken::new(),
            db_pool,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
