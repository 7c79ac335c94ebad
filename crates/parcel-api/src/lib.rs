//! # parcel-api: Axum API Service
//!
//! HTTP surface of the parcel lifecycle core, built on Axum/Tower/Tokio.
//!
//! ## Routes
//!
//! - `/shipments/*`: Shipment CRUD, status transitions, driver release,
//!   change polling
//! - `/shipments/bulk`, `/shipments/template`: CSV upload and its template
//! - `/warehouses/*`: Warehouses with live load and utilization
//! - `/drivers/*`: Drivers with their current assignment
//! - `/merchants/*`: Merchants
//! - `/openapi.json`: Generated OpenAPI spec
//! - `/health/*`, `/metrics`: Probes and Prometheus scrape, outside the
//!   request metrics middleware
//!
//! ## Middleware Stack (Tower)
//!
//! TraceLayer → MetricsMiddleware → Handler
//!
//! ## Crate Policy
//!
//! - No lifecycle logic in handlers: status, load and driver changes are
//!   delegated to `parcel-lifecycle`, uploads to `parcel-ingest`.
//! - All errors map to structured HTTP responses via `AppError`.
//! - The in-memory stores are authoritative while running; Postgres (when
//!   configured) is written behind them and read once at start-up.

pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use std::collections::HashMap;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::Router;
use tower_http::trace::TraceLayer;

use parcel_state::ShipmentStatus;

pub use error::AppError;
pub use state::AppState;

/// Body limit for every route except the bulk upload.
const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Build the application router with all routes and middleware.
pub fn app(state: AppState) -> Router {
    let metrics_on = state.config.metrics_enabled;

    // The bulk route carries its own, larger limit; the route-level layer
    // is innermost and wins over the router-wide one.
    let mut api = Router::new()
        .merge(routes::shipments::router())
        .merge(routes::bulk::router(state.config.max_upload_bytes))
        .merge(routes::warehouses::router())
        .merge(routes::drivers::router())
        .merge(routes::merchants::router())
        .merge(openapi::router())
        .layer(DefaultBodyLimit::max(DEFAULT_BODY_LIMIT));

    if metrics_on {
        api = api
            .layer(from_fn(middleware::metrics::metrics_middleware))
            .layer(axum::Extension(state.metrics.clone()));
    }

    let api = api
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let mut probes = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness));

    if metrics_on {
        probes = probes.route("/metrics", axum::routing::get(prometheus_metrics));
    }

    Router::new().merge(probes.with_state(state)).merge(api)
}

/// GET /metrics: Prometheus metrics scrape endpoint.
///
/// Refreshes the warehouse and shipment gauges from the live stores (pull
/// model), then encodes everything in Prometheus text exposition format.
async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    let metrics = &state.metrics;

    // -- Warehouse load and utilization --
    metrics.warehouse_utilization_percent().reset();
    metrics.warehouse_load().reset();
    for warehouse in state.registry.warehouses() {
        let id = warehouse.profile.id.to_string();
        metrics
            .warehouse_utilization_percent()
            .with_label_values(&[&id])
            .set(f64::from(warehouse.utilization));
        metrics
            .warehouse_load()
            .with_label_values(&[&id])
            .set(f64::from(warehouse.account.current_load));
    }

    // -- Shipments by status --
    let (shipments, _) = state.engine.list(None, 0, usize::MAX);
    let mut by_status: HashMap<ShipmentStatus, usize> = HashMap::new();
    for shipment in &shipments {
        *by_status.entry(shipment.status).or_default() += 1;
    }
    metrics.shipments_total().reset();
    for status in ShipmentStatus::ALL {
        metrics
            .shipments_total()
            .with_label_values(&[status.as_str()])
            .set(by_status.get(&status).copied().unwrap_or(0) as f64);
    }

    // -- Gather and encode --
    match metrics.gather_and_encode() {
        Ok(body) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to encode Prometheus metrics: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e).into_response()
        }
    }
}

/// Liveness probe: always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe.
///
/// Checks:
/// - Every committed change so far has been persisted (when a database is
///   configured). After a failed write memory and storage have diverged.
/// - The database answers.
///
/// Returns 200 "ready" or 503 with a diagnostic message.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if let Some(failure) = state.persistence.failure() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("persistence degraded: {failure}"),
        )
            .into_response();
    }

    if let Some(pool) = &state.db_pool {
        if let Err(e) = sqlx::query("SELECT 1").execute(pool).await {
            tracing::warn!("Database health check failed: {e}");
            return (StatusCode::SERVICE_UNAVAILABLE, "database unreachable").into_response();
        }
    }

    (StatusCode::OK, "ready").into_response()
}
