//! # Prometheus Metrics
//!
//! HTTP-level metrics (request counts, latency, errors) are recorded in
//! middleware. Lifecycle counters (accepted and rejected transitions,
//! capacity refusals, bulk rows, persistence failures) are recorded by the
//! handlers and the storage writer as events happen. Warehouse utilization
//! and shipments-by-status gauges are refreshed on each `/metrics` scrape
//! (pull model); see the metrics handler in `lib.rs`.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use prometheus::{
    core::Collector, Encoder, GaugeVec, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};

use parcel_ingest::UploadResult;
use parcel_lifecycle::LifecycleError;
use parcel_state::ShipmentStatus;

/// Shared metrics state backed by a Prometheus registry.
#[derive(Clone)]
pub struct ApiMetrics {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,

    // -- HTTP middleware metrics (push model) --
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    http_errors_total: IntCounterVec,

    // -- Lifecycle counters (push model) --
    transitions_total: IntCounterVec,
    transition_rejections_total: IntCounterVec,
    capacity_refusals_total: IntCounterVec,
    bulk_rows_total: IntCounterVec,
    persistence_failures_total: IntCounter,

    // -- Gauges (pull model, updated on /metrics scrape) --
    warehouse_utilization_percent: GaugeVec,
    warehouse_load: GaugeVec,
    shipments_total: GaugeVec,
}

impl std::fmt::Debug for ApiMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiMetrics")
            .field("requests", &self.requests())
            .field("errors", &self.errors())
            .field("persistence_failures", &self.persistence_failures())
            .finish()
    }
}

fn sum_counters(collector: &impl Collector) -> u64 {
    collector
        .collect()
        .iter()
        .flat_map(|mf| mf.get_metric())
        .map(|m| m.get_counter().get_value() as u64)
        .sum()
}

impl ApiMetrics {
    /// Create a new metrics instance with a fresh Prometheus registry.
    pub fn new() -> Self {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("parcel_http_requests_total", "Total HTTP requests"),
            &["method", "path", "status"],
        )
        .expect("metric can be created");

        let http_request_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "parcel_http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["method", "path"],
        )
        .expect("metric can be created");

        let http_errors_total = IntCounterVec::new(
            Opts::new("parcel_http_errors_total", "Total HTTP errors (4xx and 5xx)"),
            &["method", "path", "status"],
        )
        .expect("metric can be created");

        let transitions_total = IntCounterVec::new(
            Opts::new(
                "parcel_transitions_total",
                "Accepted status transitions by target status",
            ),
            &["to"],
        )
        .expect("metric can be created");

        let transition_rejections_total = IntCounterVec::new(
            Opts::new(
                "parcel_transition_rejections_total",
                "Rejected status transitions by error code",
            ),
            &["code"],
        )
        .expect("metric can be created");

        let capacity_refusals_total = IntCounterVec::new(
            Opts::new(
                "parcel_capacity_refusals_total",
                "Warehouse reservations refused for lack of capacity",
            ),
            &["source"],
        )
        .expect("metric can be created");

        let bulk_rows_total = IntCounterVec::new(
            Opts::new("parcel_bulk_rows_total", "Bulk upload rows by outcome"),
            &["outcome"],
        )
        .expect("metric can be created");

        let persistence_failures_total = IntCounter::new(
            "parcel_persistence_failures_total",
            "Committed changes that could not be written to the database",
        )
        .expect("metric can be created");

        let warehouse_utilization_percent = GaugeVec::new(
            Opts::new(
                "parcel_warehouse_utilization_percent",
                "Warehouse load as a rounded percentage of capacity",
            ),
            &["warehouse_id"],
        )
        .expect("metric can be created");

        let warehouse_load = GaugeVec::new(
            Opts::new("parcel_warehouse_load", "Units currently stored per warehouse"),
            &["warehouse_id"],
        )
        .expect("metric can be created");

        let shipments_total = GaugeVec::new(
            Opts::new("parcel_shipments_total", "Shipments by status"),
            &["status"],
        )
        .expect("metric can be created");

        registry
            .register(Box::new(http_requests_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(http_request_duration_seconds.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(http_errors_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(transitions_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(transition_rejections_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(capacity_refusals_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(bulk_rows_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(persistence_failures_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(warehouse_utilization_percent.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(warehouse_load.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(shipments_total.clone()))
            .expect("metric can be registered");

        Self {
            inner: Arc::new(Inner {
                registry,
                http_requests_total,
                http_request_duration_seconds,
                http_errors_total,
                transitions_total,
                transition_rejections_total,
                capacity_refusals_total,
                bulk_rows_total,
                persistence_failures_total,
                warehouse_utilization_percent,
                warehouse_load,
                shipments_total,
            }),
        }
    }

    /// Total request count (sum across all labels).
    pub fn requests(&self) -> u64 {
        sum_counters(&self.inner.http_requests_total)
    }

    /// Total error count (sum across all labels).
    pub fn errors(&self) -> u64 {
        sum_counters(&self.inner.http_errors_total)
    }

    pub fn persistence_failures(&self) -> u64 {
        self.inner.persistence_failures_total.get()
    }

    /// Record an HTTP request (called by the middleware).
    fn record_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.inner
            .http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();

        self.inner
            .http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);

        if status >= 400 {
            self.inner
                .http_errors_total
                .with_label_values(&[method, path, &status_str])
                .inc();
        }
    }

    // -- Lifecycle events --

    pub fn transition_accepted(&self, to: ShipmentStatus) {
        self.inner
            .transitions_total
            .with_label_values(&[to.as_str()])
            .inc();
    }

    pub fn transition_rejected(&self, err: &LifecycleError) {
        self.inner
            .transition_rejections_total
            .with_label_values(&[err.code()])
            .inc();
        self.observe_refusal("transition", err);
    }

    /// Count a capacity refusal if `err` is one (directly or as the cause
    /// of an incomplete reassignment).
    pub fn observe_refusal(&self, source: &str, err: &LifecycleError) {
        let refused = match err {
            LifecycleError::CapacityExceeded { .. } => true,
            LifecycleError::ReassignmentIncomplete { cause, .. } => {
                matches!(**cause, LifecycleError::CapacityExceeded { .. })
            }
            _ => false,
        };
        if refused {
            self.inner
                .capacity_refusals_total
                .with_label_values(&[source])
                .inc();
        }
    }

    pub fn capacity_refusals(&self) -> u64 {
        sum_counters(&self.inner.capacity_refusals_total)
    }

    pub fn transitions(&self, to: ShipmentStatus) -> u64 {
        self.inner
            .transitions_total
            .with_label_values(&[to.as_str()])
            .get()
    }

    /// Count every row of a finished upload by outcome.
    pub fn record_upload(&self, result: &UploadResult) {
        let rows = &self.inner.bulk_rows_total;
        rows.with_label_values(&["created"])
            .inc_by(result.successful as u64);
        rows.with_label_values(&["failed"])
            .inc_by(result.failed as u64);
        rows.with_label_values(&["skipped"])
            .inc_by(result.skipped as u64);
        let refusals = result
            .warnings
            .iter()
            .filter(|w| w.code == "CAPACITY_EXCEEDED")
            .count();
        if refusals > 0 {
            self.inner
                .capacity_refusals_total
                .with_label_values(&["bulk"])
                .inc_by(refusals as u64);
        }
    }

    pub fn bulk_rows(&self, outcome: &str) -> u64 {
        self.inner
            .bulk_rows_total
            .with_label_values(&[outcome])
            .get()
    }

    pub fn persistence_failed(&self) {
        self.inner.persistence_failures_total.inc();
    }

    // -- Gauge accessors (used by the /metrics handler) --

    pub fn warehouse_utilization_percent(&self) -> &GaugeVec {
        &self.inner.warehouse_utilization_percent
    }

    pub fn warehouse_load(&self) -> &GaugeVec {
        &self.inner.warehouse_load
    }

    pub fn shipments_total(&self) -> &GaugeVec {
        &self.inner.shipments_total
    }

    /// Gather all metrics and encode to Prometheus text format.
    pub fn gather_and_encode(&self) -> Result<String, String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| format!("failed to encode metrics: {e}"))?;
        String::from_utf8(buffer)
            .map_err(|e| format!("metrics encoding produced invalid UTF-8: {e}"))
    }
}

impl Default for ApiMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalize a request path by replacing UUID segments with `{id}`.
///
/// Keeps Prometheus label cardinality bounded.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            let hyphenated = segment.len() == 36
                && segment.chars().enumerate().all(|(i, c)| {
                    if i == 8 || i == 13 || i == 18 || i == 23 {
                        c == '-'
                    } else {
                        c.is_ascii_hexdigit()
                    }
                });
            let simple = segment.len() == 32 && segment.chars().all(|c| c.is_ascii_hexdigit());
            if hyphenated || simple {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Middleware that records HTTP request metrics via Prometheus.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());
    let start = Instant::now();

    let response = next.run(request).await;

    if let Some(m) = metrics {
        let duration = start.elapsed().as_secs_f64();
        let status = response.status().as_u16();
        m.record_request(&method, &path, status, duration);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use parcel_core::WarehouseId;
    use parcel_ingest::RowWarning;

    #[test]
    fn starts_at_zero() {
        let m = ApiMetrics::new();
        assert_eq!(m.requests(), 0);
        assert_eq!(m.errors(), 0);
        assert_eq!(m.persistence_failures(), 0);
    }

    #[test]
    fn errors_counted_separately() {
        let m = ApiMetrics::new();
        m.record_request("GET", "/shipments", 200, 0.01);
        m.record_request("POST", "/shipments/{id}/status", 409, 0.02);
        m.record_request("GET", "/shipments/{id}", 404, 0.005);
        assert_eq!(m.requests(), 3);
        assert_eq!(m.errors(), 2);
    }

    #[test]
    fn capacity_refusal_seen_through_reassignment() {
        let m = ApiMetrics::new();
        let refused = LifecycleError::CapacityExceeded {
            warehouse_id: WarehouseId::new(),
            capacity: 2,
            current_load: 2,
            requested: 1,
        };
        m.transition_rejected(&refused);
        m.observe_refusal(
            "assignment",
            &LifecycleError::ReassignmentIncomplete {
                shipment_id: parcel_core::ShipmentId::new(),
                released_from: WarehouseId::new(),
                attempted: WarehouseId::new(),
                cause: Box::new(refused),
            },
        );
        m.observe_refusal(
            "assignment",
            &LifecycleError::InvariantViolation("x".into()),
        );
        assert_eq!(m.capacity_refusals(), 2);
    }

    #[test]
    fn upload_rows_by_outcome() {
        let m = ApiMetrics::new();
        let result = UploadResult {
            total: 5,
            successful: 3,
            failed: 1,
            skipped: 1,
            warnings: vec![RowWarning {
                row: 2,
                shipment_id: parcel_core::ShipmentId::new(),
                code: "CAPACITY_EXCEEDED".into(),
                warning: "full".into(),
            }],
            ..Default::default()
        };
        m.record_upload(&result);
        assert_eq!(m.bulk_rows("created"), 3);
        assert_eq!(m.bulk_rows("failed"), 1);
        assert_eq!(m.bulk_rows("skipped"), 1);
        assert_eq!(m.capacity_refusals(), 1);
    }

    #[test]
    fn gather_and_encode_lists_domain_metrics() {
        let m = ApiMetrics::new();
        m.transition_accepted(ShipmentStatus::InWarehouse);
        m.persistence_failed();
        let text = m.gather_and_encode().unwrap();
        assert!(text.contains("parcel_transitions_total{to=\"IN_WAREHOUSE\"} 1"));
        assert!(text.contains("parcel_persistence_failures_total 1"));
    }

    #[test]
    fn normalize_path_replaces_uuids() {
        assert_eq!(
            normalize_path("/shipments/550e8400-e29b-41d4-a716-446655440000/status"),
            "/shipments/{id}/status"
        );
        assert_eq!(
            normalize_path("/warehouses/550e8400e29b41d4a716446655440000"),
            "/warehouses/{id}"
        );
        assert_eq!(normalize_path("/shipments/bulk"), "/shipments/bulk");
    }
}
