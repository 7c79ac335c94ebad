//! # Integration Tests for parcel-api
//!
//! Drives the assembled router with `oneshot` requests: health probes,
//! shipment creation and transitions, capacity refusals, driver dispatch,
//! edits, deletion, change polling, bulk upload, reference data, metrics
//! and the OpenAPI document.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use parcel_api::state::{AppConfig, AppState};
use parcel_ingest::{template_csv, TEMPLATE_COLUMNS};

/// Helper: build the test app over fresh in-memory state.
fn test_app() -> axum::Router {
    parcel_api::app(AppState::new())
}

/// Helper: read response body as string.
async fn body_string(response: axum::http::Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Helper: send a request with an optional JSON body and parse the JSON reply.
async fn send(app: &axum::Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let text = body_string(response).await;
    let value = if text.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    };
    (status, value)
}

fn is_unset(value: &Value, field: &str) -> bool {
    value.get(field).map_or(true, Value::is_null)
}

async fn merchant(app: &axum::Router) -> String {
    let (status, body) = send(app, Method::POST, "/merchants", Some(json!({"name": "Nile Books"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

async fn warehouse(app: &axum::Router, capacity: u32) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/warehouses",
        Some(json!({"name": "Giza Hub", "city": "Giza", "capacity": capacity})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

async fn driver(app: &axum::Router) -> String {
    let (status, body) = send(app, Method::POST, "/drivers", Some(json!({"name": "Omar Adel"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

fn shipment_body(merchant_id: &str) -> Value {
    json!({
        "merchantId": merchant_id,
        "customerName": "Hana Samir",
        "customerPhone": "01001234567",
        "customerAddress": "5 Corniche Rd",
        "city": "Alexandria",
        "description": "Shoes",
        "declaredValue": 450,
        "shippingCost": 35,
    })
}

/// Create a shipment and return the whole `POST /shipments` reply.
async fn create(app: &axum::Router, body: Value) -> Value {
    let (status, created) = send(app, Method::POST, "/shipments", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    created
}

async fn create_id(app: &axum::Router, merchant_id: &str) -> String {
    let created = create(app, shipment_body(merchant_id)).await;
    created["shipment"]["id"].as_str().unwrap().to_string()
}

async fn transition(app: &axum::Router, id: &str, body: Value) -> (StatusCode, Value) {
    send(app, Method::POST, &format!("/shipments/{id}/status"), Some(body)).await
}

// -- Health Probes ------------------------------------------------------------

#[tokio::test]
async fn test_liveness_probe() {
    let app = test_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health/liveness")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ok");
}

#[tokio::test]
async fn test_readiness_probe() {
    let app = test_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health/readiness")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ready");
}

#[tokio::test]
async fn test_readiness_reports_persistence_failure() {
    let state = AppState::new();
    state.persistence.mark_failed("connection reset");
    let app = parcel_api::app(state);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health/readiness")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(body_string(response).await.contains("connection reset"));
}

// -- Shipment Creation ---------------------------------------------------------

#[tokio::test]
async fn test_create_and_get_shipment_detail() {
    let app = test_app();
    let merchant_id = merchant(&app).await;
    let created = create(&app, shipment_body(&merchant_id)).await;
    let shipment = &created["shipment"];
    assert_eq!(shipment["status"], "NEW");
    assert!(shipment["trackingNumber"].as_str().is_some_and(|t| !t.is_empty()));
    assert_eq!(created["warnings"], json!([]));

    let id = shipment["id"].as_str().unwrap();
    let (status, detail) = send(&app, Method::GET, &format!("/shipments/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["customerName"], "Hana Samir");
    let history = detail["statusHistory"].as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["status"], "NEW");
}

#[tokio::test]
async fn test_create_shipment_rejects_blank_customer_name() {
    let app = test_app();
    let merchant_id = merchant(&app).await;
    let mut body = shipment_body(&merchant_id);
    body["customerName"] = json!("   ");
    let (status, error) = send(&app, Method::POST, "/shipments", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_create_shipment_unknown_merchant_is_404() {
    let app = test_app();
    let body = shipment_body("550e8400-e29b-41d4-a716-446655440000");
    let (status, error) = send(&app, Method::POST, "/shipments", Some(body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_malformed_id_is_400_and_unknown_id_is_404() {
    let app = test_app();
    let (status, error) = send(&app, Method::GET, "/shipments/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["error"]["code"], "VALIDATION_ERROR");

    let (status, _) = send(
        &app,
        Method::GET,
        "/shipments/550e8400-e29b-41d4-a716-446655440000",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// -- Status Transitions --------------------------------------------------------

#[tokio::test]
async fn test_invalid_transition_reports_allowed_targets() {
    let app = test_app();
    let merchant_id = merchant(&app).await;
    let id = create_id(&app, &merchant_id).await;

    let (status, error) = transition(&app, &id, json!({"status": "DELIVERED"})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["error"]["code"], "INVALID_TRANSITION");
    assert_eq!(error["error"]["details"]["from"], "NEW");
    assert_eq!(
        error["error"]["details"]["allowed"],
        json!(["IN_RECEIPT", "IN_WAREHOUSE"])
    );
}

#[tokio::test]
async fn test_in_warehouse_requires_a_warehouse() {
    let app = test_app();
    let merchant_id = merchant(&app).await;
    let id = create_id(&app, &merchant_id).await;

    let (status, error) = transition(&app, &id, json!({"status": "IN_WAREHOUSE"})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["error"]["code"], "ASSIGNMENT_REQUIRED");
    assert_eq!(error["error"]["details"]["missing"], "warehouse");
}

#[tokio::test]
async fn test_unknown_status_name_is_400() {
    let app = test_app();
    let merchant_id = merchant(&app).await;
    let id = create_id(&app, &merchant_id).await;
    let (status, error) = transition(&app, &id, json!({"status": "LOST"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_full_delivery_moves_load_and_driver() {
    let app = test_app();
    let merchant_id = merchant(&app).await;
    let warehouse_id = warehouse(&app, 5).await;
    let driver_id = driver(&app).await;
    let id = create_id(&app, &merchant_id).await;

    let (status, shipment) = transition(
        &app,
        &id,
        json!({"status": "IN_WAREHOUSE", "warehouseId": warehouse_id, "location": "Dock 2"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{shipment}");
    assert_eq!(shipment["status"], "IN_WAREHOUSE");
    let (_, hub) = send(&app, Method::GET, &format!("/warehouses/{warehouse_id}"), None).await;
    assert_eq!(hub["currentLoad"], 1);
    assert_eq!(hub["utilization"], 20);

    let (status, shipment) = transition(
        &app,
        &id,
        json!({"status": "WITH_DRIVER", "driverId": driver_id}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{shipment}");
    assert_eq!(shipment["driverId"], json!(driver_id));
    let (_, hub) = send(&app, Method::GET, &format!("/warehouses/{warehouse_id}"), None).await;
    assert_eq!(hub["currentLoad"], 0);
    let (_, courier) = send(&app, Method::GET, &format!("/drivers/{driver_id}"), None).await;
    assert_eq!(courier["isAvailable"], false);
    assert_eq!(courier["shipmentId"], json!(id));

    let (status, shipment) = transition(&app, &id, json!({"status": "DELIVERED"})).await;
    assert_eq!(status, StatusCode::OK, "{shipment}");
    let (_, courier) = send(&app, Method::GET, &format!("/drivers/{driver_id}"), None).await;
    assert_eq!(courier["isAvailable"], true);
    assert!(is_unset(&courier, "shipmentId"));

    let (_, detail) = send(&app, Method::GET, &format!("/shipments/{id}"), None).await;
    let statuses: Vec<&str> = detail["statusHistory"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, ["NEW", "IN_WAREHOUSE", "WITH_DRIVER", "DELIVERED"]);
    assert_eq!(detail["statusHistory"][1]["location"], "Dock 2");
}

// -- Capacity ------------------------------------------------------------------

#[tokio::test]
async fn test_full_warehouse_refuses_placement() {
    let app = test_app();
    let merchant_id = merchant(&app).await;
    let warehouse_id = warehouse(&app, 1).await;

    let mut first = shipment_body(&merchant_id);
    first["warehouseId"] = json!(warehouse_id);
    let created = create(&app, first).await;
    assert_eq!(created["warnings"], json!([]));
    assert_eq!(created["shipment"]["warehouseId"], json!(warehouse_id));

    // Created anyway, in NEW, without the warehouse.
    let mut second = shipment_body(&merchant_id);
    second["warehouseId"] = json!(warehouse_id);
    let created = create(&app, second).await;
    assert_eq!(created["warnings"][0]["code"], "CAPACITY_EXCEEDED");
    assert_eq!(created["shipment"]["status"], "NEW");
    assert!(is_unset(&created["shipment"], "warehouseId"));

    let id = created["shipment"]["id"].as_str().unwrap();
    let (status, error) = transition(
        &app,
        id,
        json!({"status": "IN_WAREHOUSE", "warehouseId": warehouse_id}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["error"]["code"], "CAPACITY_EXCEEDED");
    assert_eq!(error["error"]["details"]["currentLoad"], 1);

    // The refused transition left everything as it was.
    let (_, shipment) = send(&app, Method::GET, &format!("/shipments/{id}"), None).await;
    assert_eq!(shipment["status"], "NEW");
    assert_eq!(shipment["statusHistory"].as_array().unwrap().len(), 1);
    let (_, hub) = send(&app, Method::GET, &format!("/warehouses/{warehouse_id}"), None).await;
    assert_eq!(hub["currentLoad"], 1);
    assert_eq!(hub["utilization"], 100);
}

#[tokio::test]
async fn test_warehouse_patch_guards_load() {
    let app = test_app();
    let merchant_id = merchant(&app).await;
    let warehouse_id = warehouse(&app, 3).await;
    let mut body = shipment_body(&merchant_id);
    body["warehouseId"] = json!(warehouse_id);
    create(&app, body.clone()).await;
    create(&app, body).await;

    let uri = format!("/warehouses/{warehouse_id}");
    let (status, error) = send(&app, Method::PATCH, &uri, Some(json!({"currentLoad": 0}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{error}");

    let (status, error) = send(&app, Method::PATCH, &uri, Some(json!({"capacity": 1}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["error"]["code"], "CAPACITY_BELOW_LOAD");

    let (status, hub) = send(&app, Method::PATCH, &uri, Some(json!({"capacity": 2, "name": "Giza 2"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hub["name"], "Giza 2");
    assert_eq!(hub["utilization"], 100);
}

// -- Drivers -------------------------------------------------------------------

#[tokio::test]
async fn test_driver_assignment_and_release() {
    let app = test_app();
    let merchant_id = merchant(&app).await;
    let driver_id = driver(&app).await;
    let first = create_id(&app, &merchant_id).await;
    let second = create_id(&app, &merchant_id).await;

    let (status, shipment) = send(
        &app,
        Method::PUT,
        &format!("/shipments/{first}"),
        Some(json!({"driverId": driver_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{shipment}");
    assert_eq!(shipment["driverId"], json!(driver_id));

    let (status, error) = send(
        &app,
        Method::PUT,
        &format!("/shipments/{second}"),
        Some(json!({"driverId": driver_id})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["error"]["code"], "DRIVER_UNAVAILABLE");

    let (status, shipment) = send(
        &app,
        Method::POST,
        &format!("/shipments/{first}/release-driver"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(is_unset(&shipment, "driverId"));
    let (_, courier) = send(&app, Method::GET, &format!("/drivers/{driver_id}"), None).await;
    assert_eq!(courier["isAvailable"], true);
}

// -- Edits and Deletion --------------------------------------------------------

#[tokio::test]
async fn test_put_edits_details_and_moves_status() {
    let app = test_app();
    let merchant_id = merchant(&app).await;
    let id = create_id(&app, &merchant_id).await;

    let (status, shipment) = send(
        &app,
        Method::PUT,
        &format!("/shipments/{id}"),
        Some(json!({
            "customerName": "Hana S.",
            "notes": "fragile",
            "status": "IN_RECEIPT",
            "statusNotes": "received at counter",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{shipment}");
    assert_eq!(shipment["customerName"], "Hana S.");
    assert_eq!(shipment["notes"], "fragile");
    assert_eq!(shipment["status"], "IN_RECEIPT");

    let (_, detail) = send(&app, Method::GET, &format!("/shipments/{id}"), None).await;
    assert_eq!(detail["statusHistory"][1]["notes"], "received at counter");

    // Echoing the current status is not a transition.
    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/shipments/{id}"),
        Some(json!({"status": "IN_RECEIPT", "city": "Cairo"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_put_invalid_details_change_nothing() {
    let app = test_app();
    let merchant_id = merchant(&app).await;
    let id = create_id(&app, &merchant_id).await;

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/shipments/{id}"),
        Some(json!({"customerName": "", "status": "IN_RECEIPT"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (_, shipment) = send(&app, Method::GET, &format!("/shipments/{id}"), None).await;
    assert_eq!(shipment["status"], "NEW");
}

#[tokio::test]
async fn test_delete_only_while_new() {
    let app = test_app();
    let merchant_id = merchant(&app).await;
    let warehouse_id = warehouse(&app, 2).await;

    let mut body = shipment_body(&merchant_id);
    body["warehouseId"] = json!(warehouse_id);
    let id = create(&app, body).await["shipment"]["id"]
        .as_str()
        .unwrap()
        .to_string();
    let (status, _) = send(&app, Method::DELETE, &format!("/shipments/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::GET, &format!("/shipments/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    // The reserved unit went back.
    let (_, hub) = send(&app, Method::GET, &format!("/warehouses/{warehouse_id}"), None).await;
    assert_eq!(hub["currentLoad"], 0);

    let id = create_id(&app, &merchant_id).await;
    transition(&app, &id, json!({"status": "IN_RECEIPT"})).await;
    let (status, error) = send(&app, Method::DELETE, &format!("/shipments/{id}"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["error"]["code"], "DELETE_FORBIDDEN");
}

// -- Listing and Change Polling ------------------------------------------------

#[tokio::test]
async fn test_list_filters_by_status() {
    let app = test_app();
    let merchant_id = merchant(&app).await;
    let moved = create_id(&app, &merchant_id).await;
    create_id(&app, &merchant_id).await;
    transition(&app, &moved, json!({"status": "IN_RECEIPT"})).await;

    let (status, page) = send(&app, Method::GET, "/shipments?status=IN_RECEIPT", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["id"], json!(moved));

    let (_, page) = send(&app, Method::GET, "/shipments?limit=1", None).await;
    assert_eq!(page["total"], 2);
    assert_eq!(page["items"].as_array().unwrap().len(), 1);

    let (status, _) = send(&app, Method::GET, "/shipments?status=LOST", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_changes_feed_advances_cursor() {
    let app = test_app();
    let merchant_id = merchant(&app).await;
    let id = create_id(&app, &merchant_id).await;
    transition(&app, &id, json!({"status": "IN_RECEIPT"})).await;

    let (status, feed) = send(&app, Method::GET, "/shipments/changes?since=0", None).await;
    assert_eq!(status, StatusCode::OK);
    let entries = feed["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(feed["cursor"], entries[1]["sequence"]);

    let cursor = feed["cursor"].as_u64().unwrap();
    let (_, feed) = send(&app, Method::GET, &format!("/shipments/changes?since={cursor}"), None).await;
    assert_eq!(feed["entries"], json!([]));
    assert_eq!(feed["cursor"], cursor);
}

// -- Bulk Upload ---------------------------------------------------------------

const BOUNDARY: &str = "parcel-test-boundary";

fn csv_line(merchant_id: &str, overrides: &[(&str, &str)]) -> String {
    TEMPLATE_COLUMNS
        .iter()
        .map(|c| {
            if let Some((_, v)) = overrides.iter().find(|(name, _)| *name == c.name) {
                return v.to_string();
            }
            match c.name {
                "customerName" => "Hana Samir".to_string(),
                "customerPhone" => "01001234567".to_string(),
                "customerAddress" => "5 Corniche Rd".to_string(),
                "city" => "Alexandria".to_string(),
                "description" => "Shoes".to_string(),
                "merchantId" => merchant_id.to_string(),
                "declaredValue" => "450".to_string(),
                "shippingCost" => "35".to_string(),
                _ => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn multipart_upload(field: &str, csv: &str) -> Request<Body> {
    let body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"shipments.csv\"\r\n\
         Content-Type: text/csv\r\n\r\n\
         {csv}\r\n\
         --{BOUNDARY}--\r\n"
    );
    Request::builder()
        .method(Method::POST)
        .uri("/shipments/bulk")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_bulk_upload_reports_each_row() {
    let app = test_app();
    let merchant_id = merchant(&app).await;
    let mut csv = template_csv();
    for line in [
        csv_line(&merchant_id, &[]),
        csv_line(&merchant_id, &[("customerName", "")]),
        csv_line(&merchant_id, &[("city", "Cairo")]),
    ] {
        csv.push_str(&line);
        csv.push('\n');
    }

    let response = app.clone().oneshot(multipart_upload("file", &csv)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let result: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(result["total"], 3);
    assert_eq!(result["successful"], 2);
    assert_eq!(result["failed"], 1);
    assert_eq!(result["errors"].as_array().unwrap().len(), 1);
    assert_eq!(result["createdIds"].as_array().unwrap().len(), 2);
    assert_eq!(result["cancelled"], false);

    let (_, page) = send(&app, Method::GET, "/shipments", None).await;
    assert_eq!(page["total"], 2);
}

#[tokio::test]
async fn test_bulk_upload_missing_columns_is_400() {
    let app = test_app();
    let response = app
        .oneshot(multipart_upload("file", "customerName,city\nHana,Cairo\n"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(error["error"]["code"], "MISSING_COLUMNS");
    assert!(error["error"]["details"]["columns"].is_array());
}

#[tokio::test]
async fn test_bulk_upload_without_multipart_is_400() {
    let app = test_app();
    let (status, error) = send(&app, Method::POST, "/shipments/bulk", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_template_download() {
    let app = test_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/shipments/template")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert!(headers[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/csv"));
    assert!(headers[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("shipments_template.csv"));
    assert_eq!(body_string(response).await, template_csv());
}

// -- Metrics and OpenAPI -------------------------------------------------------

#[tokio::test]
async fn test_metrics_endpoint_reports_lifecycle() {
    let app = test_app();
    let merchant_id = merchant(&app).await;
    let warehouse_id = warehouse(&app, 4).await;
    let id = create_id(&app, &merchant_id).await;
    transition(
        &app,
        &id,
        json!({"status": "IN_WAREHOUSE", "warehouseId": warehouse_id}),
    )
    .await;

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = body_string(response).await;
    assert!(text.contains("parcel_transitions_total{to=\"IN_WAREHOUSE\"} 1"), "{text}");
    assert!(text.contains("parcel_shipments_total{status=\"IN_WAREHOUSE\"} 1"));
    assert!(text.contains(&format!(
        "parcel_warehouse_utilization_percent{{warehouse_id=\"{warehouse_id}\"}} 25"
    )));
    assert!(text.contains("parcel_http_requests_total"));
}

#[tokio::test]
async fn test_metrics_disabled_hides_endpoint() {
    let config = AppConfig {
        metrics_enabled: false,
        ..AppConfig::default()
    };
    let app = parcel_api::app(AppState::with_config(config));
    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_openapi_document() {
    let app = test_app();
    let (status, spec) = send(&app, Method::GET, "/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(spec["paths"]["/shipments/{id}/status"].is_object());
    assert!(spec["paths"]["/shipments/bulk"].is_object());
}
