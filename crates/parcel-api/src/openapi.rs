//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI 3.1 spec,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI spec for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Parcel API",
        version = "0.1.0",
        description = "Shipment lifecycle service.\n\nProvides:\n- **Shipments** with a fixed status graph and an append-only status history\n- **Warehouse capacity** accounting: load changes only through status transitions and assignments\n- **Driver assignment** with at most one active shipment per driver\n- **Bulk CSV upload** with per-row outcomes\n\nStatus, warehouse and driver fields are never written directly; they change only through the transition and assignment endpoints.",
        license(name = "AGPL-3.0-or-later")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    paths(
        // ── Shipments ────────────────────────────────────────────────────
        crate::routes::shipments::list_shipments,
        crate::routes::shipments::create_shipment,
        crate::routes::shipments::list_changes,
        crate::routes::shipments::get_shipment,
        crate::routes::shipments::update_shipment,
        crate::routes::shipments::delete_shipment,
        crate::routes::shipments::transition_shipment,
        crate::routes::shipments::release_driver,
        // ── Bulk upload ──────────────────────────────────────────────────
        crate::routes::bulk::upload_shipments,
        crate::routes::bulk::download_template,
        // ── Warehouses ───────────────────────────────────────────────────
        crate::routes::warehouses::create_warehouse,
        crate::routes::warehouses::list_warehouses,
        crate::routes::warehouses::get_warehouse,
        crate::routes::warehouses::update_warehouse,
        // ── Drivers ──────────────────────────────────────────────────────
        crate::routes::drivers::create_driver,
        crate::routes::drivers::list_drivers,
        crate::routes::drivers::get_driver,
        crate::routes::drivers::update_driver,
        // ── Merchants ────────────────────────────────────────────────────
        crate::routes::merchants::create_merchant,
        crate::routes::merchants::list_merchants,
        crate::routes::merchants::get_merchant,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::routes::shipments::ShipmentPage,
        crate::routes::shipments::ChangeFeed,
        crate::routes::shipments::CreatedShipment,
        crate::routes::shipments::AssignmentWarning,
        crate::routes::shipments::UpdateShipmentRequest,
        parcel_state::ShipmentStatus,
        parcel_state::Shipment,
        parcel_state::ShipmentDetails,
        parcel_state::ShipmentDetailsPatch,
        parcel_state::NewShipment,
        parcel_state::StatusHistoryEntry,
        parcel_lifecycle::ShipmentDetail,
        parcel_lifecycle::TransitionRequest,
        parcel_lifecycle::Warehouse,
        parcel_lifecycle::NewWarehouse,
        parcel_lifecycle::WarehousePatch,
        parcel_lifecycle::UtilizationBand,
        parcel_lifecycle::Driver,
        parcel_lifecycle::NewDriver,
        parcel_lifecycle::DriverPatch,
        parcel_lifecycle::MerchantProfile,
        parcel_lifecycle::NewMerchant,
        parcel_ingest::UploadResult,
        parcel_ingest::RowError,
        parcel_ingest::RowWarning,
    )),
    tags(
        (name = "shipments", description = "Shipment records, status transitions and status history"),
        (name = "bulk", description = "CSV bulk upload and template"),
        (name = "warehouses", description = "Warehouses and their capacity accounts"),
        (name = "drivers", description = "Drivers and their current assignment"),
        (name = "merchants", description = "Merchants that own shipments"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json: Return the generated OpenAPI specification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
