//! # Warehouses API
//!
//! Routes:
//! - POST  /warehouses: Register a warehouse with an empty account
//! - GET   /warehouses: All warehouses with live load and utilization
//! - GET   /warehouses/{id}
//! - PATCH /warehouses/{id}: Edit profile or capacity; load is not editable

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use parcel_core::WarehouseId;
use parcel_lifecycle::{NewWarehouse, Warehouse, WarehousePatch};

use crate::error::AppError;
use crate::extractors::{extract_json, parse_id};
use crate::state::AppState;

/// Build the warehouses router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/warehouses", get(list_warehouses).post(create_warehouse))
        .route(
            "/warehouses/{id}",
            get(get_warehouse).patch(update_warehouse),
        )
}

/// POST /warehouses: Register a warehouse.
#[utoipa::path(
    post,
    path = "/warehouses",
    request_body = NewWarehouse,
    responses(
        (status = 201, description = "Warehouse registered", body = Warehouse),
        (status = 400, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "warehouses"
)]
async fn create_warehouse(
    State(state): State<AppState>,
    body: Result<Json<NewWarehouse>, JsonRejection>,
) -> Result<(StatusCode, Json<Warehouse>), AppError> {
    let new = extract_json(body)?;
    let warehouse = state.registry.register_warehouse(new)?;
    Ok((StatusCode::CREATED, Json(warehouse)))
}

/// GET /warehouses: All warehouses.
#[utoipa::path(
    get,
    path = "/warehouses",
    responses(
        (status = 200, description = "All warehouses", body = Vec<Warehouse>),
    ),
    tag = "warehouses"
)]
async fn list_warehouses(State(state): State<AppState>) -> Json<Vec<Warehouse>> {
    Json(state.registry.warehouses())
}

/// GET /warehouses/{id}
#[utoipa::path(
    get,
    path = "/warehouses/{id}",
    params(("id" = String, Path, description = "Warehouse ID")),
    responses(
        (status = 200, description = "Warehouse found", body = Warehouse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "warehouses"
)]
async fn get_warehouse(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Warehouse>, AppError> {
    let id: WarehouseId = parse_id(&id)?;
    Ok(Json(state.registry.warehouse(id)?))
}

/// PATCH /warehouses/{id}: Edit a warehouse.
///
/// Capacity may not drop below the current load. `currentLoad` is rejected
/// as an unknown field.
#[utoipa::path(
    patch,
    path = "/warehouses/{id}",
    params(("id" = String, Path, description = "Warehouse ID")),
    request_body = WarehousePatch,
    responses(
        (status = 200, description = "Warehouse updated", body = Warehouse),
        (status = 400, description = "Validation error or unknown field", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Capacity below current load", body = crate::error::ErrorBody),
    ),
    tag = "warehouses"
)]
async fn update_warehouse(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<WarehousePatch>, JsonRejection>,
) -> Result<Json<Warehouse>, AppError> {
    let id: WarehouseId = parse_id(&id)?;
    let patch = extract_json(body)?;
    Ok(Json(state.registry.update_warehouse(id, patch)?))
}
