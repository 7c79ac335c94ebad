//! # Drivers API
//!
//! Routes:
//! - POST  /drivers: Register a driver
//! - GET   /drivers: All drivers with their current assignment
//! - GET   /drivers/{id}
//! - PATCH /drivers/{id}: Edit profile or availability; the assignment is not editable

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use parcel_core::DriverId;
use parcel_lifecycle::{Driver, DriverPatch, NewDriver};

use crate::error::AppError;
use crate::extractors::{extract_json, parse_id};
use crate::state::AppState;

/// Build the drivers router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/drivers", get(list_drivers).post(create_driver))
        .route("/drivers/{id}", get(get_driver).patch(update_driver))
}

#[utoipa::path(
    post,
    path = "/drivers",
    request_body = NewDriver,
    responses(
        (status = 201, description = "Driver registered", body = Driver),
        (status = 400, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "drivers"
)]
async fn create_driver(
    State(state): State<AppState>,
    body: Result<Json<NewDriver>, JsonRejection>,
) -> Result<(StatusCode, Json<Driver>), AppError> {
    let new = extract_json(body)?;
    let driver = state.registry.register_driver(new)?;
    Ok((StatusCode::CREATED, Json(driver)))
}

#[utoipa::path(
    get,
    path = "/drivers",
    responses(
        (status = 200, description = "All drivers", body = Vec<Driver>),
    ),
    tag = "drivers"
)]
async fn list_drivers(State(state): State<AppState>) -> Json<Vec<Driver>> {
    Json(state.registry.drivers())
}

#[utoipa::path(
    get,
    path = "/drivers/{id}",
    params(("id" = String, Path, description = "Driver ID")),
    responses(
        (status = 200, description = "Driver found", body = Driver),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "drivers"
)]
async fn get_driver(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Driver>, AppError> {
    let id: DriverId = parse_id(&id)?;
    Ok(Json(state.registry.driver(id)?))
}

/// PATCH /drivers/{id}: Edit a driver.
///
/// Taking a driver off availability does not unassign a shipment they
/// already hold.
#[utoipa::path(
    patch,
    path = "/drivers/{id}",
    params(("id" = String, Path, description = "Driver ID")),
    request_body = DriverPatch,
    responses(
        (status = 200, description = "Driver updated", body = Driver),
        (status = 400, description = "Validation error or unknown field", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "drivers"
)]
async fn update_driver(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<DriverPatch>, JsonRejection>,
) -> Result<Json<Driver>, AppError> {
    let id: DriverId = parse_id(&id)?;
    let patch = extract_json(body)?;
    Ok(Json(state.registry.update_driver(id, patch)?))
}
