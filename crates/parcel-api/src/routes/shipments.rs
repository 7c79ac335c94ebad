//! # Shipments API
//!
//! Routes:
//! - GET    /shipments: Page through shipments, optionally by status
//! - POST   /shipments: Create a shipment in NEW
//! - GET    /shipments/changes: Status history after a cursor (polling)
//! - GET    /shipments/{id}: Shipment with its status history
//! - PUT    /shipments/{id}: Edit details; status/driver/warehouse via the engine
//! - DELETE /shipments/{id}: Delete while still NEW
//! - POST   /shipments/{id}/status: Status transition
//! - POST   /shipments/{id}/release-driver: Free the shipment's driver
//!
//! Handlers never write lifecycle fields directly: every status, warehouse
//! and driver change goes through the transition engine or the assignment
//! coordinator.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use parcel_core::{DriverId, ShipmentId, WarehouseId};
use parcel_lifecycle::{LifecycleError, ShipmentDetail, TransitionOutcome, TransitionRequest};
use parcel_state::{NewShipment, Shipment, ShipmentDetailsPatch, ShipmentStatus, StatusHistoryEntry};

use crate::error::AppError;
use crate::extractors::{extract_json, extract_query, parse_id};
use crate::state::AppState;

/// Query parameters for `GET /shipments`.
#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct ListParams {
    /// Maximum number of items to return (default: 100, max: 1000).
    pub limit: Option<usize>,
    /// Number of items to skip (default: 0).
    pub offset: Option<usize>,
    /// Only shipments currently in this status.
    pub status: Option<ShipmentStatus>,
}

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 1000;

fn effective_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT)
}

/// One page of shipments.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentPage {
    pub items: Vec<Shipment>,
    /// Matching shipments across all pages.
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

/// Query parameters for `GET /shipments/changes`.
#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct ChangesParams {
    /// Return entries with a sequence strictly greater than this (default: 0).
    pub since: Option<u64>,
    /// Maximum number of entries (default: 100, max: 1000).
    pub limit: Option<usize>,
}

/// Status history entries after a cursor.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangeFeed {
    /// Pass as `since` on the next poll.
    pub cursor: u64,
    pub entries: Vec<StatusHistoryEntry>,
}

/// A requested assignment that was not made at creation.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AssignmentWarning {
    pub code: String,
    pub message: String,
}

impl From<&LifecycleError> for AssignmentWarning {
    fn from(err: &LifecycleError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Response to `POST /shipments`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreatedShipment {
    pub shipment: Shipment,
    /// Requested warehouse/driver assignments that could not be made. The
    /// shipment is created in NEW regardless.
    pub warnings: Vec<AssignmentWarning>,
}

/// Body of `PUT /shipments/{id}`.
///
/// Detail fields are edited directly. `status`, `warehouseId` and
/// `driverId` are requests to the lifecycle core, not field writes.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateShipmentRequest {
    #[serde(flatten)]
    pub details: ShipmentDetailsPatch,
    /// Target status. Equal to the current status means no status change.
    pub status: Option<ShipmentStatus>,
    /// History note for the status change.
    pub status_notes: Option<String>,
    /// History location for the status change.
    pub location: Option<String>,
    pub warehouse_id: Option<WarehouseId>,
    pub driver_id: Option<DriverId>,
}

/// Build the shipments router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/shipments", get(list_shipments).post(create_shipment))
        .route("/shipments/changes", get(list_changes))
        .route(
            "/shipments/{id}",
            get(get_shipment)
                .put(update_shipment)
                .delete(delete_shipment),
        )
        .route("/shipments/{id}/status", post(transition_shipment))
        .route("/shipments/{id}/release-driver", post(release_driver))
}

/// Run a transition and count the outcome.
fn transition(
    state: &AppState,
    id: ShipmentId,
    request: TransitionRequest,
) -> Result<TransitionOutcome, AppError> {
    match state.engine.apply_transition(id, request) {
        Ok(outcome) => {
            state.metrics.transition_accepted(outcome.shipment.status);
            Ok(outcome)
        }
        Err(err) => {
            state.metrics.transition_rejected(&err);
            Err(err.into())
        }
    }
}

/// Count a refused standalone assignment before surfacing it.
fn assignment(state: &AppState, result: Result<Shipment, LifecycleError>) -> Result<Shipment, AppError> {
    result.map_err(|err| {
        state.metrics.observe_refusal("assignment", &err);
        err.into()
    })
}

/// GET /shipments: Page through shipments, oldest first.
#[utoipa::path(
    get,
    path = "/shipments",
    params(
        ("limit" = Option<usize>, Query, description = "Max items to return (default 100, max 1000)"),
        ("offset" = Option<usize>, Query, description = "Items to skip (default 0)"),
        ("status" = Option<ShipmentStatus>, Query, description = "Filter by current status"),
    ),
    responses(
        (status = 200, description = "One page of shipments", body = ShipmentPage),
        (status = 400, description = "Malformed query", body = crate::error::ErrorBody),
    ),
    tag = "shipments"
)]
async fn list_shipments(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<ShipmentPage>, AppError> {
    let params = extract_query(params)?;
    let limit = effective_limit(params.limit);
    let offset = params.offset.unwrap_or(0);
    let (items, total) = state.engine.list(params.status, offset, limit);
    Ok(Json(ShipmentPage {
        items,
        total,
        limit,
        offset,
    }))
}

/// GET /shipments/changes: Status history entries after `since`.
#[utoipa::path(
    get,
    path = "/shipments/changes",
    params(
        ("since" = Option<u64>, Query, description = "Cursor from the previous poll (default 0)"),
        ("limit" = Option<usize>, Query, description = "Max entries to return (default 100, max 1000)"),
    ),
    responses(
        (status = 200, description = "Entries after the cursor, oldest first", body = ChangeFeed),
    ),
    tag = "shipments"
)]
async fn list_changes(
    State(state): State<AppState>,
    params: Result<Query<ChangesParams>, QueryRejection>,
) -> Result<Json<ChangeFeed>, AppError> {
    let params = extract_query(params)?;
    let since = params.since.unwrap_or(0);
    let entries = state
        .engine
        .changes_since(since, effective_limit(params.limit));
    let cursor = entries.last().map(|e| e.sequence).unwrap_or(since);
    Ok(Json(ChangeFeed { cursor, entries }))
}

/// GET /shipments/{id}: Shipment detail with its status history.
#[utoipa::path(
    get,
    path = "/shipments/{id}",
    params(("id" = String, Path, description = "Shipment ID")),
    responses(
        (status = 200, description = "Shipment found", body = ShipmentDetail),
        (status = 400, description = "Malformed ID", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "shipments"
)]
async fn get_shipment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ShipmentDetail>, AppError> {
    let id: ShipmentId = parse_id(&id)?;
    Ok(Json(state.engine.detail(id)?))
}

/// POST /shipments: Create a shipment in NEW.
#[utoipa::path(
    post,
    path = "/shipments",
    request_body = NewShipment,
    responses(
        (status = 201, description = "Shipment created", body = CreatedShipment),
        (status = 400, description = "Validation error", body = crate::error::ErrorBody),
        (status = 404, description = "Unknown merchant, warehouse or driver", body = crate::error::ErrorBody),
        (status = 409, description = "Tracking number or barcode taken", body = crate::error::ErrorBody),
    ),
    tag = "shipments"
)]
async fn create_shipment(
    State(state): State<AppState>,
    body: Result<Json<NewShipment>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedShipment>), AppError> {
    let new = extract_json(body)?;
    let created = state.engine.create(new)?;
    for warning in &created.warnings {
        state.metrics.observe_refusal("create", warning);
    }
    Ok((
        StatusCode::CREATED,
        Json(CreatedShipment {
            warnings: created.warnings.iter().map(AssignmentWarning::from).collect(),
            shipment: created.shipment,
        }),
    ))
}

/// PUT /shipments/{id}: Edit a shipment.
///
/// Steps run in order: the detail edit is validated up front, then the
/// status change (carrying any warehouse/driver assignment in the same
/// changeset) or, without a status change, the standalone assignments,
/// then the detail edit is applied. A failing step returns its error;
/// earlier steps stay applied.
#[utoipa::path(
    put,
    path = "/shipments/{id}",
    params(("id" = String, Path, description = "Shipment ID")),
    request_body = UpdateShipmentRequest,
    responses(
        (status = 200, description = "Shipment updated", body = Shipment),
        (status = 400, description = "Validation error", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Transition or assignment refused", body = crate::error::ErrorBody),
    ),
    tag = "shipments"
)]
async fn update_shipment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<UpdateShipmentRequest>, JsonRejection>,
) -> Result<Json<Shipment>, AppError> {
    let id: ShipmentId = parse_id(&id)?;
    let req = extract_json(body)?;

    let current = state.engine.get(id)?;
    if !req.details.is_empty() {
        req.details.apply(&current.details)?;
    }

    match req.status.filter(|s| *s != current.status) {
        Some(status) => {
            transition(
                &state,
                id,
                TransitionRequest {
                    status,
                    notes: req.status_notes.clone(),
                    location: req.location.clone(),
                    warehouse_id: req.warehouse_id,
                    driver_id: req.driver_id,
                },
            )?;
        }
        None => {
            if let Some(warehouse_id) = req.warehouse_id {
                assignment(
                    &state,
                    state.engine.coordinator().assign_warehouse(id, warehouse_id),
                )?;
            }
            if let Some(driver_id) = req.driver_id {
                assignment(
                    &state,
                    state.engine.coordinator().assign_driver(id, driver_id),
                )?;
            }
        }
    }

    let shipment = if req.details.is_empty() {
        state.engine.get(id)?
    } else {
        state.engine.update_details(id, &req.details)?
    };
    Ok(Json(shipment))
}

/// DELETE /shipments/{id}: Delete a shipment that is still NEW.
#[utoipa::path(
    delete,
    path = "/shipments/{id}",
    params(("id" = String, Path, description = "Shipment ID")),
    responses(
        (status = 204, description = "Shipment deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Shipment is past NEW", body = crate::error::ErrorBody),
    ),
    tag = "shipments"
)]
async fn delete_shipment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id: ShipmentId = parse_id(&id)?;
    state.engine.delete(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /shipments/{id}/status: Move a shipment to a new status.
#[utoipa::path(
    post,
    path = "/shipments/{id}/status",
    params(("id" = String, Path, description = "Shipment ID")),
    request_body = TransitionRequest,
    responses(
        (status = 200, description = "Transition accepted", body = Shipment),
        (status = 400, description = "Malformed body", body = crate::error::ErrorBody),
        (status = 404, description = "Shipment, warehouse or driver not found", body = crate::error::ErrorBody),
        (status = 409, description = "Invalid transition, capacity exceeded or assignment required", body = crate::error::ErrorBody),
    ),
    tag = "shipments"
)]
async fn transition_shipment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<TransitionRequest>, JsonRejection>,
) -> Result<Json<Shipment>, AppError> {
    let id: ShipmentId = parse_id(&id)?;
    let request = extract_json(body)?;
    let outcome = transition(&state, id, request)?;
    Ok(Json(outcome.shipment))
}

/// POST /shipments/{id}/release-driver: Free the shipment's driver.
#[utoipa::path(
    post,
    path = "/shipments/{id}/release-driver",
    params(("id" = String, Path, description = "Shipment ID")),
    responses(
        (status = 200, description = "Driver released (or none held)", body = Shipment),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Shipment is out for delivery", body = crate::error::ErrorBody),
    ),
    tag = "shipments"
)]
async fn release_driver(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Shipment>, AppError> {
    let id: ShipmentId = parse_id(&id)?;
    Ok(Json(state.engine.coordinator().release_driver(id)?))
}
