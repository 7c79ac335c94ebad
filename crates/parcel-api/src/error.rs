//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps lifecycle, validation and upload errors to HTTP status codes and a
//! JSON body carrying a machine-readable code, a message and, for client
//! errors, the ids and states the caller needs to pick a remedy.
//! Internal error details are never returned to the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use parcel_core::ValidationError;
use parcel_ingest::IngestError;
use parcel_lifecycle::LifecycleError;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "INVALID_TRANSITION").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional context, present only for client errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404). Used for routes that have no lifecycle error.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed request: unparsable body, path or query (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Field-level validation failure (400).
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Lifecycle outcome; status depends on the variant.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// The uploaded file could not be processed at all (400).
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Self::Ingest(err) => (StatusCode::BAD_REQUEST, err.code()),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            Self::Lifecycle(err) => {
                let status = match err {
                    LifecycleError::NotFound { .. } => StatusCode::NOT_FOUND,
                    LifecycleError::Validation(_) => StatusCode::BAD_REQUEST,
                    LifecycleError::InvariantViolation(_) => StatusCode::INTERNAL_SERVER_ERROR,
                    LifecycleError::InvalidTransition { .. }
                    | LifecycleError::AssignmentRequired { .. }
                    | LifecycleError::CapacityExceeded { .. }
                    | LifecycleError::CapacityBelowLoad { .. }
                    | LifecycleError::ReassignmentIncomplete { .. }
                    | LifecycleError::Ineligible { .. }
                    | LifecycleError::DriverUnavailable { .. }
                    | LifecycleError::AssignmentLocked { .. }
                    | LifecycleError::DeleteForbidden { .. }
                    | LifecycleError::Duplicate { .. } => StatusCode::CONFLICT,
                };
                (status, err.code())
            }
        }
    }

    /// Machine-readable context for client errors.
    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Lifecycle(err) => lifecycle_details(err),
            Self::Ingest(IngestError::MissingColumns { columns }) => {
                Some(json!({ "columns": columns }))
            }
            Self::Ingest(IngestError::DuplicateColumn { column }) => {
                Some(json!({ "column": column }))
            }
            Self::Ingest(IngestError::Unreadable {
                line: Some(line), ..
            }) => Some(json!({ "line": line })),
            _ => None,
        }
    }

    fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Internal(_) | Self::Lifecycle(LifecycleError::InvariantViolation(_))
        )
    }
}

fn lifecycle_details(err: &LifecycleError) -> Option<serde_json::Value> {
    let value = match err {
        LifecycleError::NotFound { kind, id } => json!({ "kind": kind, "id": id }),
        LifecycleError::InvalidTransition {
            shipment_id,
            from,
            to,
        } => json!({
            "shipmentId": shipment_id,
            "from": from,
            "to": to,
            "allowed": from.valid_transitions(),
        }),
        LifecycleError::AssignmentRequired {
            shipment_id,
            target,
            missing,
        } => json!({ "shipmentId": shipment_id, "target": target, "missing": missing }),
        LifecycleError::CapacityExceeded {
            warehouse_id,
            capacity,
            current_load,
            requested,
        } => json!({
            "warehouseId": warehouse_id,
            "capacity": capacity,
            "currentLoad": current_load,
            "requested": requested,
        }),
        LifecycleError::CapacityBelowLoad {
            warehouse_id,
            capacity,
            current_load,
        } => json!({
            "warehouseId": warehouse_id,
            "capacity": capacity,
            "currentLoad": current_load,
        }),
        LifecycleError::ReassignmentIncomplete {
            shipment_id,
            released_from,
            attempted,
            cause,
        } => json!({
            "shipmentId": shipment_id,
            "releasedFrom": released_from,
            "attempted": attempted,
            "cause": { "code": cause.code(), "message": cause.to_string() },
        }),
        LifecycleError::Ineligible { kind, id, reason } => {
            json!({ "kind": kind, "id": id, "reason": reason })
        }
        LifecycleError::DriverUnavailable { driver_id, held_by } => {
            json!({ "driverId": driver_id, "heldBy": held_by })
        }
        LifecycleError::AssignmentLocked {
            shipment_id,
            status,
        }
        | LifecycleError::DeleteForbidden {
            shipment_id,
            status,
        } => json!({ "shipmentId": shipment_id, "status": status }),
        LifecycleError::Duplicate { field, value } => json!({ "field": field, "value": value }),
        LifecycleError::Validation(_) | LifecycleError::InvariantViolation(_) => return None,
    };
    Some(value)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Never expose internal error messages to clients.
        let (message, details) = if self.is_internal() {
            tracing::error!(error = %self, "internal server error");
            ("An internal error occurred".to_string(), None)
        } else {
            (self.to_string(), self.details())
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}
