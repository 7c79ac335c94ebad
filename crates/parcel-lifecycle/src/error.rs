//! # Lifecycle Errors
//!
//! Every variant except [`LifecycleError::InvariantViolation`] is an
//! expected, caller-recoverable outcome and carries the ids and states the
//! caller needs to pick a remedy. `InvariantViolation` means the load or
//! availability bookkeeping has diverged from reality; it is logged at
//! error level where it is raised and never auto-corrected.

use thiserror::Error;

use parcel_core::{DriverId, ShipmentId, ValidationError, WarehouseId};
use parcel_state::ShipmentStatus;

/// Errors raised by the lifecycle core.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LifecycleError {
    /// Unknown shipment, warehouse, driver or merchant reference.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Reference kind.
        kind: &'static str,
        /// The id as given.
        id: String,
    },

    /// Status graph violation, including a transition to the current status.
    #[error("shipment {shipment_id} cannot move from {from} to {to}")]
    InvalidTransition {
        shipment_id: ShipmentId,
        from: ShipmentStatus,
        to: ShipmentStatus,
    },

    /// The target status presupposes an assignment the shipment lacks.
    #[error("shipment {shipment_id} needs a {missing} before entering {target}")]
    AssignmentRequired {
        shipment_id: ShipmentId,
        target: ShipmentStatus,
        /// `"warehouse"` or `"driver"`.
        missing: &'static str,
    },

    /// Reservation would push the warehouse over its capacity.
    #[error(
        "warehouse {warehouse_id} is at {current_load}/{capacity}; cannot reserve {requested} more"
    )]
    CapacityExceeded {
        warehouse_id: WarehouseId,
        capacity: u32,
        current_load: u32,
        requested: u32,
    },

    /// Capacity edit would drop below the units already stored.
    #[error("warehouse {warehouse_id} holds {current_load} units; capacity {capacity} is too small")]
    CapacityBelowLoad {
        warehouse_id: WarehouseId,
        capacity: u32,
        current_load: u32,
    },

    /// The old warehouse unit was released but the new reservation failed.
    /// The shipment is left without a warehouse and needs a manual assignment.
    #[error(
        "shipment {shipment_id} released from warehouse {released_from} but could not be placed in {attempted}: {cause}"
    )]
    ReassignmentIncomplete {
        shipment_id: ShipmentId,
        released_from: WarehouseId,
        attempted: WarehouseId,
        cause: Box<LifecycleError>,
    },

    /// A warehouse or driver exists but is inactive.
    #[error("{kind} {id} is not eligible: {reason}")]
    Ineligible {
        kind: &'static str,
        id: String,
        reason: String,
    },

    /// The driver is dispatched on another shipment.
    #[error("driver {driver_id} is unavailable")]
    DriverUnavailable {
        driver_id: DriverId,
        /// Shipment currently holding the driver, when known.
        held_by: Option<ShipmentId>,
    },

    /// Assignment changes are not allowed in the shipment's current status.
    #[error("shipment {shipment_id} in {status} cannot change its assignment")]
    AssignmentLocked {
        shipment_id: ShipmentId,
        status: ShipmentStatus,
    },

    /// Deletion is only allowed while the shipment is still `NEW`.
    #[error("shipment {shipment_id} in {status} cannot be deleted")]
    DeleteForbidden {
        shipment_id: ShipmentId,
        status: ShipmentStatus,
    },

    /// A unique field (tracking number, barcode, id) is already taken.
    #[error("{field} '{value}' already exists")]
    Duplicate { field: &'static str, value: String },

    /// Field-level validation failure.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Internal accounting defect. Never a user-facing outcome.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl LifecycleError {
    /// Stable machine-readable code, used for API error bodies and metric labels.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::AssignmentRequired { .. } => "ASSIGNMENT_REQUIRED",
            Self::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            Self::CapacityBelowLoad { .. } => "CAPACITY_BELOW_LOAD",
            Self::ReassignmentIncomplete { .. } => "REASSIGNMENT_INCOMPLETE",
            Self::Ineligible { .. } => "INELIGIBLE",
            Self::DriverUnavailable { .. } => "DRIVER_UNAVAILABLE",
            Self::AssignmentLocked { .. } => "ASSIGNMENT_LOCKED",
            Self::DeleteForbidden { .. } => "DELETE_FORBIDDEN",
            Self::Duplicate { .. } => "DUPLICATE",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvariantViolation(_) => "INVARIANT_VIOLATION",
        }
    }

    pub(crate) fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Build an [`LifecycleError::InvariantViolation`] and log it at error level.
    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::error!(violation = %message, "lifecycle invariant violated");
        Self::InvariantViolation(message)
    }
}
