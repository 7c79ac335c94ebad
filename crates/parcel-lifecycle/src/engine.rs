//! # Status Transition Engine
//!
//! Entry point for every shipment mutation: creation, status transitions,
//! detail edits and deletion. Each call is one changeset; the status write,
//! the capacity and driver side effects and the audit entry are observed
//! together or not at all.
//!
//! Side effects by target status:
//!
//! | Target             | Effect                                                        |
//! |--------------------|---------------------------------------------------------------|
//! | `IN_WAREHOUSE`     | shipment must occupy a warehouse, else `AssignmentRequired`   |
//! | `WITH_DRIVER`      | needs an active driver held by the shipment; frees the unit   |
//! | `DELIVERED`        | driver becomes available                                      |
//! | `RETURNED`         | driver becomes available                                      |
//! | `PARTIAL_RETURNED` | driver becomes available                                      |
//! | `DELIVERY_FAILED`  | driver stays with the shipment                                |
//!
//! A transition request may name a warehouse and/or driver; that assignment
//! happens inside the same changeset, before the side effects are checked.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use parcel_core::{Barcode, DriverId, ShipmentId, TrackingNumber, WarehouseId};
use parcel_state::{
    AuditTrail, NewShipment, Shipment, ShipmentDetailsPatch, ShipmentStatus, StatusHistoryEntry,
};

use crate::assignment::{committed_shipment, AssignmentCoordinator, DriverRoster};
use crate::changeset::Stores;
use crate::directory::Lookup;
use crate::error::LifecycleError;
use crate::journal::{Change, ChangeJournal};
use crate::ledger::CapacityLedger;
use crate::store::ShipmentStore;

/// Attempts at issuing a fresh tracking number / barcode pair before giving up.
const MAX_ISSUE_ATTEMPTS: usize = 8;

/// A requested status change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest {
    pub status: ShipmentStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    /// Warehouse to place the shipment in as part of this transition.
    #[serde(default)]
    pub warehouse_id: Option<WarehouseId>,
    /// Driver to assign as part of this transition.
    #[serde(default)]
    pub driver_id: Option<DriverId>,
}

impl TransitionRequest {
    pub fn to(status: ShipmentStatus) -> Self {
        Self {
            status,
            notes: None,
            location: None,
            warehouse_id: None,
            driver_id: None,
        }
    }

    pub fn with_warehouse(mut self, warehouse_id: WarehouseId) -> Self {
        self.warehouse_id = Some(warehouse_id);
        self
    }

    pub fn with_driver(mut self, driver_id: DriverId) -> Self {
        self.driver_id = Some(driver_id);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// An accepted transition.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    pub shipment: Shipment,
    pub entry: StatusHistoryEntry,
}

/// A created shipment. `warnings` lists requested assignments that could
/// not be made; the shipment is kept in `NEW` regardless.
#[derive(Debug, Clone, PartialEq)]
pub struct Created {
    pub shipment: Shipment,
    pub entry: StatusHistoryEntry,
    pub warnings: Vec<LifecycleError>,
}

/// Shipment plus its full status history, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentDetail {
    #[serde(flatten)]
    pub shipment: Shipment,
    pub status_history: Vec<StatusHistoryEntry>,
}

/// Everything the engine is built from.
pub struct LifecycleParts {
    pub lookup: Arc<dyn Lookup>,
    pub ledger: Arc<CapacityLedger>,
    pub roster: Arc<DriverRoster>,
    pub audit: Arc<AuditTrail>,
    pub journal: Option<Arc<dyn ChangeJournal>>,
}

impl LifecycleParts {
    /// Fresh, empty ledger, roster and audit trail over `lookup`.
    pub fn empty(lookup: Arc<dyn Lookup>) -> Self {
        Self {
            lookup,
            ledger: Arc::new(CapacityLedger::new()),
            roster: Arc::new(DriverRoster::new()),
            audit: Arc::new(AuditTrail::new()),
            journal: None,
        }
    }
}

pub struct StatusTransitionEngine {
    stores: Arc<Stores>,
    coordinator: AssignmentCoordinator,
    lookup: Arc<dyn Lookup>,
}

impl StatusTransitionEngine {
    pub fn new(parts: LifecycleParts) -> Self {
        let stores = Arc::new(Stores {
            shipments: ShipmentStore::new(),
            ledger: parts.ledger,
            roster: parts.roster,
            audit: parts.audit,
            journal: parts.journal,
        });
        let coordinator = AssignmentCoordinator::new(Arc::clone(&stores), Arc::clone(&parts.lookup));
        Self {
            stores,
            coordinator,
            lookup: parts.lookup,
        }
    }

    pub fn coordinator(&self) -> &AssignmentCoordinator {
        &self.coordinator
    }

    pub fn ledger(&self) -> &Arc<CapacityLedger> {
        &self.stores.ledger
    }

    pub fn roster(&self) -> &Arc<DriverRoster> {
        &self.stores.roster
    }

    pub fn audit(&self) -> &Arc<AuditTrail> {
        &self.stores.audit
    }

    pub fn lookup(&self) -> &Arc<dyn Lookup> {
        &self.lookup
    }

    pub(crate) fn journal(&self) -> Option<&Arc<dyn ChangeJournal>> {
        self.stores.journal.as_ref()
    }

    // ── creation ────────────────────────────────────────────────────────

    /// Check a creation request without creating anything: details, merchant,
    /// and the optional warehouse/driver references.
    pub fn validate_new(&self, new: &NewShipment) -> Result<(), LifecycleError> {
        new.details.validate()?;
        if self.lookup.resolve_merchant(new.merchant_id).is_none() {
            return Err(LifecycleError::not_found("merchant", new.merchant_id));
        }
        if let Some(warehouse_id) = new.warehouse_id {
            self.coordinator.ensure_warehouse_eligible(warehouse_id)?;
        }
        if let Some(driver_id) = new.driver_id {
            self.coordinator.ensure_driver_eligible(driver_id)?;
        }
        Ok(())
    }

    /// Create a shipment in `NEW`, then make any requested assignments.
    pub fn create(&self, new: NewShipment) -> Result<Created, LifecycleError> {
        self.validate_new(&new)?;

        let id = ShipmentId::new();
        let (tracking, barcode) = self.claim_references(id, &new)?;
        let shipment = Shipment::new(id, new.merchant_id, tracking, barcode, new.details);

        let cell = Arc::new(parking_lot::Mutex::new(None));
        let entry = {
            let mut slot = cell.lock();
            *slot = Some(shipment.clone());
            self.stores.shipments.insert_cell(id, Arc::clone(&cell));
            let entry = self
                .stores
                .audit
                .append(id, ShipmentStatus::New, None, None);
            if let Some(journal) = self.journal() {
                journal.record(Change::Shipment {
                    shipment: shipment.clone(),
                    history: vec![entry.clone()],
                    accounts: Vec::new(),
                    drivers: Vec::new(),
                });
            }
            entry
        };
        tracing::info!(
            shipment_id = %id,
            tracking_number = %shipment.tracking_number,
            merchant_id = %shipment.merchant_id,
            "shipment created"
        );

        let mut warnings = Vec::new();
        let mut shipment = shipment;
        if let Some(warehouse_id) = new.warehouse_id {
            match self.coordinator.assign_warehouse(id, warehouse_id) {
                Ok(updated) => shipment = updated,
                Err(err) => warnings.push(err),
            }
        }
        if let Some(driver_id) = new.driver_id {
            match self.coordinator.assign_driver(id, driver_id) {
                Ok(updated) => shipment = updated,
                Err(err) => warnings.push(err),
            }
        }

        Ok(Created {
            shipment,
            entry,
            warnings,
        })
    }

    fn claim_references(
        &self,
        id: ShipmentId,
        new: &NewShipment,
    ) -> Result<(TrackingNumber, Barcode), LifecycleError> {
        let mut last_err = None;
        for _ in 0..MAX_ISSUE_ATTEMPTS {
            let tracking = new.tracking_number.clone().unwrap_or_else(TrackingNumber::issue);
            let barcode = new.barcode.clone().unwrap_or_else(Barcode::issue);
            match self.stores.shipments.claim_references(id, &tracking, &barcode) {
                Ok(()) => return Ok((tracking, barcode)),
                Err(LifecycleError::Duplicate { field, value }) => {
                    let issued = match field {
                        "trackingNumber" => new.tracking_number.is_none(),
                        _ => new.barcode.is_none(),
                    };
                    if !issued {
                        return Err(LifecycleError::Duplicate { field, value });
                    }
                    last_err = Some(LifecycleError::Duplicate { field, value });
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            LifecycleError::invariant("reference issuance loop ended without a result")
        }))
    }

    /// Insert a stored shipment (hydration). No audit entry is written.
    pub fn restore_shipment(&self, shipment: Shipment) -> Result<(), LifecycleError> {
        self.stores.shipments.restore(shipment)
    }

    /// Keep the references of a shipment deleted before restart claimed.
    pub fn restore_retired_references(
        &self,
        shipment_id: ShipmentId,
        tracking_number: &TrackingNumber,
        barcode: &Barcode,
    ) -> Result<(), LifecycleError> {
        self.stores
            .shipments
            .claim_references(shipment_id, tracking_number, barcode)
    }

    // ── transitions ─────────────────────────────────────────────────────

    /// Move a shipment to `request.status`, applying side effects atomically.
    pub fn apply_transition(
        &self,
        shipment_id: ShipmentId,
        request: TransitionRequest,
    ) -> Result<TransitionOutcome, LifecycleError> {
        let target = request.status;
        let result = self.stores.transact(
            shipment_id,
            request.warehouse_id,
            request.driver_id,
            |cs| {
                let from = cs.shipment().status;
                if !from.can_transition_to(target) {
                    return Err(LifecycleError::InvalidTransition {
                        shipment_id,
                        from,
                        to: target,
                    });
                }

                if let Some(warehouse_id) = request.warehouse_id {
                    self.coordinator.place_in_warehouse(cs, warehouse_id)?;
                }
                if let Some(driver_id) = request.driver_id {
                    self.coordinator.engage_driver(cs, driver_id)?;
                }

                match target {
                    ShipmentStatus::InWarehouse => {
                        if cs.shipment().held_warehouse().is_none() {
                            return Err(LifecycleError::AssignmentRequired {
                                shipment_id,
                                target,
                                missing: "warehouse",
                            });
                        }
                    }
                    ShipmentStatus::WithDriver => {
                        let driver_id = cs.shipment().held_driver().ok_or(
                            LifecycleError::AssignmentRequired {
                                shipment_id,
                                target,
                                missing: "driver",
                            },
                        )?;
                        self.coordinator.ensure_driver_eligible(driver_id)?;
                        self.coordinator.vacate_warehouse(cs)?;
                    }
                    ShipmentStatus::Delivered
                    | ShipmentStatus::Returned
                    | ShipmentStatus::PartialReturned => {
                        self.coordinator.disengage_driver(cs)?;
                    }
                    ShipmentStatus::New
                    | ShipmentStatus::InReceipt
                    | ShipmentStatus::DeliveryFailed => {}
                }

                let shipment = cs.shipment_mut();
                shipment.status = target;
                shipment.touch();
                cs.record_status(target, request.notes.clone(), request.location.clone());
                Ok(from)
            },
        );

        match result {
            Ok(committed) => {
                let from = committed.value;
                let shipment = committed_shipment(committed.shipment, shipment_id)?;
                let entry = committed.history.into_iter().last().ok_or_else(|| {
                    LifecycleError::invariant(format!(
                        "transition of shipment {shipment_id} committed without a history entry"
                    ))
                })?;
                tracing::info!(
                    %shipment_id,
                    %from,
                    to = %target,
                    warehouse_id = ?shipment.warehouse_id,
                    driver_id = ?shipment.driver_id,
                    "status transition accepted"
                );
                Ok(TransitionOutcome { shipment, entry })
            }
            Err(err) => {
                tracing::warn!(%shipment_id, to = %target, code = err.code(), error = %err, "status transition rejected");
                Err(err)
            }
        }
    }

    // ── edits & deletion ────────────────────────────────────────────────

    /// Edit descriptive fields. Lifecycle fields are not reachable from here.
    pub fn update_details(
        &self,
        shipment_id: ShipmentId,
        patch: &ShipmentDetailsPatch,
    ) -> Result<Shipment, LifecycleError> {
        let committed = self.stores.transact(shipment_id, None, None, |cs| {
            let next = patch.apply(&cs.shipment().details)?;
            let shipment = cs.shipment_mut();
            if shipment.details != next {
                shipment.details = next;
                shipment.touch();
            }
            Ok(())
        })?;
        committed_shipment(committed.shipment, shipment_id)
    }

    /// Delete a shipment that is still `NEW`, freeing anything it holds.
    pub fn delete(&self, shipment_id: ShipmentId) -> Result<Shipment, LifecycleError> {
        let committed = self.stores.transact(shipment_id, None, None, |cs| {
            let status = cs.shipment().status;
            if status != ShipmentStatus::New {
                return Err(LifecycleError::DeleteForbidden {
                    shipment_id,
                    status,
                });
            }
            self.coordinator.vacate_warehouse(cs)?;
            self.coordinator.disengage_driver(cs)?;
            cs.mark_deleted();
            Ok(cs.shipment().clone())
        })?;
        tracing::info!(%shipment_id, "shipment deleted");
        Ok(committed.value)
    }

    // ── reads ───────────────────────────────────────────────────────────

    pub fn get(&self, shipment_id: ShipmentId) -> Result<Shipment, LifecycleError> {
        self.stores
            .shipments
            .get(shipment_id)
            .ok_or_else(|| LifecycleError::not_found("shipment", shipment_id))
    }

    /// Shipment and history read under the shipment lock, so the two agree.
    pub fn detail(&self, shipment_id: ShipmentId) -> Result<ShipmentDetail, LifecycleError> {
        let not_found = || LifecycleError::not_found("shipment", shipment_id);
        let cell = self.stores.shipments.cell(shipment_id).ok_or_else(not_found)?;
        let slot = cell.lock();
        let shipment = slot.clone().ok_or_else(not_found)?;
        let status_history = self.stores.audit.history(shipment_id);
        drop(slot);
        Ok(ShipmentDetail {
            shipment,
            status_history,
        })
    }

    /// One page of shipments, oldest first, and the unpaged total.
    pub fn list(
        &self,
        status: Option<ShipmentStatus>,
        offset: usize,
        limit: usize,
    ) -> (Vec<Shipment>, usize) {
        let all = self.stores.shipments.list(status);
        let total = all.len();
        (all.into_iter().skip(offset).take(limit).collect(), total)
    }

    pub fn find_by_tracking(&self, tracking: &TrackingNumber) -> Option<Shipment> {
        self.stores
            .shipments
            .find_by_tracking(tracking)
            .and_then(|id| self.stores.shipments.get(id))
    }

    /// History entries after `cursor`, for change polling.
    pub fn changes_since(&self, cursor: u64, limit: usize) -> Vec<StatusHistoryEntry> {
        self.stores.audit.entries_since(cursor, limit)
    }

    pub fn shipment_count(&self) -> usize {
        self.stores.shipments.len()
    }
}

impl std::fmt::Debug for StatusTransitionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusTransitionEngine")
            .field("shipments", &self.stores.shipments)
            .field("ledger", &self.stores.ledger)
            .field("roster", &self.stores.roster)
            .field("audit", &self.stores.audit)
            .finish()
    }
}
