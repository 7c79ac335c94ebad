//! # Assignment Coordinator
//!
//! Places shipments in warehouses and hands them to drivers. The coordinator
//! is the only writer of driver availability (the [`DriverRoster`]) and the
//! only caller of the ledger's reserve/release on behalf of shipments.
//!
//! Every operation runs inside a changeset (see [`crate::changeset`]), so the
//! shipment, the warehouse accounts and the driver slots involved are locked
//! together and either all change or none do. The one deliberate exception
//! is [`AssignmentCoordinator::reassign_warehouse`]: when the new warehouse
//! refuses the reservation, the release from the old one stands and the
//! shipment is left without a warehouse.
//!
//! Rules:
//!
//! - Warehouse placement is allowed in `NEW`, `IN_RECEIPT` and
//!   `IN_WAREHOUSE` only. The warehouse must exist and be active.
//! - Driver assignment is allowed in `NEW`, `IN_RECEIPT`, `IN_WAREHOUSE`
//!   and `DELIVERY_FAILED`. The driver must be active and available.
//!   Re-assigning the driver a shipment already holds is a no-op.
//! - A held driver can be released while the shipment is not out with them.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use parcel_core::{DriverId, ShipmentId, WarehouseId};
use parcel_state::{Shipment, ShipmentStatus};

use crate::changeset::{Changeset, Stores};
use crate::directory::Lookup;
use crate::error::LifecycleError;

// ---------------------------------------------------------------------------
// Driver roster
// ---------------------------------------------------------------------------

/// Dispatch state of one driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DriverSlot {
    pub is_available: bool,
    /// Shipment currently holding the driver.
    pub shipment_id: Option<ShipmentId>,
}

pub type SlotHandle = Arc<Mutex<DriverSlot>>;

/// Availability of every driver, one mutex per driver.
#[derive(Default)]
pub struct DriverRoster {
    slots: DashMap<DriverId, SlotHandle>,
}

impl DriverRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a driver with the given initial availability.
    pub fn enroll(&self, id: DriverId, is_available: bool) -> Result<DriverSlot, LifecycleError> {
        self.restore(
            id,
            DriverSlot {
                is_available,
                shipment_id: None,
            },
        )
    }

    /// Insert a stored slot (hydration).
    pub fn restore(&self, id: DriverId, slot: DriverSlot) -> Result<DriverSlot, LifecycleError> {
        match self.slots.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(LifecycleError::Duplicate {
                field: "driverId",
                value: id.to_string(),
            }),
            dashmap::mapref::entry::Entry::Vacant(v) => {
                v.insert(Arc::new(Mutex::new(slot)));
                Ok(slot)
            }
        }
    }

    pub fn handle(&self, id: DriverId) -> Option<SlotHandle> {
        self.slots.get(&id).map(|s| Arc::clone(s.value()))
    }

    pub fn snapshot(&self, id: DriverId) -> Option<DriverSlot> {
        self.handle(id).map(|s| *s.lock())
    }

    /// Run `f` on the slot under its lock.
    pub fn inspect<R>(&self, id: DriverId, f: impl FnOnce(&DriverSlot) -> R) -> Option<R> {
        self.handle(id).map(|s| f(&s.lock()))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl std::fmt::Debug for DriverRoster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRoster")
            .field("drivers", &self.slots.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

pub struct AssignmentCoordinator {
    stores: Arc<Stores>,
    lookup: Arc<dyn Lookup>,
}

impl AssignmentCoordinator {
    pub(crate) fn new(stores: Arc<Stores>, lookup: Arc<dyn Lookup>) -> Self {
        Self { stores, lookup }
    }

    /// Place the shipment in `warehouse_id`, reserving one unit.
    ///
    /// A no-op if the shipment already occupies that warehouse. If it
    /// occupies a different one this is a reassignment.
    pub fn assign_warehouse(
        &self,
        shipment_id: ShipmentId,
        warehouse_id: WarehouseId,
    ) -> Result<Shipment, LifecycleError> {
        self.reassign_warehouse(shipment_id, warehouse_id)
    }

    /// Release the current warehouse unit (if any), then reserve one in
    /// `warehouse_id`. A refused reservation does not undo the release and
    /// is reported as [`LifecycleError::ReassignmentIncomplete`].
    pub fn reassign_warehouse(
        &self,
        shipment_id: ShipmentId,
        warehouse_id: WarehouseId,
    ) -> Result<Shipment, LifecycleError> {
        let committed = self
            .stores
            .transact(shipment_id, Some(warehouse_id), None, |cs| {
                self.ensure_warehouse_assignable(cs)?;
                if cs.shipment().held_warehouse() == Some(warehouse_id) {
                    return Ok(Ok(()));
                }
                self.ensure_warehouse_eligible(warehouse_id)?;

                let released = self.vacate_warehouse(cs)?;
                match self.occupy_warehouse(cs, warehouse_id) {
                    Ok(_) => {
                        cs.shipment_mut().touch();
                        Ok(Ok(()))
                    }
                    Err(cause) => match released {
                        // Nothing was released: plain assignment failure, roll back.
                        None => Err(cause),
                        Some(released_from) => {
                            let shipment = cs.shipment_mut();
                            shipment.warehouse_id = None;
                            shipment.touch();
                            Ok(Err(LifecycleError::ReassignmentIncomplete {
                                shipment_id,
                                released_from,
                                attempted: warehouse_id,
                                cause: Box::new(cause),
                            }))
                        }
                    },
                }
            })
            .map_err(|err| {
                tracing::warn!(%shipment_id, %warehouse_id, error = %err, "warehouse assignment refused");
                err
            })?;

        if let Err(err) = committed.value {
            tracing::warn!(%shipment_id, %warehouse_id, error = %err, "warehouse reassignment incomplete");
            return Err(err);
        }
        tracing::info!(%shipment_id, %warehouse_id, "shipment placed in warehouse");
        committed_shipment(committed.shipment, shipment_id)
    }

    /// Assign `driver_id`, marking them unavailable. Replaces (and frees)
    /// any other driver the shipment held.
    pub fn assign_driver(
        &self,
        shipment_id: ShipmentId,
        driver_id: DriverId,
    ) -> Result<Shipment, LifecycleError> {
        let committed = self
            .stores
            .transact(shipment_id, None, Some(driver_id), |cs| {
                if self.engage_driver(cs, driver_id)? {
                    cs.shipment_mut().touch();
                }
                Ok(())
            })
            .map_err(|err| {
                tracing::warn!(%shipment_id, %driver_id, error = %err, "driver assignment refused");
                err
            })?;
        tracing::info!(%shipment_id, %driver_id, "driver assigned");
        committed_shipment(committed.shipment, shipment_id)
    }

    /// Free the shipment's driver. A no-op if it holds none.
    pub fn release_driver(&self, shipment_id: ShipmentId) -> Result<Shipment, LifecycleError> {
        let committed = self.stores.transact(shipment_id, None, None, |cs| {
            if cs.shipment().held_driver().is_none() {
                return Ok(None);
            }
            let status = cs.shipment().status;
            if status.holds_driver() {
                return Err(LifecycleError::AssignmentLocked {
                    shipment_id,
                    status,
                });
            }
            let released = self.disengage_driver(cs)?;
            let shipment = cs.shipment_mut();
            shipment.driver_id = None;
            shipment.touch();
            Ok(released)
        })?;
        if let Some(driver_id) = committed.value {
            tracing::info!(%shipment_id, %driver_id, "driver released");
        }
        committed_shipment(committed.shipment, shipment_id)
    }

    // -- Changeset-level steps, shared with the transition engine ----------

    pub(crate) fn ensure_warehouse_assignable(&self, cs: &Changeset<'_>) -> Result<(), LifecycleError> {
        let status = cs.shipment().status;
        if status.accepts_warehouse_assignment() {
            Ok(())
        } else {
            Err(LifecycleError::AssignmentLocked {
                shipment_id: cs.shipment_id(),
                status,
            })
        }
    }

    pub(crate) fn ensure_warehouse_eligible(&self, warehouse_id: WarehouseId) -> Result<(), LifecycleError> {
        let profile = self
            .lookup
            .resolve_warehouse(warehouse_id)
            .ok_or_else(|| LifecycleError::not_found("warehouse", warehouse_id))?;
        if !profile.is_active {
            return Err(LifecycleError::Ineligible {
                kind: "warehouse",
                id: warehouse_id.to_string(),
                reason: "warehouse is inactive".into(),
            });
        }
        Ok(())
    }

    pub(crate) fn ensure_driver_eligible(&self, driver_id: DriverId) -> Result<(), LifecycleError> {
        let profile = self
            .lookup
            .resolve_driver(driver_id)
            .ok_or_else(|| LifecycleError::not_found("driver", driver_id))?;
        if !profile.is_active {
            return Err(LifecycleError::Ineligible {
                kind: "driver",
                id: driver_id.to_string(),
                reason: "driver is inactive".into(),
            });
        }
        Ok(())
    }

    /// Atomic placement used inside transitions: any failure rolls back the
    /// whole changeset, including the release from a previous warehouse.
    pub(crate) fn place_in_warehouse(
        &self,
        cs: &mut Changeset<'_>,
        warehouse_id: WarehouseId,
    ) -> Result<(), LifecycleError> {
        if cs.shipment().held_warehouse() == Some(warehouse_id) {
            return Ok(());
        }
        self.ensure_warehouse_assignable(cs)?;
        self.ensure_warehouse_eligible(warehouse_id)?;
        self.vacate_warehouse(cs)?;
        self.occupy_warehouse(cs, warehouse_id)?;
        Ok(())
    }

    /// Reserve one unit in `warehouse_id` and record the placement.
    fn occupy_warehouse(&self, cs: &mut Changeset<'_>, warehouse_id: WarehouseId) -> Result<u32, LifecycleError> {
        let utilization = cs.account_mut(warehouse_id)?.reserve(warehouse_id, 1)?;
        let shipment = cs.shipment_mut();
        shipment.warehouse_id = Some(warehouse_id);
        shipment.occupies_warehouse = true;
        tracing::debug!(shipment_id = %shipment.id, %warehouse_id, utilization, "warehouse unit reserved");
        Ok(utilization)
    }

    /// Release the unit the shipment occupies, if any. The shipment keeps
    /// `warehouse_id` as its origin.
    pub(crate) fn vacate_warehouse(&self, cs: &mut Changeset<'_>) -> Result<Option<WarehouseId>, LifecycleError> {
        let Some(warehouse_id) = cs.shipment().held_warehouse() else {
            return Ok(None);
        };
        let utilization = cs.account_mut(warehouse_id)?.release(warehouse_id, 1)?;
        let shipment = cs.shipment_mut();
        shipment.occupies_warehouse = false;
        tracing::debug!(shipment_id = %shipment.id, %warehouse_id, utilization, "warehouse unit released");
        Ok(Some(warehouse_id))
    }

    /// Hold `driver_id` for this shipment. Returns whether anything changed.
    pub(crate) fn engage_driver(&self, cs: &mut Changeset<'_>, driver_id: DriverId) -> Result<bool, LifecycleError> {
        let shipment_id = cs.shipment_id();
        if cs.shipment().held_driver() == Some(driver_id) {
            let slot = cs.driver_mut(driver_id)?;
            if slot.shipment_id != Some(shipment_id) {
                return Err(LifecycleError::invariant(format!(
                    "shipment {shipment_id} holds driver {driver_id} but the roster says {:?}",
                    slot.shipment_id
                )));
            }
            return Ok(false);
        }

        let status = cs.shipment().status;
        if !matches!(
            status,
            ShipmentStatus::New
                | ShipmentStatus::InReceipt
                | ShipmentStatus::InWarehouse
                | ShipmentStatus::DeliveryFailed
        ) {
            return Err(LifecycleError::AssignmentLocked {
                shipment_id,
                status,
            });
        }
        self.ensure_driver_eligible(driver_id)?;

        let slot = cs.driver_mut(driver_id)?;
        if !slot.is_available {
            return Err(LifecycleError::DriverUnavailable {
                driver_id,
                held_by: slot.shipment_id,
            });
        }
        slot.is_available = false;
        slot.shipment_id = Some(shipment_id);

        self.disengage_driver(cs)?;
        cs.shipment_mut().driver_id = Some(driver_id);
        Ok(true)
    }

    /// Make the held driver available again. `driver_id` stays on the
    /// shipment; callers clear it when the release is not a hand-back.
    pub(crate) fn disengage_driver(&self, cs: &mut Changeset<'_>) -> Result<Option<DriverId>, LifecycleError> {
        let shipment_id = cs.shipment_id();
        let Some(driver_id) = cs.shipment().held_driver() else {
            return Ok(None);
        };
        let slot = cs.driver_mut(driver_id)?;
        if slot.shipment_id != Some(shipment_id) || slot.is_available {
            return Err(LifecycleError::invariant(format!(
                "shipment {shipment_id} releases driver {driver_id} whose slot is {slot:?}"
            )));
        }
        slot.is_available = true;
        slot.shipment_id = None;
        Ok(Some(driver_id))
    }
}

impl std::fmt::Debug for AssignmentCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssignmentCoordinator").finish_non_exhaustive()
    }
}

pub(crate) fn committed_shipment(
    shipment: Option<Shipment>,
    shipment_id: ShipmentId,
) -> Result<Shipment, LifecycleError> {
    shipment.ok_or_else(|| LifecycleError::not_found("shipment", shipment_id))
}
