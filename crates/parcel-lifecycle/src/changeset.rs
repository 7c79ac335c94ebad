//! # Changesets
//!
//! A changeset is one atomic unit of lifecycle work on one shipment. It
//! locks, in this order:
//!
//! 1. the shipment,
//! 2. every warehouse account it touches, ascending by id,
//! 3. every driver slot it touches, ascending by id.
//!
//! The fixed order rules out lock cycles between concurrent changesets.
//! All edits go to the locked values directly; on failure every account
//! and slot is restored from the snapshot taken at lock time and the
//! working copy of the shipment is discarded. History entries are queued
//! and only appended to the audit trail at commit, so a rejected change
//! never leaves an entry behind.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::MutexGuard;

use parcel_core::{DriverId, ShipmentId, WarehouseId};
use parcel_state::{AuditTrail, Shipment, ShipmentStatus, StatusHistoryEntry};

use crate::assignment::{DriverRoster, DriverSlot};
use crate::error::LifecycleError;
use crate::journal::{Change, ChangeJournal};
use crate::ledger::{CapacityLedger, WarehouseAccount};
use crate::store::ShipmentStore;

/// The shared state every changeset operates on.
pub(crate) struct Stores {
    pub shipments: ShipmentStore,
    pub ledger: Arc<CapacityLedger>,
    pub roster: Arc<DriverRoster>,
    pub audit: Arc<AuditTrail>,
    pub journal: Option<Arc<dyn ChangeJournal>>,
}

/// Result of a committed changeset.
#[derive(Debug)]
pub(crate) struct Committed<R> {
    pub value: R,
    /// `None` when the changeset deleted the shipment.
    pub shipment: Option<Shipment>,
    pub history: Vec<StatusHistoryEntry>,
}

struct Locked<'a, T: Copy + PartialEq> {
    guard: MutexGuard<'a, T>,
    snapshot: T,
}

impl<'a, T: Copy + PartialEq> Locked<'a, T> {
    fn new(guard: MutexGuard<'a, T>) -> Self {
        let snapshot = *guard;
        Self { guard, snapshot }
    }

    fn changed(&self) -> bool {
        *self.guard != self.snapshot
    }

    fn restore(&mut self) {
        *self.guard = self.snapshot;
    }
}

struct PendingEntry {
    status: ShipmentStatus,
    notes: Option<String>,
    location: Option<String>,
}

pub(crate) struct Changeset<'a> {
    original: Shipment,
    shipment: Shipment,
    warehouses: BTreeMap<WarehouseId, Locked<'a, WarehouseAccount>>,
    drivers: BTreeMap<DriverId, Locked<'a, DriverSlot>>,
    history: Vec<PendingEntry>,
    delete: bool,
}

impl<'a> Changeset<'a> {
    pub fn shipment(&self) -> &Shipment {
        &self.shipment
    }

    pub fn shipment_mut(&mut self) -> &mut Shipment {
        &mut self.shipment
    }

    pub fn shipment_id(&self) -> ShipmentId {
        self.shipment.id
    }

    pub fn account_mut(&mut self, id: WarehouseId) -> Result<&mut WarehouseAccount, LifecycleError> {
        self.warehouses
            .get_mut(&id)
            .map(|l| &mut *l.guard)
            .ok_or_else(|| LifecycleError::invariant(format!("warehouse {id} used outside its lock")))
    }

    pub fn driver_mut(&mut self, id: DriverId) -> Result<&mut DriverSlot, LifecycleError> {
        self.drivers
            .get_mut(&id)
            .map(|l| &mut *l.guard)
            .ok_or_else(|| LifecycleError::invariant(format!("driver {id} used outside its lock")))
    }

    /// Queue a history entry, appended at commit.
    pub fn record_status(
        &mut self,
        status: ShipmentStatus,
        notes: Option<String>,
        location: Option<String>,
    ) {
        self.history.push(PendingEntry {
            status,
            notes,
            location,
        });
    }

    pub fn mark_deleted(&mut self) {
        self.delete = true;
    }

    fn rollback(mut self) {
        for locked in self.warehouses.values_mut() {
            locked.restore();
        }
        for locked in self.drivers.values_mut() {
            locked.restore();
        }
    }

    fn commit<R>(
        self,
        slot: &mut MutexGuard<'_, Option<Shipment>>,
        stores: &Stores,
        value: R,
    ) -> Committed<R> {
        let accounts: Vec<(WarehouseId, WarehouseAccount)> = self
            .warehouses
            .iter()
            .filter(|(_, l)| l.changed())
            .map(|(id, l)| (*id, *l.guard))
            .collect();
        let drivers: Vec<(DriverId, DriverSlot)> = self
            .drivers
            .iter()
            .filter(|(_, l)| l.changed())
            .map(|(id, l)| (*id, *l.guard))
            .collect();

        let shipment = self.shipment;
        let history: Vec<StatusHistoryEntry> = self
            .history
            .into_iter()
            .map(|p| stores.audit.append(shipment.id, p.status, p.notes, p.location))
            .collect();

        if self.delete {
            **slot = None;
            stores.shipments.forget(&shipment);
            if let Some(journal) = &stores.journal {
                journal.record(Change::ShipmentDeleted {
                    shipment_id: shipment.id,
                    tracking_number: shipment.tracking_number.clone(),
                    barcode: shipment.barcode.clone(),
                    accounts,
                    drivers,
                });
            }
            return Committed {
                value,
                shipment: None,
                history,
            };
        }

        let unchanged =
            shipment == self.original && accounts.is_empty() && drivers.is_empty() && history.is_empty();
        **slot = Some(shipment.clone());
        if let (Some(journal), false) = (&stores.journal, unchanged) {
            journal.record(Change::Shipment {
                shipment: shipment.clone(),
                history: history.clone(),
                accounts,
                drivers,
            });
        }
        // Account and slot guards are released here, after the journal call.
        Committed {
            value,
            shipment: Some(shipment),
            history,
        }
    }
}

impl Stores {
    /// Run `body` as one changeset on `shipment_id`.
    ///
    /// The warehouse the shipment occupies and the driver it holds are always
    /// locked; `extra_warehouse` and `extra_driver` add the targets of a
    /// requested assignment.
    pub fn transact<R>(
        &self,
        shipment_id: ShipmentId,
        extra_warehouse: Option<WarehouseId>,
        extra_driver: Option<DriverId>,
        body: impl FnOnce(&mut Changeset<'_>) -> Result<R, LifecycleError>,
    ) -> Result<Committed<R>, LifecycleError> {
        let cell = self
            .shipments
            .cell(shipment_id)
            .ok_or_else(|| LifecycleError::not_found("shipment", shipment_id))?;
        let mut slot = cell.lock();
        let current = slot
            .clone()
            .ok_or_else(|| LifecycleError::not_found("shipment", shipment_id))?;

        let held_warehouse = current.held_warehouse();
        let held_driver = current.held_driver();
        let warehouse_ids: BTreeSet<WarehouseId> =
            held_warehouse.into_iter().chain(extra_warehouse).collect();
        let driver_ids: BTreeSet<DriverId> = held_driver.into_iter().chain(extra_driver).collect();

        let mut account_handles = Vec::with_capacity(warehouse_ids.len());
        for id in warehouse_ids {
            let handle = self.ledger.handle(id).ok_or_else(|| {
                if Some(id) == held_warehouse {
                    LifecycleError::invariant(format!(
                        "shipment {shipment_id} occupies warehouse {id}, which has no ledger account"
                    ))
                } else {
                    LifecycleError::not_found("warehouse", id)
                }
            })?;
            account_handles.push((id, handle));
        }

        let mut driver_handles = Vec::with_capacity(driver_ids.len());
        for id in driver_ids {
            let handle = self.roster.handle(id).ok_or_else(|| {
                if Some(id) == held_driver {
                    LifecycleError::invariant(format!(
                        "shipment {shipment_id} holds driver {id}, who has no roster slot"
                    ))
                } else {
                    LifecycleError::not_found("driver", id)
                }
            })?;
            driver_handles.push((id, handle));
        }

        let mut changeset = Changeset {
            original: current.clone(),
            shipment: current,
            warehouses: account_handles
                .iter()
                .map(|(id, h)| (*id, Locked::new(h.lock())))
                .collect(),
            drivers: driver_handles
                .iter()
                .map(|(id, h)| (*id, Locked::new(h.lock())))
                .collect(),
            history: Vec::new(),
            delete: false,
        };

        match body(&mut changeset) {
            Ok(value) => Ok(changeset.commit(&mut slot, self, value)),
            Err(err) => {
                changeset.rollback();
                Err(err)
            }
        }
    }
}
