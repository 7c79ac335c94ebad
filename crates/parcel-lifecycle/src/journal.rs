//! # Change Journal
//!
//! Every committed change is handed to the journal while the locks that
//! produced it are still held, so the journal observes changes to any one
//! entity in commit order. Implementations must not block: the typical one
//! pushes onto a channel drained by a single storage writer.

use serde::Serialize;

use parcel_core::{Barcode, DriverId, ShipmentId, TrackingNumber, WarehouseId};
use parcel_state::{Shipment, StatusHistoryEntry};

use crate::assignment::DriverSlot;
use crate::directory::{DriverProfile, MerchantProfile, WarehouseProfile};
use crate::ledger::WarehouseAccount;

/// One committed unit of work.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Change {
    /// A shipment changeset: the shipment row plus every account, driver
    /// slot and history entry it touched.
    Shipment {
        shipment: Shipment,
        history: Vec<StatusHistoryEntry>,
        accounts: Vec<(WarehouseId, WarehouseAccount)>,
        drivers: Vec<(DriverId, DriverSlot)>,
    },
    /// A `NEW` shipment was deleted. Its references stay retired.
    ShipmentDeleted {
        shipment_id: ShipmentId,
        tracking_number: TrackingNumber,
        barcode: Barcode,
        accounts: Vec<(WarehouseId, WarehouseAccount)>,
        drivers: Vec<(DriverId, DriverSlot)>,
    },
    Warehouse {
        profile: WarehouseProfile,
        account: WarehouseAccount,
    },
    Driver {
        profile: DriverProfile,
        slot: DriverSlot,
    },
    Merchant {
        profile: MerchantProfile,
    },
}

pub trait ChangeJournal: Send + Sync {
    fn record(&self, change: Change);
}

/// Journal that keeps changes in memory. Used in tests.
#[derive(Debug, Default)]
pub struct MemoryJournal {
    changes: parking_lot::Mutex<Vec<Change>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<Change> {
        std::mem::take(&mut *self.changes.lock())
    }
}

impl ChangeJournal for MemoryJournal {
    fn record(&self, change: Change) {
        self.changes.lock().push(change);
    }
}
