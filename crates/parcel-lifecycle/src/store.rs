//! # Shipment Store
//!
//! Each shipment lives in its own cell (`Arc<Mutex<Option<Shipment>>>`).
//! A cell holding `None` belongs to a shipment deleted after the caller
//! fetched the handle; lockers must treat it as not found.
//!
//! Tracking numbers and barcodes are unique across all shipments, enforced
//! by the two indexes here at claim time. Once issued they stay claimed,
//! including after the shipment is deleted.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;

use parcel_core::{Barcode, ShipmentId, TrackingNumber};
use parcel_state::{Shipment, ShipmentStatus};

use crate::error::LifecycleError;

pub type ShipmentCell = Arc<Mutex<Option<Shipment>>>;

#[derive(Default)]
pub struct ShipmentStore {
    cells: DashMap<ShipmentId, ShipmentCell>,
    by_tracking: DashMap<TrackingNumber, ShipmentId>,
    by_barcode: DashMap<Barcode, ShipmentId>,
}

impl ShipmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cell(&self, id: ShipmentId) -> Option<ShipmentCell> {
        self.cells.get(&id).map(|c| Arc::clone(c.value()))
    }

    /// Claim both reference strings for `id`. On conflict nothing is claimed.
    pub fn claim_references(
        &self,
        id: ShipmentId,
        tracking: &TrackingNumber,
        barcode: &Barcode,
    ) -> Result<(), LifecycleError> {
        match self.by_tracking.entry(tracking.clone()) {
            Entry::Occupied(_) => {
                return Err(LifecycleError::Duplicate {
                    field: "trackingNumber",
                    value: tracking.to_string(),
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }
        match self.by_barcode.entry(barcode.clone()) {
            Entry::Occupied(_) => {
                self.by_tracking.remove_if(tracking, |_, owner| *owner == id);
                Err(LifecycleError::Duplicate {
                    field: "barcode",
                    value: barcode.to_string(),
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(id);
                Ok(())
            }
        }
    }

    /// Register a cell for a shipment whose references are already claimed.
    pub fn insert_cell(&self, id: ShipmentId, cell: ShipmentCell) {
        self.cells.insert(id, cell);
    }

    /// Insert a stored shipment (hydration). Claims its references.
    pub fn restore(&self, shipment: Shipment) -> Result<(), LifecycleError> {
        self.claim_references(shipment.id, &shipment.tracking_number, &shipment.barcode)?;
        self.cells
            .insert(shipment.id, Arc::new(Mutex::new(Some(shipment))));
        Ok(())
    }

    /// Drop a deleted shipment's cell. Its references stay claimed.
    pub fn forget(&self, shipment: &Shipment) {
        self.cells.remove(&shipment.id);
    }

    pub fn get(&self, id: ShipmentId) -> Option<Shipment> {
        self.cell(id).and_then(|c| c.lock().clone())
    }

    pub fn find_by_tracking(&self, tracking: &TrackingNumber) -> Option<ShipmentId> {
        self.by_tracking.get(tracking).map(|e| *e.value())
    }

    /// Every shipment, oldest first, optionally filtered by status.
    pub fn list(&self, status: Option<ShipmentStatus>) -> Vec<Shipment> {
        let cells: Vec<ShipmentCell> = self.cells.iter().map(|e| Arc::clone(e.value())).collect();
        let mut all: Vec<Shipment> = cells
            .into_iter()
            .filter_map(|c| c.lock().clone())
            .filter(|s| status.map_or(true, |st| s.status == st))
            .collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        all
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl std::fmt::Debug for ShipmentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShipmentStore")
            .field("shipments", &self.cells.len())
            .finish()
    }
}
