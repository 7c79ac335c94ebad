//! # Status Audit Trail
//!
//! Append-only log of accepted status changes. Every entry receives a
//! global, strictly increasing `sequence`; pollers keep the last sequence
//! they saw and ask for [`AuditTrail::entries_since`] instead of re-fetching
//! whole shipment lists.
//!
//! The latest entry for a shipment is authoritative for its current status.
//! There is no update or delete.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use parcel_core::ShipmentId;

use crate::status::ShipmentStatus;

/// One accepted status change. Immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusHistoryEntry {
    /// Global position in the trail, starting at 1.
    pub sequence: u64,
    pub shipment_id: ShipmentId,
    pub status: ShipmentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Log {
    entries: Vec<StatusHistoryEntry>,
    by_shipment: HashMap<ShipmentId, Vec<usize>>,
}

impl Log {
    fn push(&mut self, entry: StatusHistoryEntry) {
        let idx = self.entries.len();
        self.by_shipment
            .entry(entry.shipment_id)
            .or_default()
            .push(idx);
        self.entries.push(entry);
    }

    fn next_sequence(&self) -> u64 {
        self.entries.last().map_or(1, |e| e.sequence + 1)
    }
}

/// The shared audit trail.
#[derive(Default)]
pub struct AuditTrail {
    log: RwLock<Log>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted entries. Entries are ordered by `sequence`;
    /// new appends continue after the highest one.
    pub fn from_entries(mut entries: Vec<StatusHistoryEntry>) -> Self {
        entries.sort_by_key(|e| e.sequence);
        let mut log = Log::default();
        for entry in entries {
            log.push(entry);
        }
        Self {
            log: RwLock::new(log),
        }
    }

    /// Append one entry and return it.
    pub fn append(
        &self,
        shipment_id: ShipmentId,
        status: ShipmentStatus,
        notes: Option<String>,
        location: Option<String>,
    ) -> StatusHistoryEntry {
        let mut log = self.log.write();
        let entry = StatusHistoryEntry {
            sequence: log.next_sequence(),
            shipment_id,
            status,
            notes,
            location,
            created_at: Utc::now(),
        };
        log.push(entry.clone());
        entry
    }

    /// Full history of one shipment, oldest first.
    pub fn history(&self, shipment_id: ShipmentId) -> Vec<StatusHistoryEntry> {
        let log = self.log.read();
        log.by_shipment
            .get(&shipment_id)
            .map(|idxs| idxs.iter().map(|&i| log.entries[i].clone()).collect())
            .unwrap_or_default()
    }

    /// Most recent entry of one shipment.
    pub fn latest(&self, shipment_id: ShipmentId) -> Option<StatusHistoryEntry> {
        let log = self.log.read();
        log.by_shipment
            .get(&shipment_id)
            .and_then(|idxs| idxs.last())
            .map(|&i| log.entries[i].clone())
    }

    /// Status reconstructed from the trail.
    pub fn current_status(&self, shipment_id: ShipmentId) -> Option<ShipmentStatus> {
        self.latest(shipment_id).map(|e| e.status)
    }

    /// Up to `limit` entries with `sequence > cursor`, oldest first.
    pub fn entries_since(&self, cursor: u64, limit: usize) -> Vec<StatusHistoryEntry> {
        let log = self.log.read();
        let start = log.entries.partition_point(|e| e.sequence <= cursor);
        log.entries[start..].iter().take(limit).cloned().collect()
    }

    /// Highest sequence issued so far, 0 when empty.
    pub fn head(&self) -> u64 {
        self.log.read().entries.last().map_or(0, |e| e.sequence)
    }

    pub fn len(&self) -> usize {
        self.log.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for AuditTrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditTrail")
            .field("entries", &self.len())
            .field("head", &self.head())
            .finish()
    }
}
