//! Start-up hydration.
//!
//! Reads every table into a [`Snapshot`] that `Core::open` restores into
//! the in-memory stores. A row that cannot be decoded fails hydration: the
//! process must not start with a partial view of loads and assignments.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use sqlx::PgPool;
use uuid::Uuid;

use parcel_core::{Barcode, ShipmentId, TrackingNumber, ValidationError, WarehouseId};
use parcel_lifecycle::{
    DriverProfile, DriverSlot, MerchantProfile, WarehouseAccount, WarehouseProfile,
};
use parcel_state::{Shipment, ShipmentStatus, StatusHistoryEntry};

/// Everything persisted, in restore order.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub merchants: Vec<MerchantProfile>,
    pub warehouses: Vec<(WarehouseProfile, WarehouseAccount)>,
    pub drivers: Vec<(DriverProfile, DriverSlot)>,
    /// Ordered by sequence.
    pub history: Vec<StatusHistoryEntry>,
    pub shipments: Vec<Shipment>,
    /// References of shipments deleted while `NEW`.
    pub retired: Vec<RetiredReferences>,
}

/// Tracking number and barcode that stay claimed after a deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetiredReferences {
    pub shipment_id: ShipmentId,
    pub tracking_number: TrackingNumber,
    pub barcode: Barcode,
}

/// Load every table.
pub async fn load_snapshot(pool: &PgPool) -> Result<Snapshot, sqlx::Error> {
    let merchants = sqlx::query_as::<_, DocumentRow>(
        "SELECT id, profile AS document FROM merchants ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|row| row.decode("merchants"))
    .collect::<Result<Vec<MerchantProfile>, _>>()?;

    let warehouses = sqlx::query_as::<_, WarehouseRow>(
        "SELECT id, profile, capacity, current_load FROM warehouses ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(WarehouseRow::into_record)
    .collect::<Result<Vec<_>, _>>()?;

    let drivers = sqlx::query_as::<_, DriverRow>(
        "SELECT id, profile, is_available, shipment_id FROM drivers ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(DriverRow::into_record)
    .collect::<Result<Vec<_>, _>>()?;

    let history = sqlx::query_as::<_, HistoryRow>(
        "SELECT sequence, shipment_id, status, notes, location, created_at
         FROM status_history ORDER BY sequence",
    )
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(HistoryRow::into_record)
    .collect::<Result<Vec<_>, _>>()?;

    let shipments = sqlx::query_as::<_, DocumentRow>(
        "SELECT id, record AS document FROM shipments ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|row| row.decode("shipments"))
    .collect::<Result<Vec<Shipment>, _>>()?;

    let retired = sqlx::query_as::<_, RetiredRow>(
        "SELECT shipment_id, tracking_number, barcode FROM retired_references ORDER BY retired_at",
    )
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(RetiredRow::into_record)
    .collect::<Result<Vec<_>, _>>()?;

    Ok(Snapshot {
        merchants,
        warehouses,
        drivers,
        history,
        shipments,
        retired,
    })
}

fn malformed(table: &str, id: impl std::fmt::Display, err: impl std::fmt::Display) -> sqlx::Error {
    sqlx::Error::Protocol(format!("malformed {table} row {id}: {err}"))
}

fn decode<T: DeserializeOwned>(
    table: &str,
    id: Uuid,
    value: serde_json::Value,
) -> Result<T, sqlx::Error> {
    serde_json::from_value(value).map_err(|e| malformed(table, id, e))
}

fn to_u32(table: &str, id: Uuid, column: &str, value: i64) -> Result<u32, sqlx::Error> {
    u32::try_from(value).map_err(|_| malformed(table, id, format!("{column} {value} out of range")))
}

/// A row whose payload is one JSONB document.
#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: Uuid,
    document: serde_json::Value,
}

impl DocumentRow {
    fn decode<T: DeserializeOwned>(self, table: &str) -> Result<T, sqlx::Error> {
        decode(table, self.id, self.document)
    }
}

#[derive(sqlx::FromRow)]
struct WarehouseRow {
    id: Uuid,
    profile: serde_json::Value,
    capacity: i64,
    current_load: i64,
}

impl WarehouseRow {
    fn into_record(self) -> Result<(WarehouseProfile, WarehouseAccount), sqlx::Error> {
        let profile: WarehouseProfile = decode("warehouses", self.id, self.profile)?;
        if profile.id != WarehouseId::from_uuid(self.id) {
            return Err(malformed("warehouses", self.id, "profile id does not match row id"));
        }
        let account = WarehouseAccount {
            capacity: to_u32("warehouses", self.id, "capacity", self.capacity)?,
            current_load: to_u32("warehouses", self.id, "current_load", self.current_load)?,
        };
        Ok((profile, account))
    }
}

#[derive(sqlx::FromRow)]
struct DriverRow {
    id: Uuid,
    profile: serde_json::Value,
    is_available: bool,
    shipment_id: Option<Uuid>,
}

impl DriverRow {
    fn into_record(self) -> Result<(DriverProfile, DriverSlot), sqlx::Error> {
        let profile: DriverProfile = decode("drivers", self.id, self.profile)?;
        let slot = DriverSlot {
            is_available: self.is_available,
            shipment_id: self.shipment_id.map(ShipmentId::from_uuid),
        };
        Ok((profile, slot))
    }
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    sequence: i64,
    shipment_id: Uuid,
    status: String,
    notes: Option<String>,
    location: Option<String>,
    created_at: DateTime<Utc>,
}

impl HistoryRow {
    fn into_record(self) -> Result<StatusHistoryEntry, sqlx::Error> {
        let status = ShipmentStatus::from_name(&self.status).ok_or_else(|| {
            malformed(
                "status_history",
                self.sequence,
                format!("unknown status '{}'", self.status),
            )
        })?;
        let sequence = u64::try_from(self.sequence)
            .map_err(|_| malformed("status_history", self.sequence, "negative sequence"))?;
        Ok(StatusHistoryEntry {
            sequence,
            shipment_id: ShipmentId::from_uuid(self.shipment_id),
            status,
            notes: self.notes,
            location: self.location,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RetiredRow {
    shipment_id: Uuid,
    tracking_number: String,
    barcode: String,
}

impl RetiredRow {
    fn into_record(self) -> Result<RetiredReferences, sqlx::Error> {
        let id = self.shipment_id;
        let bad = |e: ValidationError| malformed("retired_references", id, e);
        Ok(RetiredReferences {
            shipment_id: ShipmentId::from_uuid(id),
            tracking_number: TrackingNumber::new(self.tracking_number).map_err(bad)?,
            barcode: Barcode::new(self.barcode).map_err(bad)?,
        })
    }
}
