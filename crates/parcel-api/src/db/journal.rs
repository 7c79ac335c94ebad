//! Postgres-backed [`ChangeJournal`].
//!
//! `record` is called with lifecycle locks held, so it only pushes onto an
//! unbounded channel. One writer task drains the channel and applies each
//! change in its own transaction, preserving commit order.

use sqlx::{PgPool, Postgres, Transaction};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use parcel_core::{DriverId, WarehouseId};
use parcel_lifecycle::{Change, ChangeJournal, DriverSlot, WarehouseAccount};
use parcel_state::{Shipment, StatusHistoryEntry};

use crate::middleware::metrics::ApiMetrics;
use crate::state::PersistenceHealth;

/// Forwards committed changes to the storage writer.
pub struct PgJournal {
    sender: mpsc::UnboundedSender<Change>,
    metrics: ApiMetrics,
    health: PersistenceHealth,
}

impl PgJournal {
    /// Start the writer task on the current runtime.
    ///
    /// The task ends once every `PgJournal` clone of the sender is dropped
    /// and the channel is drained.
    pub fn spawn(
        pool: PgPool,
        metrics: ApiMetrics,
        health: PersistenceHealth,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_writer(
            pool,
            receiver,
            metrics.clone(),
            health.clone(),
        ));
        (
            Self {
                sender,
                metrics,
                health,
            },
            handle,
        )
    }
}

impl ChangeJournal for PgJournal {
    fn record(&self, change: Change) {
        if let Err(mpsc::error::SendError(change)) = self.sender.send(change) {
            let (kind, id) = describe(&change);
            tracing::error!(kind, id = %id, "storage writer has stopped; change not persisted");
            self.metrics.persistence_failed();
            self.health.mark_failed("storage writer has stopped");
        }
    }
}

impl std::fmt::Debug for PgJournal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgJournal")
            .field("closed", &self.sender.is_closed())
            .finish_non_exhaustive()
    }
}

async fn run_writer(
    pool: PgPool,
    mut receiver: mpsc::UnboundedReceiver<Change>,
    metrics: ApiMetrics,
    health: PersistenceHealth,
) {
    tracing::info!("storage writer started");
    while let Some(change) = receiver.recv().await {
        if let Err(err) = apply(&pool, &change).await {
            let (kind, id) = describe(&change);
            tracing::error!(kind, id = %id, error = %err, "failed to persist committed change");
            metrics.persistence_failed();
            health.mark_failed(format!("failed to persist {kind} {id}: {err}"));
        }
    }
    tracing::info!("storage writer drained");
}

/// Entity kind and id of a change, for logs.
fn describe(change: &Change) -> (&'static str, String) {
    match change {
        Change::Shipment { shipment, .. } => ("shipment", shipment.id.to_string()),
        Change::ShipmentDeleted { shipment_id, .. } => ("shipment", shipment_id.to_string()),
        Change::Warehouse { profile, .. } => ("warehouse", profile.id.to_string()),
        Change::Driver { profile, .. } => ("driver", profile.id.to_string()),
        Change::Merchant { profile } => ("merchant", profile.id.to_string()),
    }
}

fn encode<T: serde::Serialize>(what: &str, value: &T) -> Result<serde_json::Value, sqlx::Error> {
    serde_json::to_value(value)
        .map_err(|e| sqlx::Error::Protocol(format!("failed to serialize {what}: {e}")))
}

/// Apply one change in a single transaction.
pub async fn apply(pool: &PgPool, change: &Change) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    match change {
        Change::Shipment {
            shipment,
            history,
            accounts,
            drivers,
        } => {
            upsert_shipment(&mut tx, shipment).await?;
            update_accounts(&mut tx, accounts).await?;
            update_slots(&mut tx, drivers).await?;
            insert_history(&mut tx, history).await?;
        }
        Change::ShipmentDeleted {
            shipment_id,
            tracking_number,
            barcode,
            accounts,
            drivers,
        } => {
            sqlx::query(
                "INSERT INTO retired_references (tracking_number, barcode, shipment_id)
                 VALUES ($1, $2, $3)",
            )
            .bind(tracking_number.as_str())
            .bind(barcode.as_str())
            .bind(*shipment_id.as_uuid())
            .execute(&mut *tx)
            .await?;
            sqlx::query("DELETE FROM shipments WHERE id = $1")
                .bind(*shipment_id.as_uuid())
                .execute(&mut *tx)
                .await?;
            update_accounts(&mut tx, accounts).await?;
            update_slots(&mut tx, drivers).await?;
        }
        Change::Warehouse { profile, account } => {
            sqlx::query(
                "INSERT INTO warehouses (id, profile, capacity, current_load, created_at)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (id) DO UPDATE SET
                    profile = EXCLUDED.profile,
                    capacity = EXCLUDED.capacity,
                    current_load = EXCLUDED.current_load",
            )
            .bind(*profile.id.as_uuid())
            .bind(encode("warehouse profile", profile)?)
            .bind(i64::from(account.capacity))
            .bind(i64::from(account.current_load))
            .bind(profile.created_at)
            .execute(&mut *tx)
            .await?;
        }
        Change::Driver { profile, slot } => {
            sqlx::query(
                "INSERT INTO drivers (id, profile, is_available, shipment_id, created_at)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (id) DO UPDATE SET
                    profile = EXCLUDED.profile,
                    is_available = EXCLUDED.is_available,
                    shipment_id = EXCLUDED.shipment_id",
            )
            .bind(*profile.id.as_uuid())
            .bind(encode("driver profile", profile)?)
            .bind(slot.is_available)
            .bind(slot.shipment_id.map(|id| *id.as_uuid()))
            .bind(profile.created_at)
            .execute(&mut *tx)
            .await?;
        }
        Change::Merchant { profile } => {
            sqlx::query(
                "INSERT INTO merchants (id, profile, created_at) VALUES ($1, $2, $3)
                 ON CONFLICT (id) DO UPDATE SET profile = EXCLUDED.profile",
            )
            .bind(*profile.id.as_uuid())
            .bind(encode("merchant profile", profile)?)
            .bind(profile.created_at)
            .execute(&mut *tx)
            .await?;
        }
    }
    tx.commit().await
}

async fn upsert_shipment(
    tx: &mut Transaction<'_, Postgres>,
    shipment: &Shipment,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO shipments (id, tracking_number, barcode, status, record, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         ON CONFLICT (id) DO UPDATE SET
            status = EXCLUDED.status,
            record = EXCLUDED.record,
            updated_at = EXCLUDED.updated_at",
    )
    .bind(*shipment.id.as_uuid())
    .bind(shipment.tracking_number.as_str())
    .bind(shipment.barcode.as_str())
    .bind(shipment.status.as_str())
    .bind(encode("shipment", shipment)?)
    .bind(shipment.created_at)
    .bind(shipment.updated_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn update_accounts(
    tx: &mut Transaction<'_, Postgres>,
    accounts: &[(WarehouseId, WarehouseAccount)],
) -> Result<(), sqlx::Error> {
    for (id, account) in accounts {
        sqlx::query("UPDATE warehouses SET capacity = $2, current_load = $3 WHERE id = $1")
            .bind(*id.as_uuid())
            .bind(i64::from(account.capacity))
            .bind(i64::from(account.current_load))
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

async fn update_slots(
    tx: &mut Transaction<'_, Postgres>,
    drivers: &[(DriverId, DriverSlot)],
) -> Result<(), sqlx::Error> {
    for (id, slot) in drivers {
        sqlx::query("UPDATE drivers SET is_available = $2, shipment_id = $3 WHERE id = $1")
            .bind(*id.as_uuid())
            .bind(slot.is_available)
            .bind(slot.shipment_id.map(|s| *s.as_uuid()))
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

async fn insert_history(
    tx: &mut Transaction<'_, Postgres>,
    entries: &[StatusHistoryEntry],
) -> Result<(), sqlx::Error> {
    for entry in entries {
        let sequence = i64::try_from(entry.sequence).map_err(|_| {
            sqlx::Error::Protocol(format!("history sequence {} out of range", entry.sequence))
        })?;
        sqlx::query(
            "INSERT INTO status_history (sequence, shipment_id, status, notes, location, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (sequence) DO NOTHING",
        )
        .bind(sequence)
        .bind(*entry.shipment_id.as_uuid())
        .bind(entry.status.as_str())
        .bind(entry.notes.as_deref())
        .bind(entry.location.as_deref())
        .bind(entry.created_at)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}
