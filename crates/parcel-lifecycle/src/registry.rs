//! # Reference Registry
//!
//! Registration and editing of warehouses, drivers and merchants. Profiles
//! go to the [`InMemoryDirectory`]; capacity and load to the
//! [`CapacityLedger`]; availability to the [`DriverRoster`].
//!
//! Edits never touch `current_load` or `is_available`: those change only
//! through assignments and transitions. Registration and edits are
//! journaled while the warehouse account or driver slot is locked, so they
//! are ordered against the changesets that touch the same entity.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use parcel_core::{DriverId, MerchantId, PhoneNumber, ValidationError, WarehouseId};

use crate::assignment::{DriverRoster, DriverSlot};
use crate::directory::{
    DriverProfile, InMemoryDirectory, Lookup, MerchantProfile, WarehouseProfile,
};
use crate::error::LifecycleError;
use crate::journal::{Change, ChangeJournal};
use crate::ledger::{CapacityLedger, UtilizationBand, WarehouseAccount};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewWarehouse {
    pub name: String,
    #[serde(default)]
    pub city: Option<String>,
    pub capacity: u32,
    /// Defaults to `true` when absent.
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Warehouse edit. Load is not editable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WarehousePatch {
    pub name: Option<String>,
    pub city: Option<String>,
    pub capacity: Option<u32>,
    pub is_active: Option<bool>,
}

/// A warehouse with its live load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Warehouse {
    #[serde(flatten)]
    pub profile: WarehouseProfile,
    #[serde(flatten)]
    pub account: WarehouseAccount,
    /// Load percentage, rounded.
    pub utilization: u32,
    pub band: UtilizationBand,
}

impl Warehouse {
    fn compose(profile: WarehouseProfile, account: WarehouseAccount) -> Self {
        Self {
            profile,
            utilization: account.utilization(),
            band: account.band(),
            account,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewDriver {
    pub name: String,
    #[serde(default)]
    pub phone: Option<PhoneNumber>,
    /// Defaults to `true` when absent.
    #[serde(default)]
    pub is_active: Option<bool>,
    /// Initial availability; defaults to `true` when absent.
    #[serde(default)]
    pub is_available: Option<bool>,
}

/// Driver edit. Availability is not editable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DriverPatch {
    pub name: Option<String>,
    pub phone: Option<PhoneNumber>,
    pub is_active: Option<bool>,
}

/// A driver with live dispatch state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    #[serde(flatten)]
    pub profile: DriverProfile,
    #[serde(flatten)]
    pub slot: DriverSlot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewMerchant {
    pub name: String,
    #[serde(default)]
    pub phone: Option<PhoneNumber>,
}

fn require_name(name: &str) -> Result<String, ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::missing("name"));
    }
    Ok(name.to_string())
}

pub struct Registry {
    directory: Arc<InMemoryDirectory>,
    ledger: Arc<CapacityLedger>,
    roster: Arc<DriverRoster>,
    journal: Option<Arc<dyn ChangeJournal>>,
}

impl Registry {
    pub fn new(
        directory: Arc<InMemoryDirectory>,
        ledger: Arc<CapacityLedger>,
        roster: Arc<DriverRoster>,
        journal: Option<Arc<dyn ChangeJournal>>,
    ) -> Self {
        Self {
            directory,
            ledger,
            roster,
            journal,
        }
    }

    fn record(&self, change: Change) {
        if let Some(journal) = &self.journal {
            journal.record(change);
        }
    }

    // ── warehouses ──────────────────────────────────────────────────────

    pub fn register_warehouse(&self, new: NewWarehouse) -> Result<Warehouse, LifecycleError> {
        let name = require_name(&new.name)?;
        let id = WarehouseId::new();
        self.ledger.open_account(id, new.capacity)?;
        let handle = self
            .ledger
            .handle(id)
            .ok_or_else(|| LifecycleError::invariant(format!("account {id} vanished after opening")))?;
        let account = handle.lock();
        let profile = WarehouseProfile {
            id,
            name,
            city: new.city,
            is_active: new.is_active.unwrap_or(true),
            created_at: Utc::now(),
        };
        self.directory.put_warehouse(profile.clone());
        self.record(Change::Warehouse {
            profile: profile.clone(),
            account: *account,
        });
        tracing::info!(warehouse_id = %id, capacity = account.capacity, "warehouse registered");
        Ok(Warehouse::compose(profile, *account))
    }

    pub fn update_warehouse(&self, id: WarehouseId, patch: WarehousePatch) -> Result<Warehouse, LifecycleError> {
        let name = patch.name.as_deref().map(require_name).transpose()?;
        let handle = self
            .ledger
            .handle(id)
            .ok_or_else(|| LifecycleError::not_found("warehouse", id))?;
        let mut account = handle.lock();
        if let Some(capacity) = patch.capacity {
            account.set_capacity(id, capacity)?;
        }
        let profile = self
            .directory
            .update_warehouse(id, |p| {
                if let Some(name) = name {
                    p.name = name;
                }
                if let Some(city) = patch.city {
                    p.city = Some(city);
                }
                if let Some(active) = patch.is_active {
                    p.is_active = active;
                }
            })
            .ok_or_else(|| LifecycleError::invariant(format!("warehouse {id} has an account but no profile")))?;
        self.record(Change::Warehouse {
            profile: profile.clone(),
            account: *account,
        });
        tracing::info!(warehouse_id = %id, is_active = profile.is_active, capacity = account.capacity, "warehouse updated");
        Ok(Warehouse::compose(profile, *account))
    }

    pub fn warehouse(&self, id: WarehouseId) -> Result<Warehouse, LifecycleError> {
        let profile = self
            .directory
            .resolve_warehouse(id)
            .ok_or_else(|| LifecycleError::not_found("warehouse", id))?;
        let account = self
            .ledger
            .snapshot(id)
            .ok_or_else(|| LifecycleError::not_found("warehouse", id))?;
        Ok(Warehouse::compose(profile, account))
    }

    pub fn warehouses(&self) -> Vec<Warehouse> {
        self.directory
            .warehouses()
            .into_iter()
            .filter_map(|p| {
                let account = self.ledger.snapshot(p.id)?;
                Some(Warehouse::compose(p, account))
            })
            .collect()
    }

    // ── drivers ─────────────────────────────────────────────────────────

    pub fn register_driver(&self, new: NewDriver) -> Result<Driver, LifecycleError> {
        let name = require_name(&new.name)?;
        let id = DriverId::new();
        self.roster.enroll(id, new.is_available.unwrap_or(true))?;
        let handle = self
            .roster
            .handle(id)
            .ok_or_else(|| LifecycleError::invariant(format!("slot {id} vanished after enrolment")))?;
        let slot = handle.lock();
        let profile = DriverProfile {
            id,
            name,
            phone: new.phone,
            is_active: new.is_active.unwrap_or(true),
            created_at: Utc::now(),
        };
        self.directory.put_driver(profile.clone());
        self.record(Change::Driver {
            profile: profile.clone(),
            slot: *slot,
        });
        tracing::info!(driver_id = %id, "driver registered");
        Ok(Driver {
            profile,
            slot: *slot,
        })
    }

    pub fn update_driver(&self, id: DriverId, patch: DriverPatch) -> Result<Driver, LifecycleError> {
        let name = patch.name.as_deref().map(require_name).transpose()?;
        let handle = self
            .roster
            .handle(id)
            .ok_or_else(|| LifecycleError::not_found("driver", id))?;
        let slot = handle.lock();
        let profile = self
            .directory
            .update_driver(id, |p| {
                if let Some(name) = name {
                    p.name = name;
                }
                if let Some(phone) = patch.phone {
                    p.phone = Some(phone);
                }
                if let Some(active) = patch.is_active {
                    p.is_active = active;
                }
            })
            .ok_or_else(|| LifecycleError::invariant(format!("driver {id} has a slot but no profile")))?;
        self.record(Change::Driver {
            profile: profile.clone(),
            slot: *slot,
        });
        tracing::info!(driver_id = %id, is_active = profile.is_active, "driver updated");
        Ok(Driver {
            profile,
            slot: *slot,
        })
    }

    pub fn driver(&self, id: DriverId) -> Result<Driver, LifecycleError> {
        let profile = self
            .directory
            .resolve_driver(id)
            .ok_or_else(|| LifecycleError::not_found("driver", id))?;
        let slot = self
            .roster
            .snapshot(id)
            .ok_or_else(|| LifecycleError::not_found("driver", id))?;
        Ok(Driver { profile, slot })
    }

    pub fn drivers(&self) -> Vec<Driver> {
        self.directory
            .drivers()
            .into_iter()
            .filter_map(|profile| {
                let slot = self.roster.snapshot(profile.id)?;
                Some(Driver { profile, slot })
            })
            .collect()
    }

    // ── merchants ───────────────────────────────────────────────────────

    pub fn register_merchant(&self, new: NewMerchant) -> Result<MerchantProfile, LifecycleError> {
        let profile = MerchantProfile {
            id: MerchantId::new(),
            name: require_name(&new.name)?,
            phone: new.phone,
            created_at: Utc::now(),
        };
        self.directory.put_merchant(profile.clone());
        self.record(Change::Merchant {
            profile: profile.clone(),
        });
        tracing::info!(merchant_id = %profile.id, "merchant registered");
        Ok(profile)
    }

    pub fn merchant(&self, id: MerchantId) -> Result<MerchantProfile, LifecycleError> {
        self.directory
            .resolve_merchant(id)
            .ok_or_else(|| LifecycleError::not_found("merchant", id))
    }

    pub fn merchants(&self) -> Vec<MerchantProfile> {
        self.directory.merchants()
    }

    // ── hydration ───────────────────────────────────────────────────────

    pub fn restore_warehouse(&self, profile: WarehouseProfile, account: WarehouseAccount) -> Result<(), LifecycleError> {
        self.ledger.restore_account(profile.id, account)?;
        self.directory.put_warehouse(profile);
        Ok(())
    }

    pub fn restore_driver(&self, profile: DriverProfile, slot: DriverSlot) -> Result<(), LifecycleError> {
        self.roster.restore(profile.id, slot)?;
        self.directory.put_driver(profile);
        Ok(())
    }

    pub fn restore_merchant(&self, profile: MerchantProfile) {
        self.directory.put_merchant(profile);
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("directory", &self.directory)
            .finish_non_exhaustive()
    }
}
