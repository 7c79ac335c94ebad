//! # Capacity Ledger
//!
//! Sole owner of every warehouse's `current_load`. Each warehouse has its own
//! account behind its own mutex, so reservations against one warehouse
//! serialize while different warehouses proceed independently. There is no
//! ledger-wide lock.
//!
//! Invariant: `0 <= current_load <= capacity` for every account, at every
//! observable point.
//!
//! Multi-entity changesets lock accounts through [`CapacityLedger::handle`]
//! and mutate them with the [`WarehouseAccount`] methods while holding the
//! guard; the standalone [`CapacityLedger::reserve`] and
//! [`CapacityLedger::release`] take the same lock for a single operation.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use parcel_core::{ValidationError, WarehouseId};

use crate::error::LifecycleError;

/// Capacity and load of one warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WarehouseAccount {
    pub capacity: u32,
    pub current_load: u32,
}

impl WarehouseAccount {
    /// Rounded load percentage, `round(current_load / capacity * 100)`.
    pub fn utilization(&self) -> u32 {
        utilization_percent(self.current_load, self.capacity)
    }

    pub fn band(&self) -> UtilizationBand {
        UtilizationBand::classify(self.utilization())
    }

    pub fn headroom(&self) -> u32 {
        self.capacity.saturating_sub(self.current_load)
    }

    /// Add `units` to the load, or fail without change if that would exceed
    /// capacity. Returns the new utilization percentage.
    pub fn reserve(&mut self, id: WarehouseId, units: u32) -> Result<u32, LifecycleError> {
        match self.current_load.checked_add(units) {
            Some(next) if next <= self.capacity => {
                self.current_load = next;
                Ok(self.utilization())
            }
            _ => Err(LifecycleError::CapacityExceeded {
                warehouse_id: id,
                capacity: self.capacity,
                current_load: self.current_load,
                requested: units,
            }),
        }
    }

    /// Change capacity without touching the load.
    pub fn set_capacity(&mut self, id: WarehouseId, capacity: u32) -> Result<(), LifecycleError> {
        if capacity == 0 {
            return Err(ValidationError::NotPositive {
                field: "capacity".into(),
            }
            .into());
        }
        if capacity < self.current_load {
            return Err(LifecycleError::CapacityBelowLoad {
                warehouse_id: id,
                capacity,
                current_load: self.current_load,
            });
        }
        self.capacity = capacity;
        Ok(())
    }

    /// Remove `units` from the load. Going below zero means the bookkeeping
    /// has diverged; the account is left untouched and the defect reported.
    pub fn release(&mut self, id: WarehouseId, units: u32) -> Result<u32, LifecycleError> {
        match self.current_load.checked_sub(units) {
            Some(next) => {
                self.current_load = next;
                Ok(self.utilization())
            }
            None => Err(LifecycleError::invariant(format!(
                "release of {units} from warehouse {id} with load {}",
                self.current_load
            ))),
        }
    }
}

/// Advisory load classification. Not a cap; the cap is `capacity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UtilizationBand {
    /// Below 50%.
    Low,
    /// 50% to 74%.
    HasSpace,
    /// 75% to 89%.
    AlmostFull,
    /// 90% and above.
    Full,
}

impl UtilizationBand {
    pub fn classify(percent: u32) -> Self {
        match percent {
            0..=49 => Self::Low,
            50..=74 => Self::HasSpace,
            75..=89 => Self::AlmostFull,
            _ => Self::Full,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::HasSpace => "HAS_SPACE",
            Self::AlmostFull => "ALMOST_FULL",
            Self::Full => "FULL",
        }
    }
}

/// `round(load / capacity * 100)` in integer arithmetic, half rounding up.
pub fn utilization_percent(load: u32, capacity: u32) -> u32 {
    if capacity == 0 {
        return 0;
    }
    let load = u64::from(load);
    let capacity = u64::from(capacity);
    ((load * 100 + capacity / 2) / capacity) as u32
}

/// Shared handle to one locked account.
pub type AccountHandle = Arc<Mutex<WarehouseAccount>>;

/// All warehouse accounts.
#[derive(Default)]
pub struct CapacityLedger {
    accounts: DashMap<WarehouseId, AccountHandle>,
}

impl CapacityLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an account for a new warehouse with zero load.
    pub fn open_account(&self, id: WarehouseId, capacity: u32) -> Result<WarehouseAccount, LifecycleError> {
        self.restore_account(
            id,
            WarehouseAccount {
                capacity,
                current_load: 0,
            },
        )
    }

    /// Insert an account with an existing load (hydration from storage).
    pub fn restore_account(
        &self,
        id: WarehouseId,
        account: WarehouseAccount,
    ) -> Result<WarehouseAccount, LifecycleError> {
        if account.capacity == 0 {
            return Err(ValidationError::NotPositive {
                field: "capacity".into(),
            }
            .into());
        }
        if account.current_load > account.capacity {
            return Err(LifecycleError::CapacityBelowLoad {
                warehouse_id: id,
                capacity: account.capacity,
                current_load: account.current_load,
            });
        }
        match self.accounts.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(LifecycleError::Duplicate {
                field: "warehouseId",
                value: id.to_string(),
            }),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(account)));
                Ok(account)
            }
        }
    }

    /// The lockable account of `id`.
    pub fn handle(&self, id: WarehouseId) -> Option<AccountHandle> {
        self.accounts.get(&id).map(|a| Arc::clone(a.value()))
    }

    fn require(&self, id: WarehouseId) -> Result<AccountHandle, LifecycleError> {
        self.handle(id)
            .ok_or_else(|| LifecycleError::not_found("warehouse", id))
    }

    /// Reserve `units` of load. Returns the new utilization percentage.
    pub fn reserve(&self, id: WarehouseId, units: u32) -> Result<u32, LifecycleError> {
        let account = self.require(id)?;
        let mut guard = account.lock();
        let result = guard.reserve(id, units);
        if let Err(err) = &result {
            tracing::debug!(warehouse_id = %id, units, error = %err, "reservation refused");
        }
        result
    }

    /// Release `units` of load. Returns the new utilization percentage.
    pub fn release(&self, id: WarehouseId, units: u32) -> Result<u32, LifecycleError> {
        let account = self.require(id)?;
        let mut guard = account.lock();
        guard.release(id, units)
    }

    /// Change capacity. Rejected if it would fall below the current load.
    pub fn set_capacity(&self, id: WarehouseId, capacity: u32) -> Result<WarehouseAccount, LifecycleError> {
        let account = self.require(id)?;
        let mut guard = account.lock();
        guard.set_capacity(id, capacity)?;
        Ok(*guard)
    }

    /// Current state of one account.
    pub fn snapshot(&self, id: WarehouseId) -> Option<WarehouseAccount> {
        self.handle(id).map(|a| *a.lock())
    }

    /// Current state of every account. Each account is read under its own
    /// lock; the set as a whole is not a single point-in-time view.
    pub fn snapshot_all(&self) -> Vec<(WarehouseId, WarehouseAccount)> {
        let handles: Vec<(WarehouseId, AccountHandle)> = self
            .accounts
            .iter()
            .map(|e| (*e.key(), Arc::clone(e.value())))
            .collect();
        handles.into_iter().map(|(id, a)| (id, *a.lock())).collect()
    }

    pub fn utilization(&self, id: WarehouseId) -> Option<(u32, UtilizationBand)> {
        self.snapshot(id).map(|a| (a.utilization(), a.band()))
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl std::fmt::Debug for CapacityLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapacityLedger")
            .field("accounts", &self.accounts.len())
            .finish()
    }
}
