//! # Reference Directory
//!
//! Warehouses, drivers and merchants are reference data from the core's
//! point of view: it needs to know that they exist and whether they are
//! active, nothing more. [`Lookup`] is that capability; the engine and the
//! bulk pipeline only ever see `Arc<dyn Lookup>`, so tests can substitute
//! a fake.
//!
//! `is_active` is an explicit boolean on every profile. A default of `true`
//! applies only when a profile is created without the field.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use parcel_core::{DriverId, MerchantId, PhoneNumber, WarehouseId};

/// Reference resolution used by the lifecycle core.
pub trait Lookup: Send + Sync {
    fn resolve_warehouse(&self, id: WarehouseId) -> Option<WarehouseProfile>;
    fn resolve_driver(&self, id: DriverId) -> Option<DriverProfile>;
    fn resolve_merchant(&self, id: MerchantId) -> Option<MerchantProfile>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WarehouseProfile {
    pub id: WarehouseId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DriverProfile {
    pub id: DriverId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<PhoneNumber>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MerchantProfile {
    pub id: MerchantId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<PhoneNumber>,
    pub created_at: DateTime<Utc>,
}

/// In-memory [`Lookup`] backed by one `DashMap` per reference kind.
#[derive(Default)]
pub struct InMemoryDirectory {
    warehouses: DashMap<WarehouseId, WarehouseProfile>,
    drivers: DashMap<DriverId, DriverProfile>,
    merchants: DashMap<MerchantId, MerchantProfile>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_warehouse(&self, profile: WarehouseProfile) {
        self.warehouses.insert(profile.id, profile);
    }

    pub fn put_driver(&self, profile: DriverProfile) {
        self.drivers.insert(profile.id, profile);
    }

    pub fn put_merchant(&self, profile: MerchantProfile) {
        self.merchants.insert(profile.id, profile);
    }

    /// Edit a warehouse profile in place. Returns the updated profile.
    pub fn update_warehouse(
        &self,
        id: WarehouseId,
        edit: impl FnOnce(&mut WarehouseProfile),
    ) -> Option<WarehouseProfile> {
        self.warehouses.get_mut(&id).map(|mut p| {
            edit(p.value_mut());
            p.value().clone()
        })
    }

    /// Edit a driver profile in place. Returns the updated profile.
    pub fn update_driver(
        &self,
        id: DriverId,
        edit: impl FnOnce(&mut DriverProfile),
    ) -> Option<DriverProfile> {
        self.drivers.get_mut(&id).map(|mut p| {
            edit(p.value_mut());
            p.value().clone()
        })
    }

    pub fn warehouses(&self) -> Vec<WarehouseProfile> {
        let mut all: Vec<_> = self.warehouses.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        all
    }

    pub fn drivers(&self) -> Vec<DriverProfile> {
        let mut all: Vec<_> = self.drivers.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        all
    }

    pub fn merchants(&self) -> Vec<MerchantProfile> {
        let mut all: Vec<_> = self.merchants.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        all
    }
}

impl Lookup for InMemoryDirectory {
    fn resolve_warehouse(&self, id: WarehouseId) -> Option<WarehouseProfile> {
        self.warehouses.get(&id).map(|p| p.value().clone())
    }

    fn resolve_driver(&self, id: DriverId) -> Option<DriverProfile> {
        self.drivers.get(&id).map(|p| p.value().clone())
    }

    fn resolve_merchant(&self, id: MerchantId) -> Option<MerchantProfile> {
        self.merchants.get(&id).map(|p| p.value().clone())
    }
}

impl std::fmt::Debug for InMemoryDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryDirectory")
            .field("warehouses", &self.warehouses.len())
            .field("drivers", &self.drivers.len())
            .field("merchants", &self.merchants.len())
            .finish()
    }
}
