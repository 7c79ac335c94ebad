//! # parcel-lifecycle: Capacity-Aware Shipment Lifecycle
//!
//! Components, leaf first:
//!
//! - [`CapacityLedger`]: warehouse capacity and load, atomic reserve/release.
//! - [`AssignmentCoordinator`]: warehouse placement and driver dispatch.
//! - [`StatusTransitionEngine`]: the status graph and its side effects.
//! - [`Registry`]: warehouse/driver/merchant registration over the
//!   [`Lookup`] capability.
//!
//! The audit trail lives in `parcel-state`; this crate is its only writer.
//!
//! ## Concurrency
//!
//! Locks are per entity: one per shipment, one per warehouse account, one
//! per driver slot. A changeset takes the shipment lock first, then
//! warehouses ascending, then drivers ascending. There is no global lock
//! over warehouses or drivers.

pub mod assignment;
mod changeset;
pub mod directory;
pub mod engine;
pub mod error;
pub mod journal;
pub mod ledger;
pub mod registry;
pub mod store;

pub use assignment::{AssignmentCoordinator, DriverRoster, DriverSlot};
pub use directory::{DriverProfile, InMemoryDirectory, Lookup, MerchantProfile, WarehouseProfile};
pub use engine::{
    Created, LifecycleParts, ShipmentDetail, StatusTransitionEngine, TransitionOutcome,
    TransitionRequest,
};
pub use error::LifecycleError;
pub use journal::{Change, ChangeJournal, MemoryJournal};
pub use ledger::{utilization_percent, CapacityLedger, UtilizationBand, WarehouseAccount};
pub use registry::{
    Driver, DriverPatch, NewDriver, NewMerchant, NewWarehouse, Registry, Warehouse, WarehousePatch,
};
