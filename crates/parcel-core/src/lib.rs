//! # parcel-core: Foundational Types
//!
//! The leaf of the workspace dependency DAG. Every other `parcel-*` crate
//! depends on this one; it depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `ShipmentId`, `WarehouseId`,
//!    `DriverId`, `MerchantId` are distinct types. A driver id cannot be
//!    passed where a warehouse id is expected.
//!
//! 2. **Validated reference strings.** `TrackingNumber` and `Barcode` are
//!    validated at construction and immutable once issued.
//!
//! 3. **Fixed-point money.** Declared value, shipping cost and cash-on-delivery
//!    amounts are `Amount` (integer minor units). No floats for money.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `parcel-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod contact;
pub mod error;
pub mod identity;
pub mod money;
pub mod reference;

pub use contact::PhoneNumber;
pub use error::ValidationError;
pub use identity::{DriverId, MerchantId, ShipmentId, WarehouseId};
pub use money::Amount;
pub use reference::{Barcode, TrackingNumber};
