//! # parcel-state: Shipment Lifecycle State
//!
//! The data half of the lifecycle core:
//!
//! - [`status`]: the fixed set of shipment statuses and the legal transition
//!   graph between them.
//! - [`shipment`]: the shipment record and its creation/edit inputs.
//! - [`audit`]: the append-only status history. One entry per accepted
//!   transition, including the creation entry. No update or delete.
//!
//! Nothing here enforces capacity or driver availability; that lives in
//! `parcel-lifecycle`, which is the only writer of these types.

pub mod audit;
pub mod shipment;
pub mod status;

pub use audit::{AuditTrail, StatusHistoryEntry};
pub use shipment::{NewShipment, Shipment, ShipmentDetails, ShipmentDetailsPatch};
pub use status::{ShipmentStatus, UnknownStatus};
