//! # Route Modules
//!
//! One module per resource. Shipment status, warehouse placement and
//! driver assignment are only reachable through the lifecycle engine.

pub mod bulk;
pub mod drivers;
pub mod merchants;
pub mod shipments;
pub mod warehouses;
