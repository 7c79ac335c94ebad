//! # Shipment Status Graph
//!
//! ```text
//! NEW ──▶ IN_RECEIPT ──▶ IN_WAREHOUSE ──▶ WITH_DRIVER ──▶ DELIVERED
//!  │                         ▲                │  ▲
//!  └─────────────────────────┘                ▼  │
//!                                       DELIVERY_FAILED ──▶ RETURNED
//!                                                 └───────▶ PARTIAL_RETURNED
//! ```
//!
//! `NEW` is the only initial status. `DELIVERED`, `RETURNED` and
//! `PARTIAL_RETURNED` are terminal. A transition to the current status is
//! not in the graph, so no-op updates are rejected like any other illegal
//! edge.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Lifecycle status of a shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipmentStatus {
    /// Created, not yet received anywhere. Initial.
    New,
    /// Being received at a warehouse dock.
    InReceipt,
    /// Stored in a warehouse, occupying one unit of its capacity.
    InWarehouse,
    /// Out for delivery with a driver.
    WithDriver,
    /// Delivered. Terminal.
    Delivered,
    /// Delivery attempt failed; still with the driver.
    DeliveryFailed,
    /// Returned to the merchant. Terminal.
    Returned,
    /// Partially returned to the merchant. Terminal.
    PartialReturned,
}

/// A status name outside the fixed set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown shipment status '{0}'")]
pub struct UnknownStatus(pub String);

impl ShipmentStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [ShipmentStatus; 8] = [
        Self::New,
        Self::InReceipt,
        Self::InWarehouse,
        Self::WithDriver,
        Self::Delivered,
        Self::DeliveryFailed,
        Self::Returned,
        Self::PartialReturned,
    ];

    /// The canonical wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::InReceipt => "IN_RECEIPT",
            Self::InWarehouse => "IN_WAREHOUSE",
            Self::WithDriver => "WITH_DRIVER",
            Self::Delivered => "DELIVERED",
            Self::DeliveryFailed => "DELIVERY_FAILED",
            Self::Returned => "RETURNED",
            Self::PartialReturned => "PARTIAL_RETURNED",
        }
    }

    /// Parse a canonical wire name. Case-sensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == name)
    }

    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Returned | Self::PartialReturned)
    }

    /// The set of statuses reachable in one step.
    pub fn valid_transitions(&self) -> &'static [ShipmentStatus] {
        match self {
            Self::New => &[Self::InReceipt, Self::InWarehouse],
            Self::InReceipt => &[Self::InWarehouse],
            Self::InWarehouse => &[Self::WithDriver],
            Self::WithDriver => &[Self::Delivered, Self::DeliveryFailed],
            Self::DeliveryFailed => &[Self::WithDriver, Self::Returned, Self::PartialReturned],
            Self::Delivered | Self::Returned | Self::PartialReturned => &[],
        }
    }

    pub fn can_transition_to(&self, target: ShipmentStatus) -> bool {
        self.valid_transitions().contains(&target)
    }

    /// Statuses in which the shipment may be (re)assigned to a warehouse.
    ///
    /// Once a shipment has left the warehouse its origin is fixed.
    pub fn accepts_warehouse_assignment(&self) -> bool {
        matches!(self, Self::New | Self::InReceipt | Self::InWarehouse)
    }

    /// Statuses in which the shipment holds its driver.
    pub fn holds_driver(&self) -> bool {
        matches!(self, Self::WithDriver | Self::DeliveryFailed)
    }
}

impl std::fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ShipmentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s.trim()).ok_or_else(|| UnknownStatus(s.to_string()))
    }
}
