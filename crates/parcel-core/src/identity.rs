//! # Identity Newtypes
//!
//! UUID-backed identifiers for the four reference kinds the lifecycle core
//! deals with. Each is a distinct type, always valid by construction, and
//! serializes as a bare UUID string.
//!
//! Identifiers are `Ord` so that multi-entity operations can acquire
//! per-entity locks in a single global order.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ValidationError;

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $ty:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
        )]
        #[serde(transparent)]
        pub struct $ty(Uuid);

        impl $ty {
            /// Create a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Access the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// The identifier kind, used in error messages.
            pub const KIND: &'static str = $kind;
        }

        impl Default for $ty {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $ty {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|_| ValidationError::InvalidIdentifier {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }

        impl From<Uuid> for $ty {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

uuid_identifier!(
    /// Opaque identifier of a shipment.
    ShipmentId,
    "shipment"
);

uuid_identifier!(
    /// Identifier of a warehouse whose storage capacity is tracked by the ledger.
    WarehouseId,
    "warehouse"
);

uuid_identifier!(
    /// Identifier of a delivery driver.
    DriverId,
    "driver"
);

uuid_identifier!(
    /// Identifier of the merchant that owns a shipment. Immutable on the shipment.
    MerchantId,
    "merchant"
);
