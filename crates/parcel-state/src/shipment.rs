//! # Shipment Record
//!
//! A shipment's identity (`id`, `tracking_number`, `barcode`, `merchant_id`)
//! never changes after creation. `status`, `warehouse_id`, `driver_id` and
//! `occupies_warehouse` are written only by the lifecycle engine. The
//! descriptive and financial fields in [`ShipmentDetails`] do not affect
//! lifecycle invariants and can be edited freely.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use parcel_core::{
    Amount, Barcode, DriverId, MerchantId, PhoneNumber, ShipmentId, TrackingNumber,
    ValidationError, WarehouseId,
};

use crate::status::ShipmentStatus;

const MAX_TEXT: usize = 500;

/// Customer, contents and money fields of a shipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentDetails {
    pub customer_name: String,
    pub customer_phone: PhoneNumber,
    pub customer_address: String,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    pub description: String,
    /// Kilograms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    /// Free-form, e.g. `30x20x15`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<String>,
    pub declared_value: Amount,
    pub shipping_cost: Amount,
    #[serde(default)]
    pub cod_amount: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ShipmentDetails {
    /// Check required text fields are non-blank and within length limits,
    /// and that the weight is a non-negative number.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("customerName", &self.customer_name),
            ("customerAddress", &self.customer_address),
            ("city", &self.city),
            ("description", &self.description),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::missing(field));
            }
            if value.len() > MAX_TEXT {
                return Err(ValidationError::TooLong {
                    field: field.to_string(),
                    max: MAX_TEXT,
                });
            }
        }
        if let Some(weight) = self.weight {
            if !weight.is_finite() {
                return Err(ValidationError::NotANumber {
                    field: "weight".into(),
                    value: weight.to_string(),
                });
            }
            if weight < 0.0 {
                return Err(ValidationError::Negative {
                    field: "weight".into(),
                });
            }
        }
        Ok(())
    }
}

/// Partial edit of [`ShipmentDetails`]. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentDetailsPatch {
    pub customer_name: Option<String>,
    pub customer_phone: Option<PhoneNumber>,
    pub customer_address: Option<String>,
    pub city: Option<String>,
    pub zone: Option<String>,
    pub description: Option<String>,
    pub weight: Option<f64>,
    pub dimensions: Option<String>,
    pub declared_value: Option<Amount>,
    pub shipping_cost: Option<Amount>,
    pub cod_amount: Option<Amount>,
    pub notes: Option<String>,
}

impl ShipmentDetailsPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply onto a copy of `details`, validating the result.
    pub fn apply(&self, details: &ShipmentDetails) -> Result<ShipmentDetails, ValidationError> {
        let mut next = details.clone();
        if let Some(v) = &self.customer_name {
            next.customer_name = v.clone();
        }
        if let Some(v) = &self.customer_phone {
            next.customer_phone = v.clone();
        }
        if let Some(v) = &self.customer_address {
            next.customer_address = v.clone();
        }
        if let Some(v) = &self.city {
            next.city = v.clone();
        }
        if let Some(v) = &self.zone {
            next.zone = Some(v.clone());
        }
        if let Some(v) = &self.description {
            next.description = v.clone();
        }
        if let Some(v) = self.weight {
            next.weight = Some(v);
        }
        if let Some(v) = &self.dimensions {
            next.dimensions = Some(v.clone());
        }
        if let Some(v) = self.declared_value {
            next.declared_value = v;
        }
        if let Some(v) = self.shipping_cost {
            next.shipping_cost = v;
        }
        if let Some(v) = self.cod_amount {
            next.cod_amount = v;
        }
        if let Some(v) = &self.notes {
            next.notes = Some(v.clone());
        }
        next.validate()?;
        Ok(next)
    }
}

/// Input to the single-create path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewShipment {
    pub merchant_id: MerchantId,
    #[serde(flatten)]
    pub details: ShipmentDetails,
    /// Caller-supplied tracking number; issued if absent.
    #[serde(default)]
    pub tracking_number: Option<TrackingNumber>,
    /// Caller-supplied barcode; issued if absent.
    #[serde(default)]
    pub barcode: Option<Barcode>,
    /// Warehouse to assign right after creation.
    #[serde(default)]
    pub warehouse_id: Option<WarehouseId>,
    /// Driver to assign right after creation.
    #[serde(default)]
    pub driver_id: Option<DriverId>,
}

/// A shipment as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Shipment {
    pub id: ShipmentId,
    pub tracking_number: TrackingNumber,
    pub barcode: Barcode,
    pub status: ShipmentStatus,
    pub merchant_id: MerchantId,
    pub warehouse_id: Option<WarehouseId>,
    /// Whether this shipment currently counts against `warehouse_id`'s load.
    /// Cleared when the shipment leaves the warehouse with a driver.
    pub occupies_warehouse: bool,
    pub driver_id: Option<DriverId>,
    #[serde(flatten)]
    pub details: ShipmentDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shipment {
    /// A fresh shipment in `NEW` with no assignments.
    pub fn new(
        id: ShipmentId,
        merchant_id: MerchantId,
        tracking_number: TrackingNumber,
        barcode: Barcode,
        details: ShipmentDetails,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            tracking_number,
            barcode,
            status: ShipmentStatus::New,
            merchant_id,
            warehouse_id: None,
            occupies_warehouse: false,
            driver_id: None,
            details,
            created_at: now,
            updated_at: now,
        }
    }

    /// The warehouse whose load this shipment is counted in, if any.
    pub fn held_warehouse(&self) -> Option<WarehouseId> {
        if self.occupies_warehouse {
            self.warehouse_id
        } else {
            None
        }
    }

    /// The driver this shipment currently keeps unavailable, if any.
    ///
    /// A terminal shipment keeps `driver_id` as a record but holds nobody.
    pub fn held_driver(&self) -> Option<DriverId> {
        if self.status.is_terminal() {
            None
        } else {
            self.driver_id
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
