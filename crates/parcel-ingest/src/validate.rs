//! # Row Validation
//!
//! Structural validation of one [`RawRow`] into a [`NewShipment`]. Checks
//! run in a fixed order and the first failure wins:
//!
//! 1. every cell decoded as UTF-8 text
//! 2. required columns present, in template order
//! 3. phone number format
//! 4. numeric fields parse and are not negative
//! 5. identifier and reference formats
//!
//! Reference resolution (merchant exists, warehouse/driver exist and are
//! active) needs the directory and happens in the engine's creation path.

use parcel_core::{
    Amount, Barcode, DriverId, MerchantId, PhoneNumber, TrackingNumber, ValidationError,
    WarehouseId,
};
use parcel_state::{NewShipment, ShipmentDetails};

use crate::reader::RawRow;
use crate::template::{self, *};

pub fn parse_row(row: &RawRow) -> Result<NewShipment, ValidationError> {
    if let Some(column) = row.undecodable() {
        return Err(ValidationError::InvalidEncoding {
            field: column.to_string(),
        });
    }
    for column in template::required_columns() {
        if row.get(column).is_none() {
            return Err(ValidationError::missing(column));
        }
    }
    let required = |column: &str| row.get(column).ok_or_else(|| ValidationError::missing(column));

    let customer_phone = PhoneNumber::parse(required(CUSTOMER_PHONE)?)?;

    let declared_value = Amount::parse(DECLARED_VALUE, required(DECLARED_VALUE)?)?;
    let shipping_cost = Amount::parse(SHIPPING_COST, required(SHIPPING_COST)?)?;
    let cod_amount = row
        .get(COD_AMOUNT)
        .map(|raw| Amount::parse(COD_AMOUNT, raw))
        .transpose()?
        .unwrap_or(Amount::ZERO);
    let weight = row.get(WEIGHT).map(parse_weight).transpose()?;

    let merchant_id: MerchantId = required(MERCHANT_ID)?.parse()?;
    let warehouse_id = row
        .get(WAREHOUSE_ID)
        .map(str::parse::<WarehouseId>)
        .transpose()?;
    let driver_id = row.get(DRIVER_ID).map(str::parse::<DriverId>).transpose()?;
    let tracking_number = row.get(TRACKING_NUMBER).map(TrackingNumber::new).transpose()?;
    let barcode = row.get(BARCODE).map(Barcode::new).transpose()?;

    let details = ShipmentDetails {
        customer_name: required(CUSTOMER_NAME)?.to_string(),
        customer_phone,
        customer_address: required(CUSTOMER_ADDRESS)?.to_string(),
        city: required(CITY)?.to_string(),
        zone: row.get(ZONE).map(str::to_string),
        description: required(DESCRIPTION)?.to_string(),
        weight,
        dimensions: row.get(DIMENSIONS).map(str::to_string),
        declared_value,
        shipping_cost,
        cod_amount,
        notes: row.get(NOTES).map(str::to_string),
    };
    details.validate()?;

    Ok(NewShipment {
        merchant_id,
        details,
        tracking_number,
        barcode,
        warehouse_id,
        driver_id,
    })
}

fn parse_weight(raw: &str) -> Result<f64, ValidationError> {
    let weight: f64 = raw
        .parse()
        .ok()
        .filter(|w: &f64| w.is_finite())
        .ok_or_else(|| ValidationError::NotANumber {
            field: WEIGHT.to_string(),
            value: raw.to_string(),
        })?;
    if weight < 0.0 {
        return Err(ValidationError::Negative {
            field: WEIGHT.to_string(),
        });
    }
    Ok(weight)
}
