//! # Shipment Reference Strings
//!
//! [`TrackingNumber`] and [`Barcode`] are the two externally visible handles
//! of a shipment. Both are globally unique (enforced by the shipment store,
//! not here) and immutable once issued.
//!
//! Issued tracking numbers look like `TRK` followed by ten base-36 characters.
//! Issued barcodes are 13-digit numeric codes whose last digit is an EAN-13
//! check digit, so they print on standard label stock.
//!
//! Caller-supplied values (bulk uploads migrated from another system) are
//! accepted if they match the looser format rules below.

use rand::Rng;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ValidationError;

const TRACKING_PREFIX: &str = "TRK";
const TRACKING_BODY_LEN: usize = 10;
const BASE36: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Human-facing tracking number.
///
/// Accepted format: 6-40 characters, ASCII alphanumerics and `-`,
/// normalized to upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "String", into = "String")]
#[schema(value_type = String)]
pub struct TrackingNumber(String);

impl TrackingNumber {
    /// Validate and normalize a caller-supplied tracking number.
    pub fn new(raw: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = raw.into();
        let normalized = raw.trim().to_ascii_uppercase();
        let valid_len = (6..=40).contains(&normalized.len());
        let valid_chars = normalized
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !valid_len || !valid_chars {
            return Err(ValidationError::InvalidTrackingNumber(raw));
        }
        Ok(Self(normalized))
    }

    /// Issue a fresh random tracking number.
    ///
    /// Uniqueness is probabilistic here; the shipment store rejects the rare
    /// collision and the caller re-issues.
    pub fn issue() -> Self {
        let mut rng = rand::thread_rng();
        let body: String = (0..TRACKING_BODY_LEN)
            .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
            .collect();
        Self(format!("{TRACKING_PREFIX}{body}"))
    }

    /// The tracking number as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TrackingNumber {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TrackingNumber> for String {
    fn from(value: TrackingNumber) -> Self {
        value.0
    }
}

impl std::fmt::Display for TrackingNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Machine-scannable barcode value.
///
/// Accepted format: 8-32 ASCII alphanumerics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "String", into = "String")]
#[schema(value_type = String)]
pub struct Barcode(String);

impl Barcode {
    /// Validate a caller-supplied barcode.
    pub fn new(raw: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if !(8..=32).contains(&trimmed.len()) || !trimmed.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(ValidationError::InvalidBarcode(raw));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Issue a fresh 13-digit barcode with an EAN-13 check digit.
    pub fn issue() -> Self {
        let mut rng = rand::thread_rng();
        let digits: Vec<u8> = (0..12).map(|_| rng.gen_range(0..10u8)).collect();
        let check = ean13_check_digit(&digits);
        let mut code: String = digits.iter().map(|d| char::from(b'0' + d)).collect();
        code.push(char::from(b'0' + check));
        Self(code)
    }

    /// The barcode as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Barcode {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Barcode> for String {
    fn from(value: Barcode) -> Self {
        value.0
    }
}

impl std::fmt::Display for Barcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// EAN-13 check digit over the first twelve digits.
fn ean13_check_digit(digits: &[u8]) -> u8 {
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, d)| u32::from(*d) * if i % 2 == 0 { 1 } else { 3 })
        .sum();
    ((10 - (sum % 10)) % 10) as u8
}
