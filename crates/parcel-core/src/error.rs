//! # Validation Errors
//!
//! Field-level validation failures raised by the validated constructors in
//! this crate. Higher layers wrap these in their own error enums.

use thiserror::Error;

/// A value failed format or range validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field was absent or blank.
    #[error("{field} is required")]
    MissingField {
        /// Field name as it appears in the request or upload column.
        field: String,
    },

    /// Phone number does not match the accepted format.
    #[error("invalid phone number '{0}': expected 7-15 digits with optional leading '+'")]
    InvalidPhone(String),

    /// A numeric field could not be parsed.
    #[error("{field} must be a number, got '{value}'")]
    NotANumber {
        /// Field name.
        field: String,
        /// Offending raw value.
        value: String,
    },

    /// A numeric field was negative.
    #[error("{field} must not be negative")]
    Negative {
        /// Field name.
        field: String,
    },

    /// A numeric field that must be strictly positive was zero.
    #[error("{field} must be greater than zero")]
    NotPositive {
        /// Field name.
        field: String,
    },

    /// Tracking number format violation.
    #[error("invalid tracking number '{0}'")]
    InvalidTrackingNumber(String),

    /// Barcode format violation.
    #[error("invalid barcode '{0}'")]
    InvalidBarcode(String),

    /// An identifier could not be parsed.
    #[error("invalid {kind} identifier '{value}'")]
    InvalidIdentifier {
        /// Identifier kind (shipment, warehouse, driver, merchant).
        kind: &'static str,
        /// Offending raw value.
        value: String,
    },

    /// A value exceeded its maximum length.
    #[error("{field} must not exceed {max} characters")]
    TooLong {
        /// Field name.
        field: String,
        /// Maximum length.
        max: usize,
    },

    /// An uploaded cell was not UTF-8 text.
    #[error("{field} is not valid UTF-8 text")]
    InvalidEncoding {
        /// Column name.
        field: String,
    },
}

impl ValidationError {
    /// Shorthand for [`ValidationError::MissingField`].
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }
}
