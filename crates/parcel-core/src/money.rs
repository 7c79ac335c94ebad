//! # Monetary Amounts
//!
//! Declared value, shipping cost and cash-on-delivery are carried as
//! [`Amount`]: non-negative integer minor units (two decimal places).
//! Parsing accepts the textual forms that show up in spreadsheets and JSON
//! bodies (`"150"`, `"150.5"`, `150.25`) and rejects anything else.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ValidationError;

/// A non-negative amount in minor units (cents).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(try_from = "RawAmount", into = "String")]
#[schema(value_type = String, example = "150.00")]
pub struct Amount(i64);

impl Amount {
    /// Zero.
    pub const ZERO: Amount = Amount(0);

    /// Build from minor units. Negative values are rejected.
    pub fn from_minor(minor: i64, field: &str) -> Result<Self, ValidationError> {
        if minor < 0 {
            return Err(ValidationError::Negative {
                field: field.to_string(),
            });
        }
        Ok(Self(minor))
    }

    /// Parse a decimal string for the named field.
    pub fn parse(field: &str, raw: &str) -> Result<Self, ValidationError> {
        let minor = parse_minor_units(raw).ok_or_else(|| ValidationError::NotANumber {
            field: field.to_string(),
            value: raw.to_string(),
        })?;
        Self::from_minor(minor, field)
    }

    /// Minor units.
    pub fn minor_units(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl From<Amount> for String {
    fn from(value: Amount) -> Self {
        value.to_string()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Number(f64),
    Text(String),
}

impl TryFrom<RawAmount> for Amount {
    type Error = ValidationError;

    fn try_from(raw: RawAmount) -> Result<Self, Self::Error> {
        match raw {
            RawAmount::Number(n) => {
                if !n.is_finite() {
                    return Err(ValidationError::NotANumber {
                        field: "amount".into(),
                        value: n.to_string(),
                    });
                }
                Amount::parse("amount", &format!("{n:.2}"))
            }
            RawAmount::Text(s) => Amount::parse("amount", &s),
        }
    }
}

/// Parse a decimal string into minor units, two decimal places.
///
/// `"10"` → 1000, `"10.5"` → 1050, `"10.567"` → 1056 (extra digits truncated).
/// Returns `None` for blanks, garbage and overflow.
fn parse_minor_units(s: &str) -> Option<i64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let (negative, unsigned) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };

    let (whole, frac) = match unsigned.split_once('.') {
        Some((w, f)) => (w, f),
        None => (unsigned, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let frac_minor: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().ok()? * 10,
        _ => frac[..2].parse().ok()?,
    };

    let magnitude = whole.checked_mul(100)?.checked_add(frac_minor)?;
    Some(if negative { -magnitude } else { magnitude })
}
