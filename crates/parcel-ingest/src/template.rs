//! # Upload Template
//!
//! The column schema of a bulk shipment upload. [`TEMPLATE_COLUMNS`] is
//! listed in the order rows are validated: required columns first, in the
//! order their presence is checked, then optional columns. The downloadable
//! template ([`template_csv`]) and the reader's header mapping are both
//! derived from this one table, so they cannot drift apart.

/// One column of the upload schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    /// Header name as written in the template.
    pub name: &'static str,
    pub required: bool,
}

const fn required(name: &'static str) -> Column {
    Column {
        name,
        required: true,
    }
}

const fn optional(name: &'static str) -> Column {
    Column {
        name,
        required: false,
    }
}

pub const CUSTOMER_NAME: &str = "customerName";
pub const CUSTOMER_PHONE: &str = "customerPhone";
pub const CUSTOMER_ADDRESS: &str = "customerAddress";
pub const CITY: &str = "city";
pub const DESCRIPTION: &str = "description";
pub const MERCHANT_ID: &str = "merchantId";
pub const DECLARED_VALUE: &str = "declaredValue";
pub const SHIPPING_COST: &str = "shippingCost";
pub const ZONE: &str = "zone";
pub const WEIGHT: &str = "weight";
pub const DIMENSIONS: &str = "dimensions";
pub const COD_AMOUNT: &str = "codAmount";
pub const WAREHOUSE_ID: &str = "warehouseId";
pub const DRIVER_ID: &str = "driverId";
pub const NOTES: &str = "notes";
pub const TRACKING_NUMBER: &str = "trackingNumber";
pub const BARCODE: &str = "barcode";

/// Upload columns in validation order.
pub const TEMPLATE_COLUMNS: [Column; 17] = [
    required(CUSTOMER_NAME),
    required(CUSTOMER_PHONE),
    required(CUSTOMER_ADDRESS),
    required(CITY),
    required(DESCRIPTION),
    required(MERCHANT_ID),
    required(DECLARED_VALUE),
    required(SHIPPING_COST),
    optional(ZONE),
    optional(WEIGHT),
    optional(DIMENSIONS),
    optional(COD_AMOUNT),
    optional(WAREHOUSE_ID),
    optional(DRIVER_ID),
    optional(NOTES),
    optional(TRACKING_NUMBER),
    optional(BARCODE),
];

/// Suggested download name for the template.
pub const TEMPLATE_FILE_NAME: &str = "shipments_template.csv";

/// The template file: the header row and nothing else.
pub fn template_csv() -> String {
    let mut out = TEMPLATE_COLUMNS
        .iter()
        .map(|c| c.name)
        .collect::<Vec<_>>()
        .join(",");
    out.push('\n');
    out
}

pub fn required_columns() -> impl Iterator<Item = &'static str> {
    TEMPLATE_COLUMNS.iter().filter(|c| c.required).map(|c| c.name)
}

/// Find the schema column for a header cell. Matching ignores case, a
/// leading byte-order mark, and separators (`customer_name`,
/// `Customer Name` and `customerName` are the same column).
pub fn lookup(header: &str) -> Option<&'static Column> {
    let key = normalize(header);
    if key.is_empty() {
        return None;
    }
    TEMPLATE_COLUMNS.iter().find(|c| normalize(c.name) == key)
}

fn normalize(header: &str) -> String {
    header
        .trim_start_matches('\u{feff}')
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
