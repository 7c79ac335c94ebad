//! # parcel-cli: Command-Line Tools
//!
//! Provides the `parcel` command-line interface for preparing bulk uploads
//! before they reach the service.
//!
//! ## Subcommands
//!
//! - `parcel template`: Write the CSV upload template.
//! - `parcel check <FILE>`: Validate an upload file offline. Formats,
//!   required fields and ranges are checked; merchant, warehouse and driver
//!   references are not resolved.
//!
//! ```bash
//! parcel template --output shipments_template.csv
//! parcel check shipments.csv --json
//! ```

pub mod upload;
