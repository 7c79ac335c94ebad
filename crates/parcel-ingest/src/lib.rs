//! # parcel-ingest: Bulk Shipment Upload
//!
//! Turns an uploaded CSV file into shipments, one independent creation per
//! row, and reports what happened to every row.
//!
//! - [`template`]: the column schema, in validation order, and the
//!   downloadable template derived from it.
//! - [`reader`]: CSV bytes to rows keyed by schema column.
//! - [`validate`]: ordered structural validation of one row.
//! - [`pipeline`]: [`BulkIngestionPipeline`] and its [`UploadResult`].
//!
//! File-level problems reject the upload with an [`IngestError`]. Row-level
//! problems never do.

pub mod error;
pub mod pipeline;
pub mod reader;
pub mod template;
pub mod validate;

pub use error::{IngestError, RowFailure};
pub use pipeline::{check, BulkIngestionPipeline, CheckReport, RowError, RowWarning, UploadResult};
pub use reader::{read_upload, RawRow, Upload};
pub use template::{template_csv, Column, TEMPLATE_COLUMNS, TEMPLATE_FILE_NAME};
pub use validate::parse_row;
