//! # Bulk Ingestion Pipeline
//!
//! Row-independent, partial-success creation of shipments from an upload.
//! Every row is validated and committed on its own through
//! [`StatusTransitionEngine::create`]; a failing row becomes an entry in the
//! report and processing moves on. Nothing already committed is undone.
//!
//! Cancellation only stops the rows not yet started: the report is flagged
//! `cancelled` and counts them as `skipped`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;

use parcel_core::ShipmentId;
use parcel_lifecycle::StatusTransitionEngine;

use crate::error::{IngestError, RowFailure};
use crate::reader::{read_upload, RawRow, Upload};
use crate::validate::parse_row;

/// A row that produced no shipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RowError {
    pub row: usize,
    pub code: String,
    pub error: String,
}

/// A row whose shipment was created but whose requested assignment was not made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RowWarning {
    pub row: usize,
    pub shipment_id: ShipmentId,
    pub code: String,
    pub warning: String,
}

/// Aggregated outcome of one upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    /// Non-blank data rows in the upload.
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub errors: Vec<RowError>,
    pub created_ids: Vec<ShipmentId>,
    pub warnings: Vec<RowWarning>,
    pub cancelled: bool,
    /// Rows not attempted because of cancellation.
    pub skipped: usize,
}

impl UploadResult {
    fn reject(&mut self, row: usize, failure: &RowFailure) {
        tracing::debug!(row, code = failure.code(), error = %failure, "upload row rejected");
        self.failed += 1;
        self.errors.push(RowError {
            row,
            code: failure.code().to_string(),
            error: failure.to_string(),
        });
    }
}

/// Structural check of an upload without creating anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckReport {
    pub total: usize,
    pub valid: usize,
    pub errors: Vec<RowError>,
    pub ignored_columns: Vec<String>,
}

/// Validate every row of `bytes` without a directory: required columns,
/// formats and ranges only. References are not resolved.
pub fn check(bytes: &[u8]) -> Result<CheckReport, IngestError> {
    let upload = read_upload(bytes)?;
    let mut report = CheckReport {
        total: upload.rows.len(),
        ignored_columns: upload.ignored_columns,
        ..CheckReport::default()
    };
    for row in &upload.rows {
        match parse_row(row) {
            Ok(_) => report.valid += 1,
            Err(err) => report.errors.push(RowError {
                row: row.row,
                code: RowFailure::from(err.clone()).code().to_string(),
                error: err.to_string(),
            }),
        }
    }
    Ok(report)
}

pub struct BulkIngestionPipeline {
    engine: Arc<StatusTransitionEngine>,
}

impl BulkIngestionPipeline {
    pub fn new(engine: Arc<StatusTransitionEngine>) -> Self {
        Self { engine }
    }

    /// Read and process a whole upload.
    pub fn ingest(&self, bytes: &[u8]) -> Result<UploadResult, IngestError> {
        self.ingest_until(bytes, &CancellationToken::new())
    }

    /// As [`ingest`](Self::ingest), stopping before the next row once
    /// `cancel` fires.
    pub fn ingest_until(
        &self,
        bytes: &[u8],
        cancel: &CancellationToken,
    ) -> Result<UploadResult, IngestError> {
        let upload = read_upload(bytes)?;
        Ok(self.process(upload, cancel))
    }

    pub fn process(&self, upload: Upload, cancel: &CancellationToken) -> UploadResult {
        let mut result = UploadResult {
            total: upload.rows.len(),
            ..UploadResult::default()
        };
        tracing::info!(rows = result.total, blank_rows = upload.blank_rows, "bulk upload started");

        for (index, row) in upload.rows.iter().enumerate() {
            if cancel.is_cancelled() {
                result.cancelled = true;
                result.skipped = result.total - index;
                tracing::info!(row = row.row, skipped = result.skipped, "bulk upload cancelled");
                break;
            }
            self.process_row(row, &mut result);
        }

        tracing::info!(
            total = result.total,
            successful = result.successful,
            failed = result.failed,
            warnings = result.warnings.len(),
            cancelled = result.cancelled,
            "bulk upload finished"
        );
        result
    }

    fn process_row(&self, row: &RawRow, result: &mut UploadResult) {
        let new = match parse_row(row) {
            Ok(new) => new,
            Err(err) => return result.reject(row.row, &err.into()),
        };
        let created = match self.engine.create(new) {
            Ok(created) => created,
            Err(err) => return result.reject(row.row, &err.into()),
        };

        let shipment_id = created.shipment.id;
        for warning in created.warnings {
            tracing::debug!(row = row.row, %shipment_id, code = warning.code(), "upload row assignment skipped");
            result.warnings.push(RowWarning {
                row: row.row,
                shipment_id,
                code: warning.code().to_string(),
                warning: warning.to_string(),
            });
        }
        result.successful += 1;
        result.created_ids.push(shipment_id);
    }
}

impl std::fmt::Debug for BulkIngestionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkIngestionPipeline").finish_non_exhaustive()
    }
}
