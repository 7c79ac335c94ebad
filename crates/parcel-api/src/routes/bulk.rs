//! # Bulk Upload API
//!
//! Routes:
//! - POST /shipments/bulk: Multipart CSV upload, one creation per row
//! - GET  /shipments/template: Download the CSV template
//!
//! The pipeline is synchronous and runs on the blocking pool. Its
//! cancellation token is a child of the shutdown token and is also
//! cancelled when this handler's future is dropped (client disconnect), so
//! rows not yet started are skipped instead of created.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use parcel_ingest::{template_csv, UploadResult, TEMPLATE_FILE_NAME};

use crate::error::AppError;
use crate::state::AppState;

/// Multipart field that carries the file when the client names it.
const FILE_FIELD: &str = "file";

/// Build the bulk router. The upload route gets its own body limit.
pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/shipments/bulk",
            post(upload_shipments).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/shipments/template", get(download_template))
}

/// Pull the uploaded file out of the form: the `file` field, or else the
/// first field that carries a file name.
async fn read_file_field(multipart: &mut Multipart) -> Result<Bytes, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        let is_file = field.name() == Some(FILE_FIELD) || field.file_name().is_some();
        if is_file {
            return field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()));
        }
    }
    Err(AppError::BadRequest(format!(
        "multipart body has no '{FILE_FIELD}' field"
    )))
}

/// POST /shipments/bulk: Create shipments from an uploaded CSV file.
#[utoipa::path(
    post,
    path = "/shipments/bulk",
    request_body(content_type = "multipart/form-data", description = "CSV file in a `file` field"),
    responses(
        (status = 200, description = "Per-row outcome of the upload", body = UploadResult),
        (status = 400, description = "Missing file, header or required columns", body = crate::error::ErrorBody),
        (status = 413, description = "File exceeds the upload limit"),
    ),
    tag = "bulk"
)]
async fn upload_shipments(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResult>, AppError> {
    let mut multipart = multipart.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let bytes = read_file_field(&mut multipart).await?;

    let cancel = state.shutdown.child_token();
    let _disconnect = cancel.clone().drop_guard();
    let pipeline = Arc::clone(&state.pipeline);
    let result = tokio::task::spawn_blocking(move || pipeline.ingest_until(&bytes, &cancel))
        .await
        .map_err(|e| AppError::Internal(format!("bulk upload task failed: {e}")))??;

    tracing::info!(
        total = result.total,
        successful = result.successful,
        failed = result.failed,
        skipped = result.skipped,
        cancelled = result.cancelled,
        "bulk upload processed"
    );
    state.metrics.record_upload(&result);
    Ok(Json(result))
}

/// GET /shipments/template: The CSV template (header row only).
#[utoipa::path(
    get,
    path = "/shipments/template",
    responses(
        (status = 200, description = "CSV template", content_type = "text/csv", body = String),
    ),
    tag = "bulk"
)]
async fn download_template() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{TEMPLATE_FILE_NAME}\""),
            ),
        ],
        template_csv(),
    )
}
