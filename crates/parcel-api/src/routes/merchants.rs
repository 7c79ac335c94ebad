//! # Merchants API
//!
//! Routes:
//! - POST /merchants: Register a merchant
//! - GET  /merchants
//! - GET  /merchants/{id}

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use parcel_core::MerchantId;
use parcel_lifecycle::{MerchantProfile, NewMerchant};

use crate::error::AppError;
use crate::extractors::{extract_json, parse_id};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/merchants", get(list_merchants).post(create_merchant))
        .route("/merchants/{id}", get(get_merchant))
}

#[utoipa::path(
    post,
    path = "/merchants",
    request_body = NewMerchant,
    responses(
        (status = 201, description = "Merchant registered", body = MerchantProfile),
        (status = 400, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "merchants"
)]
async fn create_merchant(
    State(state): State<AppState>,
    body: Result<Json<NewMerchant>, JsonRejection>,
) -> Result<(StatusCode, Json<MerchantProfile>), AppError> {
    let new = extract_json(body)?;
    let merchant = state.registry.register_merchant(new)?;
    Ok((StatusCode::CREATED, Json(merchant)))
}

#[utoipa::path(
    get,
    path = "/merchants",
    responses((status = 200, description = "All merchants", body = Vec<MerchantProfile>)),
    tag = "merchants"
)]
async fn list_merchants(State(state): State<AppState>) -> Json<Vec<MerchantProfile>> {
    Json(state.registry.merchants())
}

#[utoipa::path(
    get,
    path = "/merchants/{id}",
    params(("id" = String, Path, description = "Merchant ID")),
    responses(
        (status = 200, description = "Merchant found", body = MerchantProfile),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "merchants"
)]
async fn get_merchant(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MerchantProfile>, AppError> {
    let id: MerchantId = parse_id(&id)?;
    Ok(Json(state.registry.merchant(id)?))
}
