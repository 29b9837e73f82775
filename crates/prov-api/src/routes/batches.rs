//! # Batch Lifecycle API
//!
//! Creation, splitting, consumer sales, recall and expiry, plus lineage and
//! the custody trail of a batch.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use prov_core::{BatchId, OrgId, ProductId};
use prov_engine::{BatchLineage, BatchSpec, Envelope, SplitResult};
use prov_state::{Batch, Shipment};

use crate::auth::Caller;
use crate::error::AppError;
use crate::extractors::extract_json;
use crate::routes::{applied, created, found, EnvelopeDoc};
use crate::state::AppState;

/// Create request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateBatchRequest {
    #[schema(value_type = String)]
    pub batch_id: BatchId,
    #[schema(value_type = String)]
    pub product_id: ProductId,
    pub quantity: u64,
    pub mfg_date: NaiveDate,
    pub exp_date: NaiveDate,
    /// Plant or site of manufacture.
    pub origin: String,
}

/// Split request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SplitBatchRequest {
    #[schema(value_type = String)]
    pub child_id: BatchId,
    pub quantity: u64,
}

/// Consumer sale request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SellRequest {
    pub quantity: u64,
}

/// Recall request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RecallRequest {
    pub reason: String,
}

/// Expiry request. `as_of` defaults to today (UTC).
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ExpireRequest {
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
}

/// Batch listing filter.
#[derive(Debug, Deserialize, IntoParams)]
pub struct BatchQuery {
    /// Only batches currently owned by this organization.
    #[param(value_type = Option<String>)]
    pub owner: Option<OrgId>,
}

/// Build the batches router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/batches", get(list_batches).post(create_batch))
        .route("/v1/batches/{batch_id}", get(get_batch))
        .route("/v1/batches/{batch_id}/lineage", get(batch_lineage))
        .route("/v1/batches/{batch_id}/shipments", get(batch_shipments))
        .route("/v1/batches/{batch_id}/split", post(split_batch))
        .route("/v1/batches/{batch_id}/sell", post(sell_to_consumer))
        .route("/v1/batches/{batch_id}/recall", post(recall_batch))
        .route("/v1/batches/{batch_id}/expire", post(expire_batch))
}

/// POST /v1/batches: Create a batch of one of the caller's products.
#[utoipa::path(
    post,
    path = "/v1/batches",
    request_body = CreateBatchRequest,
    responses(
        (status = 201, description = "Batch created", body = EnvelopeDoc),
        (status = 403, description = "Caller does not make the product", body = EnvelopeDoc),
        (status = 422, description = "Zero quantity or bad dates", body = EnvelopeDoc),
    ),
    tag = "batches"
)]
pub async fn create_batch(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<CreateBatchRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<Batch>>), AppError> {
    let req = extract_json(body)?;
    let spec = BatchSpec {
        batch_id: req.batch_id,
        product_id: req.product_id,
        quantity: req.quantity,
        mfg_date: req.mfg_date,
        exp_date: req.exp_date,
        origin: req.origin,
    };
    let out = state.engine.registry().create_batch(caller.actor(), spec)?;
    Ok(created(out))
}

/// GET /v1/batches: List batches.
#[utoipa::path(
    get,
    path = "/v1/batches",
    params(BatchQuery),
    responses((status = 200, description = "Batches in id order", body = EnvelopeDoc)),
    tag = "batches"
)]
pub async fn list_batches(
    State(state): State<AppState>,
    Query(query): Query<BatchQuery>,
) -> Json<Envelope<Vec<Batch>>> {
    let batches = match &query.owner {
        Some(owner) => state.engine.registry().batches_owned_by(owner),
        None => state.engine.ledger().list::<Batch>(),
    };
    found(batches)
}

/// GET /v1/batches/{batch_id}: One batch.
#[utoipa::path(
    get,
    path = "/v1/batches/{batch_id}",
    params(("batch_id" = String, Path, description = "Batch identifier")),
    responses(
        (status = 200, description = "Batch", body = EnvelopeDoc),
        (status = 404, description = "Unknown batch", body = EnvelopeDoc),
    ),
    tag = "batches"
)]
pub async fn get_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<BatchId>,
) -> Result<Json<Envelope<Batch>>, AppError> {
    Ok(found(state.engine.registry().batch(&batch_id)?))
}

/// GET /v1/batches/{batch_id}/lineage: Ancestors and direct children.
#[utoipa::path(
    get,
    path = "/v1/batches/{batch_id}/lineage",
    params(("batch_id" = String, Path, description = "Batch identifier")),
    responses((status = 200, description = "Lineage", body = EnvelopeDoc)),
    tag = "batches"
)]
pub async fn batch_lineage(
    State(state): State<AppState>,
    Path(batch_id): Path<BatchId>,
) -> Result<Json<Envelope<BatchLineage>>, AppError> {
    Ok(found(state.engine.registry().batch_lineage(&batch_id)?))
}

/// GET /v1/batches/{batch_id}/shipments: Custody trail, oldest first.
#[utoipa::path(
    get,
    path = "/v1/batches/{batch_id}/shipments",
    params(("batch_id" = String, Path, description = "Batch identifier")),
    responses((status = 200, description = "Shipments that carried the batch", body = EnvelopeDoc)),
    tag = "batches"
)]
pub async fn batch_shipments(
    State(state): State<AppState>,
    Path(batch_id): Path<BatchId>,
) -> Result<Json<Envelope<Vec<Shipment>>>, AppError> {
    state.engine.registry().batch(&batch_id)?;
    Ok(found(state.engine.custody().shipments_for_batch(&batch_id)))
}

/// POST /v1/batches/{batch_id}/split: Split off a child batch.
#[utoipa::path(
    post,
    path = "/v1/batches/{batch_id}/split",
    params(("batch_id" = String, Path, description = "Parent batch")),
    request_body = SplitBatchRequest,
    responses(
        (status = 201, description = "Parent and child after the split", body = EnvelopeDoc),
        (status = 422, description = "Quantity zero or above the parent's", body = EnvelopeDoc),
    ),
    tag = "batches"
)]
pub async fn split_batch(
    State(state): State<AppState>,
    caller: Caller,
    Path(batch_id): Path<BatchId>,
    body: Result<Json<SplitBatchRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<SplitResult>>), AppError> {
    let req = extract_json(body)?;
    let out = state.engine.registry().split_batch(
        caller.actor(),
        &batch_id,
        &req.child_id,
        req.quantity,
    )?;
    Ok(created(out))
}

/// POST /v1/batches/{batch_id}/sell: Retail sale to consumers.
#[utoipa::path(
    post,
    path = "/v1/batches/{batch_id}/sell",
    params(("batch_id" = String, Path, description = "Batch identifier")),
    request_body = SellRequest,
    responses((status = 200, description = "Batch after the sale", body = EnvelopeDoc)),
    tag = "batches"
)]
pub async fn sell_to_consumer(
    State(state): State<AppState>,
    caller: Caller,
    Path(batch_id): Path<BatchId>,
    body: Result<Json<SellRequest>, JsonRejection>,
) -> Result<Json<Envelope<Batch>>, AppError> {
    let req = extract_json(body)?;
    let out = state
        .engine
        .registry()
        .sell_to_consumer(caller.actor(), &batch_id, req.quantity)?;
    Ok(applied(out))
}

/// POST /v1/batches/{batch_id}/recall: Recall a batch and its descendants.
#[utoipa::path(
    post,
    path = "/v1/batches/{batch_id}/recall",
    params(("batch_id" = String, Path, description = "Batch identifier")),
    request_body = RecallRequest,
    responses(
        (status = 200, description = "Batch recalled", body = EnvelopeDoc),
        (status = 410, description = "Already recalled", body = EnvelopeDoc),
    ),
    tag = "batches"
)]
pub async fn recall_batch(
    State(state): State<AppState>,
    caller: Caller,
    Path(batch_id): Path<BatchId>,
    body: Result<Json<RecallRequest>, JsonRejection>,
) -> Result<Json<Envelope<Batch>>, AppError> {
    let req = extract_json(body)?;
    let out = state
        .engine
        .registry()
        .recall_batch(caller.actor(), &batch_id, &req.reason)?;
    Ok(applied(out))
}

/// POST /v1/batches/{batch_id}/expire: Mark a batch past its expiry date.
#[utoipa::path(
    post,
    path = "/v1/batches/{batch_id}/expire",
    params(("batch_id" = String, Path, description = "Batch identifier")),
    request_body = ExpireRequest,
    responses((status = 200, description = "Batch expired", body = EnvelopeDoc)),
    tag = "batches"
)]
pub async fn expire_batch(
    State(state): State<AppState>,
    caller: Caller,
    Path(batch_id): Path<BatchId>,
    body: Result<Json<ExpireRequest>, JsonRejection>,
) -> Result<Json<Envelope<Batch>>, AppError> {
    let req = extract_json(body)?;
    let as_of = req
        .as_of
        .unwrap_or_else(|| chrono::Utc::now().date_naive());
    let out = state
        .engine
        .registry()
        .expire_batch(caller.actor(), &batch_id, as_of)?;
    Ok(applied(out))
}
