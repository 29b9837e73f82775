//! # Anchor Log API
//!
//! Read access to the append-only anchor log and integrity checks of a
//! presented record against its latest anchor.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use prov_core::ContentDigest;
use prov_crypto::{AnchorRecord, Verification};
use prov_engine::{EngineError, Envelope};

use crate::error::AppError;
use crate::extractors::extract_json;
use crate::routes::{found, EnvelopeDoc};
use crate::state::AppState;

const DEFAULT_LIMIT: usize = 100;

/// Anchor listing filter.
#[derive(Debug, Deserialize, IntoParams)]
pub struct AnchorQuery {
    /// Full history of one record, e.g. `batch:B1`.
    pub data_id: Option<String>,
    /// Most recent records when no `data_id` is given.
    pub limit: Option<usize>,
}

/// Integrity check request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyRequest {
    pub data_id: String,
    /// The record as the caller holds it.
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
}

/// Build the anchors router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/anchors", get(list_anchors))
        .route("/v1/anchors/verify", post(verify_record))
        .route("/v1/anchors/{hash}", get(get_anchor))
}

/// GET /v1/anchors: Anchor history of a record, or the latest anchors.
#[utoipa::path(
    get,
    path = "/v1/anchors",
    params(AnchorQuery),
    responses((status = 200, description = "Anchor records, oldest first", body = EnvelopeDoc)),
    tag = "anchors"
)]
pub async fn list_anchors(
    State(state): State<AppState>,
    Query(query): Query<AnchorQuery>,
) -> Json<Envelope<Vec<AnchorRecord>>> {
    let anchors = state.engine.anchors();
    found(match &query.data_id {
        Some(id) => anchors.history(id),
        None => anchors.recent(query.limit.unwrap_or(DEFAULT_LIMIT)),
    })
}

/// GET /v1/anchors/{hash}: The record anchored under a digest.
#[utoipa::path(
    get,
    path = "/v1/anchors/{hash}",
    params(("hash" = String, Path, description = "`sha256:<hex>` digest")),
    responses(
        (status = 200, description = "Anchor record", body = EnvelopeDoc),
        (status = 404, description = "Digest never anchored", body = EnvelopeDoc),
        (status = 422, description = "Malformed digest"),
    ),
    tag = "anchors"
)]
pub async fn get_anchor(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> Result<Json<Envelope<AnchorRecord>>, AppError> {
    let digest = ContentDigest::parse(&hash)?;
    let record = state
        .engine
        .anchors()
        .record(&digest)
        .ok_or_else(|| EngineError::NotFound {
            entity: "anchor",
            id: digest.to_string(),
        })?;
    Ok(found(record))
}

/// POST /v1/anchors/verify: Compare a record against its latest anchor.
#[utoipa::path(
    post,
    path = "/v1/anchors/verify",
    request_body = VerifyRequest,
    responses((status = 200, description = "`MATCH`, `MISMATCH` or `NOT_FOUND`", body = EnvelopeDoc)),
    tag = "anchors"
)]
pub async fn verify_record(
    State(state): State<AppState>,
    body: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<Envelope<Verification>>, AppError> {
    let req = extract_json(body)?;
    let verification = state
        .engine
        .anchors()
        .verify(&req.data_id, &req.payload)
        .map_err(EngineError::from)?;
    Ok(found(verification))
}
