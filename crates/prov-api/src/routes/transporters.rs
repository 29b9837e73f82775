//! # Transporter Pools
//!
//! A manufacturer keeps one pool of carriers it trusts. Transporters ask to
//! join with their assigned identity; the manufacturer approves, rejects or
//! adds them directly.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use prov_core::{Identity, OrgId};
use prov_engine::Envelope;
use prov_state::{TransporterPoolEntry, TransporterProfile};

use crate::auth::Caller;
use crate::error::AppError;
use crate::extractors::extract_json;
use crate::routes::{applied, created, found, EnvelopeDoc};
use crate::state::AppState;

/// Join request filed by a transporter.
#[derive(Debug, Deserialize, ToSchema)]
pub struct JoinPoolRequest {
    #[schema(value_type = String)]
    pub manufacturer: OrgId,
    /// The requesting transporter's own identity.
    #[schema(value_type = String)]
    pub identity: Identity,
    /// `name`, plus optional `contact`, `license_number`, `vehicle_types`.
    #[schema(value_type = Object)]
    pub profile: TransporterProfile,
}

/// Direct admission by the manufacturer.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToPoolRequest {
    #[schema(value_type = String)]
    pub identity: Identity,
    #[schema(value_type = Object)]
    pub profile: TransporterProfile,
}

/// Rejection or revocation.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RejectTransporterRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Standing of one identity in one pool.
#[derive(Debug, Serialize, ToSchema)]
pub struct PoolStanding {
    pub authorized: bool,
    #[schema(value_type = Option<Object>)]
    pub entry: Option<TransporterPoolEntry>,
}

/// Build the transporters router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/transporters/requests", post(request_transporter))
        .route(
            "/v1/transporters/{manufacturer}/pool",
            get(list_pool).post(add_to_pool),
        )
        .route("/v1/transporters/{manufacturer}/pending", get(pending_requests))
        .route(
            "/v1/transporters/{manufacturer}/{identity}",
            get(pool_standing),
        )
        .route(
            "/v1/transporters/{manufacturer}/{identity}/approve",
            post(approve_transporter),
        )
        .route(
            "/v1/transporters/{manufacturer}/{identity}/reject",
            post(reject_transporter),
        )
}

/// POST /v1/transporters/requests: Ask to join a manufacturer's pool.
#[utoipa::path(
    post,
    path = "/v1/transporters/requests",
    request_body = JoinPoolRequest,
    responses(
        (status = 201, description = "Request pending", body = EnvelopeDoc),
        (status = 403, description = "Identity is not the caller's own", body = EnvelopeDoc),
        (status = 409, description = "Already pending or approved", body = EnvelopeDoc),
    ),
    tag = "transporters"
)]
pub async fn request_transporter(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<JoinPoolRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<TransporterPoolEntry>>), AppError> {
    let req = extract_json(body)?;
    let out = state.engine.authority().request_transporter(
        caller.actor(),
        &req.manufacturer,
        &req.identity,
        req.profile,
    )?;
    Ok(created(out))
}

/// POST /v1/transporters/{manufacturer}/{identity}/approve: Approve a request.
#[utoipa::path(
    post,
    path = "/v1/transporters/{manufacturer}/{identity}/approve",
    params(
        ("manufacturer" = String, Path, description = "Pool owner"),
        ("identity" = String, Path, description = "Transporter identity"),
    ),
    responses(
        (status = 200, description = "Approved", body = EnvelopeDoc),
        (status = 404, description = "No such request", body = EnvelopeDoc),
    ),
    tag = "transporters"
)]
pub async fn approve_transporter(
    State(state): State<AppState>,
    caller: Caller,
    Path((manufacturer, identity)): Path<(OrgId, Identity)>,
) -> Result<Json<Envelope<TransporterPoolEntry>>, AppError> {
    let out = state
        .engine
        .authority()
        .approve_transporter(caller.actor(), &manufacturer, &identity)?;
    Ok(applied(out))
}

/// POST /v1/transporters/{manufacturer}/{identity}/reject: Reject or revoke.
#[utoipa::path(
    post,
    path = "/v1/transporters/{manufacturer}/{identity}/reject",
    params(
        ("manufacturer" = String, Path, description = "Pool owner"),
        ("identity" = String, Path, description = "Transporter identity"),
    ),
    request_body = RejectTransporterRequest,
    responses((status = 200, description = "Rejected", body = EnvelopeDoc)),
    tag = "transporters"
)]
pub async fn reject_transporter(
    State(state): State<AppState>,
    caller: Caller,
    Path((manufacturer, identity)): Path<(OrgId, Identity)>,
    body: Result<Json<RejectTransporterRequest>, JsonRejection>,
) -> Result<Json<Envelope<TransporterPoolEntry>>, AppError> {
    let req = extract_json(body)?;
    let out = state.engine.authority().reject_transporter(
        caller.actor(),
        &manufacturer,
        &identity,
        req.reason.as_deref(),
    )?;
    Ok(applied(out))
}

/// POST /v1/transporters/{manufacturer}/pool: Admit a transporter directly.
#[utoipa::path(
    post,
    path = "/v1/transporters/{manufacturer}/pool",
    params(("manufacturer" = String, Path, description = "Pool owner")),
    request_body = AddToPoolRequest,
    responses((status = 201, description = "Transporter approved in the pool", body = EnvelopeDoc)),
    tag = "transporters"
)]
pub async fn add_to_pool(
    State(state): State<AppState>,
    caller: Caller,
    Path(manufacturer): Path<OrgId>,
    body: Result<Json<AddToPoolRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<TransporterPoolEntry>>), AppError> {
    let req = extract_json(body)?;
    let out = state.engine.authority().add_transporter_to_pool(
        caller.actor(),
        &manufacturer,
        &req.identity,
        req.profile,
    )?;
    Ok(created(out))
}

/// GET /v1/transporters/{manufacturer}/pool: Every entry in the pool.
#[utoipa::path(
    get,
    path = "/v1/transporters/{manufacturer}/pool",
    params(("manufacturer" = String, Path, description = "Pool owner")),
    responses((status = 200, description = "Pool entries", body = EnvelopeDoc)),
    tag = "transporters"
)]
pub async fn list_pool(
    State(state): State<AppState>,
    Path(manufacturer): Path<OrgId>,
) -> Json<Envelope<Vec<TransporterPoolEntry>>> {
    found(state.engine.authority().pool(&manufacturer))
}

/// GET /v1/transporters/{manufacturer}/pending: Requests awaiting a decision.
#[utoipa::path(
    get,
    path = "/v1/transporters/{manufacturer}/pending",
    params(("manufacturer" = String, Path, description = "Pool owner")),
    responses((status = 200, description = "Pending entries", body = EnvelopeDoc)),
    tag = "transporters"
)]
pub async fn pending_requests(
    State(state): State<AppState>,
    Path(manufacturer): Path<OrgId>,
) -> Json<Envelope<Vec<TransporterPoolEntry>>> {
    found(state.engine.authority().pending_requests(&manufacturer))
}

/// GET /v1/transporters/{manufacturer}/{identity}: Is this carrier approved?
#[utoipa::path(
    get,
    path = "/v1/transporters/{manufacturer}/{identity}",
    params(
        ("manufacturer" = String, Path, description = "Pool owner"),
        ("identity" = String, Path, description = "Transporter identity"),
    ),
    responses((status = 200, description = "Standing in the pool", body = EnvelopeDoc)),
    tag = "transporters"
)]
pub async fn pool_standing(
    State(state): State<AppState>,
    Path((manufacturer, identity)): Path<(OrgId, Identity)>,
) -> Json<Envelope<PoolStanding>> {
    let authority = state.engine.authority();
    found(PoolStanding {
        authorized: authority.is_authorized(&manufacturer, &identity),
        entry: authority.entry(&manufacturer, &identity),
    })
}
