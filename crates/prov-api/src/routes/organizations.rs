//! # Organizations and Wallets
//!
//! Onboarding and suspension are regulator operations; the engine enforces
//! that. Wallet lookups answer with the assigned identity, or with the pool
//! address an organization would receive.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;

use prov_core::{OrgId, OrgType};
use prov_engine::{Envelope, OrganizationSpec, WalletView};
use prov_state::Organization;

use crate::auth::Caller;
use crate::error::AppError;
use crate::extractors::extract_json;
use crate::routes::{applied, created, found, EnvelopeDoc};
use crate::state::AppState;

/// Onboard request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct OnboardRequest {
    #[schema(value_type = String)]
    pub org_id: OrgId,
    /// `manufacturer`, `distributor`, `transporter` or `retailer`.
    #[schema(value_type = String)]
    pub org_type: OrgType,
    pub name: String,
}

/// Suspend or reinstate request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusChangeRequest {
    pub reason: String,
}

/// Build the organizations router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/organizations",
            post(onboard_organization).get(list_organizations),
        )
        .route("/v1/organizations/{org_id}", get(get_organization))
        .route(
            "/v1/organizations/{org_id}/suspend",
            post(suspend_organization),
        )
        .route(
            "/v1/organizations/{org_id}/reinstate",
            post(reinstate_organization),
        )
        .route("/v1/wallets/{org_id}", get(wallet_for))
}

/// POST /v1/organizations: Onboard an organization.
#[utoipa::path(
    post,
    path = "/v1/organizations",
    request_body = OnboardRequest,
    responses(
        (status = 201, description = "Organization onboarded", body = EnvelopeDoc),
        (status = 403, description = "Caller is not a regulator", body = EnvelopeDoc),
        (status = 409, description = "Organization or its identity already exists", body = EnvelopeDoc),
    ),
    tag = "organizations"
)]
pub async fn onboard_organization(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<OnboardRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<Organization>>), AppError> {
    let req = extract_json(body)?;
    let out = state.engine.directory().onboard_organization(
        caller.actor(),
        OrganizationSpec {
            org_id: req.org_id,
            org_type: req.org_type,
            name: req.name,
        },
    )?;
    Ok(created(out))
}

/// GET /v1/organizations: List onboarded organizations.
#[utoipa::path(
    get,
    path = "/v1/organizations",
    responses((status = 200, description = "Organizations in id order", body = EnvelopeDoc)),
    tag = "organizations"
)]
pub async fn list_organizations(State(state): State<AppState>) -> Json<Envelope<Vec<Organization>>> {
    found(state.engine.directory().organizations())
}

/// GET /v1/organizations/{org_id}: One organization.
#[utoipa::path(
    get,
    path = "/v1/organizations/{org_id}",
    params(("org_id" = String, Path, description = "Organization identifier")),
    responses(
        (status = 200, description = "Organization", body = EnvelopeDoc),
        (status = 404, description = "Not onboarded", body = EnvelopeDoc),
    ),
    tag = "organizations"
)]
pub async fn get_organization(
    State(state): State<AppState>,
    Path(org_id): Path<OrgId>,
) -> Result<Json<Envelope<Organization>>, AppError> {
    Ok(found(state.engine.directory().organization(&org_id)?))
}

/// POST /v1/organizations/{org_id}/suspend: Bar an organization from acting.
#[utoipa::path(
    post,
    path = "/v1/organizations/{org_id}/suspend",
    params(("org_id" = String, Path, description = "Organization identifier")),
    request_body = StatusChangeRequest,
    responses((status = 200, description = "Organization suspended", body = EnvelopeDoc)),
    tag = "organizations"
)]
pub async fn suspend_organization(
    State(state): State<AppState>,
    caller: Caller,
    Path(org_id): Path<OrgId>,
    body: Result<Json<StatusChangeRequest>, JsonRejection>,
) -> Result<Json<Envelope<Organization>>, AppError> {
    let req = extract_json(body)?;
    let out = state
        .engine
        .directory()
        .suspend_organization(caller.actor(), &org_id, &req.reason)?;
    Ok(applied(out))
}

/// POST /v1/organizations/{org_id}/reinstate: Lift a suspension.
#[utoipa::path(
    post,
    path = "/v1/organizations/{org_id}/reinstate",
    params(("org_id" = String, Path, description = "Organization identifier")),
    request_body = StatusChangeRequest,
    responses((status = 200, description = "Organization reinstated", body = EnvelopeDoc)),
    tag = "organizations"
)]
pub async fn reinstate_organization(
    State(state): State<AppState>,
    caller: Caller,
    Path(org_id): Path<OrgId>,
    body: Result<Json<StatusChangeRequest>, JsonRejection>,
) -> Result<Json<Envelope<Organization>>, AppError> {
    let req = extract_json(body)?;
    let out = state
        .engine
        .directory()
        .reinstate_organization(caller.actor(), &org_id, &req.reason)?;
    Ok(applied(out))
}

/// GET /v1/wallets/{org_id}: Identity held or to be assigned.
#[utoipa::path(
    get,
    path = "/v1/wallets/{org_id}",
    params(("org_id" = String, Path, description = "Organization identifier")),
    responses((status = 200, description = "Wallet view", body = EnvelopeDoc)),
    tag = "organizations"
)]
pub async fn wallet_for(
    State(state): State<AppState>,
    Path(org_id): Path<OrgId>,
) -> Json<Envelope<WalletView>> {
    found(state.engine.directory().wallet_for(&org_id))
}
