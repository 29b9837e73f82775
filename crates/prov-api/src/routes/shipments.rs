//! # Shipment Custody API
//!
//! ```text
//! PENDING_PICKUP → PICKED_UP → IN_TRANSIT → DELIVERED → ACCEPTED | REJECTED
//! ```
//!
//! Pickup, transit readings and delivery are reported by the assigned
//! transporter; acceptance and rejection by the receiver.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use prov_core::{BatchId, OrgId, ShipmentId};
use prov_engine::{Envelope, ShipmentSpec};
use prov_state::{Conveyance, Shipment, TransitLog, TransitReading};

use crate::auth::Caller;
use crate::error::AppError;
use crate::extractors::extract_json;
use crate::routes::{applied, created, found, EnvelopeDoc};
use crate::state::AppState;

/// Create request. The sender defaults to the caller's organization.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateShipmentRequest {
    #[schema(value_type = String)]
    pub shipment_id: ShipmentId,
    #[schema(value_type = Vec<String>)]
    pub batch_ids: Vec<BatchId>,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub sender: Option<OrgId>,
    #[schema(value_type = String)]
    pub receiver: OrgId,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub transporter: Option<OrgId>,
    /// `vehicle_id`, `vehicle_type`, `driver_name`, `driver_contact`.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub conveyance: Conveyance,
    #[serde(default)]
    pub self_delivery: bool,
    /// Hand-over location, required for self-delivery.
    #[serde(default)]
    pub location: Option<String>,
}

/// Pickup or acceptance location.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LocationRequest {
    pub location: String,
}

/// Transit reading in fixed-point units.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TransitRequest {
    pub location: String,
    /// Hundredths of a degree Celsius (`450` is 4.50 °C).
    pub temperature_centi_c: i32,
    /// Hundredths of a percent relative humidity.
    pub humidity_centi_pct: u32,
}

/// Delivery report.
#[derive(Debug, Deserialize, ToSchema)]
pub struct DeliveryRequest {
    pub location: String,
    /// Digest or reference of the proof of delivery.
    #[serde(default)]
    pub proof: Option<String>,
}

/// Rejection by the receiver.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RejectDeliveryRequest {
    pub reason: String,
}

/// Shipment listing filter.
#[derive(Debug, Deserialize, IntoParams)]
pub struct ShipmentQuery {
    /// Only shipments this organization sends, receives or carries.
    #[param(value_type = Option<String>)]
    pub party: Option<OrgId>,
}

/// Build the shipments router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/shipments", get(list_shipments).post(create_shipment))
        .route("/v1/shipments/{shipment_id}", get(get_shipment))
        .route(
            "/v1/shipments/{shipment_id}/transit-logs",
            get(transit_logs).post(log_transit),
        )
        .route("/v1/shipments/{shipment_id}/pickup", post(confirm_pickup))
        .route("/v1/shipments/{shipment_id}/deliver", post(complete_delivery))
        .route("/v1/shipments/{shipment_id}/accept", post(accept_delivery))
        .route("/v1/shipments/{shipment_id}/reject", post(reject_delivery))
}

/// POST /v1/shipments: Create a shipment and reserve its batches.
#[utoipa::path(
    post,
    path = "/v1/shipments",
    request_body = CreateShipmentRequest,
    responses(
        (status = 201, description = "Shipment created", body = EnvelopeDoc),
        (status = 403, description = "Not the owner, or transporter not approved", body = EnvelopeDoc),
        (status = 409, description = "A batch is already on an open shipment", body = EnvelopeDoc),
        (status = 410, description = "A batch has been recalled", body = EnvelopeDoc),
    ),
    tag = "shipments"
)]
pub async fn create_shipment(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<CreateShipmentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<Shipment>>), AppError> {
    let req = extract_json(body)?;
    let spec = ShipmentSpec {
        shipment_id: req.shipment_id,
        batch_ids: req.batch_ids,
        sender: req.sender.unwrap_or_else(|| caller.org_id().clone()),
        receiver: req.receiver,
        transporter: req.transporter,
        conveyance: req.conveyance,
        self_delivery: req.self_delivery,
        location: req.location,
    };
    let out = state.engine.custody().create_shipment(caller.actor(), spec)?;
    Ok(created(out))
}

/// GET /v1/shipments: List shipments.
#[utoipa::path(
    get,
    path = "/v1/shipments",
    params(ShipmentQuery),
    responses((status = 200, description = "Shipments in id order", body = EnvelopeDoc)),
    tag = "shipments"
)]
pub async fn list_shipments(
    State(state): State<AppState>,
    Query(query): Query<ShipmentQuery>,
) -> Json<Envelope<Vec<Shipment>>> {
    let custody = state.engine.custody();
    found(match &query.party {
        Some(org) => custody.shipments_involving(org),
        None => custody.shipments(),
    })
}

/// GET /v1/shipments/{shipment_id}: One shipment.
#[utoipa::path(
    get,
    path = "/v1/shipments/{shipment_id}",
    params(("shipment_id" = String, Path, description = "Shipment identifier")),
    responses(
        (status = 200, description = "Shipment", body = EnvelopeDoc),
        (status = 404, description = "Unknown shipment", body = EnvelopeDoc),
    ),
    tag = "shipments"
)]
pub async fn get_shipment(
    State(state): State<AppState>,
    Path(shipment_id): Path<ShipmentId>,
) -> Result<Json<Envelope<Shipment>>, AppError> {
    Ok(found(state.engine.custody().shipment(&shipment_id)?))
}

/// GET /v1/shipments/{shipment_id}/transit-logs: Transit readings.
#[utoipa::path(
    get,
    path = "/v1/shipments/{shipment_id}/transit-logs",
    params(("shipment_id" = String, Path, description = "Shipment identifier")),
    responses((status = 200, description = "Readings in order", body = EnvelopeDoc)),
    tag = "shipments"
)]
pub async fn transit_logs(
    State(state): State<AppState>,
    Path(shipment_id): Path<ShipmentId>,
) -> Result<Json<Envelope<Vec<TransitLog>>>, AppError> {
    Ok(found(state.engine.custody().transit_logs(&shipment_id)?))
}

/// POST /v1/shipments/{shipment_id}/pickup: Transporter collected the goods.
#[utoipa::path(
    post,
    path = "/v1/shipments/{shipment_id}/pickup",
    params(("shipment_id" = String, Path, description = "Shipment identifier")),
    request_body = LocationRequest,
    responses((status = 200, description = "Picked up", body = EnvelopeDoc)),
    tag = "shipments"
)]
pub async fn confirm_pickup(
    State(state): State<AppState>,
    caller: Caller,
    Path(shipment_id): Path<ShipmentId>,
    body: Result<Json<LocationRequest>, JsonRejection>,
) -> Result<Json<Envelope<Shipment>>, AppError> {
    let req = extract_json(body)?;
    let out = state
        .engine
        .custody()
        .confirm_pickup(caller.actor(), &shipment_id, &req.location)?;
    Ok(applied(out))
}

/// POST /v1/shipments/{shipment_id}/transit-logs: Append a reading.
#[utoipa::path(
    post,
    path = "/v1/shipments/{shipment_id}/transit-logs",
    params(("shipment_id" = String, Path, description = "Shipment identifier")),
    request_body = TransitRequest,
    responses((status = 201, description = "Reading stored; `in_range` flags excursions", body = EnvelopeDoc)),
    tag = "shipments"
)]
pub async fn log_transit(
    State(state): State<AppState>,
    caller: Caller,
    Path(shipment_id): Path<ShipmentId>,
    body: Result<Json<TransitRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<TransitLog>>), AppError> {
    let req = extract_json(body)?;
    let reading = TransitReading {
        location: req.location,
        temperature_centi_c: req.temperature_centi_c,
        humidity_centi_pct: req.humidity_centi_pct,
    };
    let out = state
        .engine
        .custody()
        .log_transit(caller.actor(), &shipment_id, reading)?;
    Ok(created(out))
}

/// POST /v1/shipments/{shipment_id}/deliver: Goods handed over.
#[utoipa::path(
    post,
    path = "/v1/shipments/{shipment_id}/deliver",
    params(("shipment_id" = String, Path, description = "Shipment identifier")),
    request_body = DeliveryRequest,
    responses((status = 200, description = "Delivered", body = EnvelopeDoc)),
    tag = "shipments"
)]
pub async fn complete_delivery(
    State(state): State<AppState>,
    caller: Caller,
    Path(shipment_id): Path<ShipmentId>,
    body: Result<Json<DeliveryRequest>, JsonRejection>,
) -> Result<Json<Envelope<Shipment>>, AppError> {
    let req = extract_json(body)?;
    let out = state.engine.custody().complete_delivery(
        caller.actor(),
        &shipment_id,
        &req.location,
        req.proof,
    )?;
    Ok(applied(out))
}

/// POST /v1/shipments/{shipment_id}/accept: Receiver takes ownership.
#[utoipa::path(
    post,
    path = "/v1/shipments/{shipment_id}/accept",
    params(("shipment_id" = String, Path, description = "Shipment identifier")),
    request_body = LocationRequest,
    responses((status = 200, description = "Accepted; batches now owned by the receiver", body = EnvelopeDoc)),
    tag = "shipments"
)]
pub async fn accept_delivery(
    State(state): State<AppState>,
    caller: Caller,
    Path(shipment_id): Path<ShipmentId>,
    body: Result<Json<LocationRequest>, JsonRejection>,
) -> Result<Json<Envelope<Shipment>>, AppError> {
    let req = extract_json(body)?;
    let out = state
        .engine
        .custody()
        .accept_delivery(caller.actor(), &shipment_id, &req.location)?;
    Ok(applied(out))
}

/// POST /v1/shipments/{shipment_id}/reject: Receiver refuses the goods.
#[utoipa::path(
    post,
    path = "/v1/shipments/{shipment_id}/reject",
    params(("shipment_id" = String, Path, description = "Shipment identifier")),
    request_body = RejectDeliveryRequest,
    responses((status = 200, description = "Rejected; reservations released", body = EnvelopeDoc)),
    tag = "shipments"
)]
pub async fn reject_delivery(
    State(state): State<AppState>,
    caller: Caller,
    Path(shipment_id): Path<ShipmentId>,
    body: Result<Json<RejectDeliveryRequest>, JsonRejection>,
) -> Result<Json<Envelope<Shipment>>, AppError> {
    let req = extract_json(body)?;
    let out = state
        .engine
        .custody()
        .reject_delivery(caller.actor(), &shipment_id, &req.reason)?;
    Ok(applied(out))
}
