//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI spec,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI spec for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Provenance API",
        version = "0.1.0",
        description = "Custody and provenance tracking for regulated goods: organizations, products, batches, shipments, transporter pools, anchors and audit."
    ),
    paths(
        // Organizations
        crate::routes::organizations::onboard_organization,
        crate::routes::organizations::list_organizations,
        crate::routes::organizations::get_organization,
        crate::routes::organizations::suspend_organization,
        crate::routes::organizations::reinstate_organization,
        crate::routes::organizations::wallet_for,
        // Products
        crate::routes::products::register_product,
        crate::routes::products::list_products,
        crate::routes::products::get_product,
        // Batches
        crate::routes::batches::create_batch,
        crate::routes::batches::list_batches,
        crate::routes::batches::get_batch,
        crate::routes::batches::batch_lineage,
        crate::routes::batches::batch_shipments,
        crate::routes::batches::split_batch,
        crate::routes::batches::sell_to_consumer,
        crate::routes::batches::recall_batch,
        crate::routes::batches::expire_batch,
        // Shipments
        crate::routes::shipments::create_shipment,
        crate::routes::shipments::list_shipments,
        crate::routes::shipments::get_shipment,
        crate::routes::shipments::transit_logs,
        crate::routes::shipments::confirm_pickup,
        crate::routes::shipments::log_transit,
        crate::routes::shipments::complete_delivery,
        crate::routes::shipments::accept_delivery,
        crate::routes::shipments::reject_delivery,
        // Transporters
        crate::routes::transporters::request_transporter,
        crate::routes::transporters::approve_transporter,
        crate::routes::transporters::reject_transporter,
        crate::routes::transporters::add_to_pool,
        crate::routes::transporters::list_pool,
        crate::routes::transporters::pending_requests,
        crate::routes::transporters::pool_standing,
        // Anchors
        crate::routes::anchors::list_anchors,
        crate::routes::anchors::get_anchor,
        crate::routes::anchors::verify_record,
        // Audit
        crate::routes::audit::query_audit,
    ),
    components(schemas(
        crate::routes::EnvelopeDoc,
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::routes::organizations::OnboardRequest,
        crate::routes::organizations::StatusChangeRequest,
        crate::routes::products::RegisterProductRequest,
        crate::routes::batches::CreateBatchRequest,
        crate::routes::batches::SplitBatchRequest,
        crate::routes::batches::SellRequest,
        crate::routes::batches::RecallRequest,
        crate::routes::batches::ExpireRequest,
        crate::routes::shipments::CreateShipmentRequest,
        crate::routes::shipments::LocationRequest,
        crate::routes::shipments::TransitRequest,
        crate::routes::shipments::DeliveryRequest,
        crate::routes::shipments::RejectDeliveryRequest,
        crate::routes::transporters::JoinPoolRequest,
        crate::routes::transporters::AddToPoolRequest,
        crate::routes::transporters::RejectTransporterRequest,
        crate::routes::transporters::PoolStanding,
        crate::routes::anchors::VerifyRequest,
    )),
    tags(
        (name = "organizations", description = "Onboarding, suspension and identities"),
        (name = "products", description = "Product registry"),
        (name = "batches", description = "Batch lifecycle and lineage"),
        (name = "shipments", description = "Custody transfer between parties"),
        (name = "transporters", description = "Per-manufacturer carrier pools"),
        (name = "anchors", description = "Anchor log and integrity checks"),
        (name = "audit", description = "Audit event queries"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json: Return the generated OpenAPI specification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
