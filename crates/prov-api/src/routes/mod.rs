//! # API Route Modules
//!
//! - `organizations`: onboarding, suspension, identities (`/v1/organizations`, `/v1/wallets`).
//! - `products`: product registry (`/v1/products`).
//! - `batches`: batch lifecycle, lineage and custody trail (`/v1/batches`).
//! - `shipments`: the custody state machine (`/v1/shipments`).
//! - `transporters`: per-manufacturer carrier pools (`/v1/transporters`).
//! - `anchors`: anchor log lookup and integrity verification (`/v1/anchors`).
//! - `audit`: audit event queries (`/v1/audit`).
//!
//! Mutations answer with the engine [`Envelope`]; queries wrap their data in
//! the same shape with no anchor.

pub mod anchors;
pub mod audit;
pub mod batches;
pub mod organizations;
pub mod products;
pub mod shipments;
pub mod transporters;

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use prov_engine::{Envelope, Outcome};

/// Response shape of every route, as documented in the OpenAPI schema.
#[derive(Debug, Serialize, ToSchema)]
pub struct EnvelopeDoc {
    pub ok: bool,
    pub data: Option<serde_json::Value>,
    /// Engine error kind, e.g. `Recalled`.
    pub error_kind: Option<String>,
    pub message: Option<String>,
    /// `sha256:<hex>` of the anchored primary record.
    pub anchor_ref: Option<String>,
}

/// `201 Created` with the operation's envelope.
pub(crate) fn created<T>(out: Outcome<T>) -> (StatusCode, Json<Envelope<T>>) {
    (StatusCode::CREATED, Json(Envelope::ok(out.data, out.anchor_ref)))
}

/// `200 OK` with the operation's envelope.
pub(crate) fn applied<T>(out: Outcome<T>) -> Json<Envelope<T>> {
    Json(Envelope::ok(out.data, out.anchor_ref))
}

/// `200 OK` wrapping query data.
pub(crate) fn found<T>(data: T) -> Json<Envelope<T>> {
    Json(Envelope::ok(data, None))
}
