//! # Product Registry API

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use prov_core::{OrgId, ProductId};
use prov_engine::{Envelope, ProductSpec};
use prov_state::Product;

use crate::auth::Caller;
use crate::error::AppError;
use crate::extractors::extract_json;
use crate::routes::{created, found, EnvelopeDoc};
use crate::state::AppState;

/// Register request. The manufacturer defaults to the caller's organization.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterProductRequest {
    #[schema(value_type = String)]
    pub product_id: ProductId,
    pub name: String,
    pub category: String,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub manufacturer: Option<OrgId>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Product listing filter.
#[derive(Debug, Deserialize, IntoParams)]
pub struct ProductQuery {
    /// Only products of this manufacturer.
    #[param(value_type = Option<String>)]
    pub manufacturer: Option<OrgId>,
}

/// Build the products router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/products", get(list_products).post(register_product))
        .route("/v1/products/{product_id}", get(get_product))
}

/// POST /v1/products: Register a product.
#[utoipa::path(
    post,
    path = "/v1/products",
    request_body = RegisterProductRequest,
    responses(
        (status = 201, description = "Product registered", body = EnvelopeDoc),
        (status = 403, description = "Caller is not the manufacturer", body = EnvelopeDoc),
        (status = 409, description = "Product id taken", body = EnvelopeDoc),
    ),
    tag = "products"
)]
pub async fn register_product(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<RegisterProductRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<Product>>), AppError> {
    let req = extract_json(body)?;
    let spec = ProductSpec {
        product_id: req.product_id,
        name: req.name,
        category: req.category,
        manufacturer: req.manufacturer.unwrap_or_else(|| caller.org_id().clone()),
        description: req.description,
    };
    let out = state
        .engine
        .registry()
        .register_product(caller.actor(), spec)?;
    Ok(created(out))
}

/// GET /v1/products: List products.
#[utoipa::path(
    get,
    path = "/v1/products",
    params(ProductQuery),
    responses((status = 200, description = "Products in id order", body = EnvelopeDoc)),
    tag = "products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Json<Envelope<Vec<Product>>> {
    found(state.engine.registry().products(query.manufacturer.as_ref()))
}

/// GET /v1/products/{product_id}: One product.
#[utoipa::path(
    get,
    path = "/v1/products/{product_id}",
    params(("product_id" = String, Path, description = "Product identifier")),
    responses(
        (status = 200, description = "Product", body = EnvelopeDoc),
        (status = 404, description = "Unknown product", body = EnvelopeDoc),
    ),
    tag = "products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
) -> Result<Json<Envelope<Product>>, AppError> {
    Ok(found(state.engine.registry().product(&product_id)?))
}
