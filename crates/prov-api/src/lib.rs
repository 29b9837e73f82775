//! # prov-api: HTTP Surface of the Provenance Engine
//!
//! Thin Axum layer over [`prov_engine::Engine`]. Handlers authenticate the
//! caller, parse the request and hand it to the engine; every domain rule
//! lives in the engine.
//!
//! ## API Surface
//!
//! | Prefix                 | Module                        |
//! |------------------------|-------------------------------|
//! | `/v1/organizations/*`  | [`routes::organizations`]     |
//! | `/v1/wallets/*`        | [`routes::organizations`]     |
//! | `/v1/products/*`       | [`routes::products`]          |
//! | `/v1/batches/*`        | [`routes::batches`]           |
//! | `/v1/shipments/*`      | [`routes::shipments`]         |
//! | `/v1/transporters/*`   | [`routes::transporters`]      |
//! | `/v1/anchors/*`        | [`routes::anchors`]           |
//! | `/v1/audit`            | [`routes::audit`]             |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → AuthMiddleware → Handler
//! ```
//!
//! `/health/*` and `/metrics` are mounted outside the stack.

pub mod auth;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

pub use error::AppError;
pub use state::{AppConfig, AppState};

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::auth::AuthConfig;

/// Assemble the full application router with all routes and middleware.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };

    let api = Router::new()
        .merge(routes::organizations::router())
        .merge(routes::products::router())
        .merge(routes::batches::router())
        .merge(routes::shipments::router())
        .merge(routes::transporters::router())
        .merge(routes::anchors::router())
        .merge(routes::audit::router())
        .merge(openapi::router())
        .layer(from_fn(auth::auth_middleware))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(middleware::tracing_layer::layer())
        .layer(axum::Extension(auth_config))
        .with_state(state.clone());

    let probes = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/metrics", get(render_metrics))
        .with_state(state);

    Router::new().merge(probes).merge(api)
}

/// Liveness probe: always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: the engine is in-process, so ready once serving.
async fn readiness() -> &'static str {
    "ready"
}

/// GET /metrics: Prometheus text exposition.
async fn render_metrics(State(state): State<AppState>) -> Response {
    match &state.prometheus {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
