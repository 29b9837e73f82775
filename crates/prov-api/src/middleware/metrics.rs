//! # HTTP Metrics
//!
//! Request counters and latency histograms through the `metrics` facade.
//! The Prometheus recorder installed by the binary renders them on
//! `/metrics`; without a recorder they are no-ops.

use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;

/// Requests by method, matched route and status.
pub const HTTP_REQUESTS_TOTAL: &str = "prov_http_requests_total";
/// Request latency in seconds by method and matched route.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "prov_http_request_duration_seconds";

/// Record one sample per request.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    ::metrics::counter!(
        HTTP_REQUESTS_TOTAL,
        "method" => method.clone(),
        "route" => route.clone(),
        "status" => status
    )
    .increment(1);
    ::metrics::histogram!(HTTP_REQUEST_DURATION_SECONDS, "method" => method, "route" => route)
        .record(started.elapsed().as_secs_f64());

    response
}
