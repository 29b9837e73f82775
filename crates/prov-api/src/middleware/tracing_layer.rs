//! # Request/Response Tracing
//!
//! `tower_http::trace::TraceLayer` with one span per request.

/// Build the request tracing layer.
pub fn layer() -> tower_http::trace::TraceLayer<
    tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>,
> {
    tower_http::trace::TraceLayer::new_for_http()
}
