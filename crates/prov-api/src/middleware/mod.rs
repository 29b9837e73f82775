//! Tower middleware: request tracing and HTTP metrics.

pub mod metrics;
pub mod tracing_layer;
