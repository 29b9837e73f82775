//! Counters emitted through the `metrics` facade.
//!
//! Without an installed recorder these are no-ops; `prov-api` installs the
//! Prometheus exporter and serves them on `/metrics`.

/// Operations by name and outcome (`ok` or an error kind).
pub const OPERATIONS_TOTAL: &str = "prov_operations_total";
/// Newly anchored records.
pub const ANCHORS_TOTAL: &str = "prov_anchors_total";
/// Transit readings outside the safe range.
pub const COLD_CHAIN_EXCURSIONS_TOTAL: &str = "prov_cold_chain_excursions_total";

pub(crate) fn operation(operation: &'static str, outcome: &'static str) {
    ::metrics::counter!(OPERATIONS_TOTAL, "operation" => operation, "outcome" => outcome)
        .increment(1);
}

pub(crate) fn anchors(count: u64) {
    if count > 0 {
        ::metrics::counter!(ANCHORS_TOTAL).increment(count);
    }
}

pub(crate) fn cold_chain_excursion() {
    ::metrics::counter!(COLD_CHAIN_EXCURSIONS_TOTAL).increment(1);
}
