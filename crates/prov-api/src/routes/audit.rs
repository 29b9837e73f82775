//! # Audit Query API

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::IntoParams;

use prov_core::OrgId;
use prov_engine::{AuditEvent, Envelope};

use crate::error::AppError;
use crate::routes::{found, EnvelopeDoc};
use crate::state::AppState;

const DEFAULT_LIMIT: usize = 100;

/// Audit filter. At most one selector applies, checked in field order;
/// without one the latest `limit` events are returned.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct AuditQuery {
    /// Entity kind, e.g. `batch`. Requires `entity_id`.
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    /// Operation name, e.g. `split_batch`.
    pub action: Option<String>,
    #[param(value_type = Option<String>)]
    pub actor: Option<OrgId>,
    pub limit: Option<usize>,
}

/// Build the audit router.
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/audit", get(query_audit))
}

/// GET /v1/audit: Query audit events, oldest first.
#[utoipa::path(
    get,
    path = "/v1/audit",
    params(AuditQuery),
    responses(
        (status = 200, description = "Matching events", body = EnvelopeDoc),
        (status = 422, description = "entity_type without entity_id"),
    ),
    tag = "audit"
)]
pub async fn query_audit(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Envelope<Vec<AuditEvent>>>, AppError> {
    let log = state.engine.audit_log();
    let events = match (&query.entity_type, &query.entity_id) {
        (Some(kind), Some(id)) => log.for_entity(kind, id),
        (Some(_), None) | (None, Some(_)) => {
            return Err(AppError::Validation(
                "entity_type and entity_id must be given together".into(),
            ))
        }
        (None, None) => match (&query.action, &query.actor) {
            (Some(action), _) => log.by_action(action),
            (None, Some(actor)) => log.by_actor(actor),
            (None, None) => log.last_n(query.limit.unwrap_or(DEFAULT_LIMIT)),
        },
    };
    Ok(found(events))
}
