//! # Audit Events
//!
//! One [`AuditEvent`] is emitted per successful mutating operation and
//! handed to every registered [`AuditSink`].
//!
//! Two sinks ship with the engine: [`AuditLog`], a bounded in-memory log
//! queryable by entity and action, and [`TracingAuditSink`], which writes
//! each event as a structured `tracing` event under the `prov::audit`
//! target. When the in-memory log exceeds its capacity the oldest 10% of
//! events are dropped; deployments that need the full trail register their
//! own sink.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use prov_core::{sha256_digest, Actor, CanonicalBytes, ContentDigest, OrgId, Timestamp, UserId};

// ---------------------------------------------------------------------------
// AuditEvent
// ---------------------------------------------------------------------------

/// Record of one successful mutating call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event identifier.
    pub id: Uuid,
    /// Acting organization.
    pub actor: OrgId,
    /// Acting user, when the caller supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserId>,
    /// Operation name, e.g. `split_batch`.
    pub action: String,
    /// Type of the primary entity touched.
    pub entity_type: String,
    /// Identifier of the primary entity touched.
    pub entity_id: String,
    /// Resulting state of the primary entity.
    pub result: String,
    /// Digest anchored for the primary entity, if anything was written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_ref: Option<ContentDigest>,
    /// When the operation committed.
    pub timestamp: Timestamp,
}

impl AuditEvent {
    /// A new event with a fresh identifier.
    pub fn new(
        actor: &Actor,
        action: &str,
        entity_type: &str,
        entity_id: &str,
        result: &str,
        anchor_ref: Option<ContentDigest>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor: actor.org_id.clone(),
            user: actor.user_id.clone(),
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            result: result.to_string(),
            anchor_ref,
            timestamp,
        }
    }

    /// Content digest of this event.
    ///
    /// Returns `None` if canonicalization fails.
    pub fn digest(&self) -> Option<ContentDigest> {
        match CanonicalBytes::new(self) {
            Ok(canonical) => Some(sha256_digest(&canonical)),
            Err(e) => {
                tracing::warn!(event_id = %self.id, error = %e, "audit event canonicalization failed");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Receiver of audit events.
pub trait AuditSink: Send + Sync {
    /// Record one event. Must not fail the operation that produced it.
    fn record(&self, event: &AuditEvent);
}

/// Bounded in-memory audit log.
pub struct AuditLog {
    events: RwLock<Vec<AuditEvent>>,
    capacity: usize,
}

impl AuditLog {
    /// A log holding at most `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            capacity: capacity.max(1),
        }
    }

    /// All retained events, oldest first.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.read().clone()
    }

    /// Events touching one entity, oldest first.
    pub fn for_entity(&self, entity_type: &str, entity_id: &str) -> Vec<AuditEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.entity_type == entity_type && e.entity_id == entity_id)
            .cloned()
            .collect()
    }

    /// Events for one action, oldest first.
    pub fn by_action(&self, action: &str) -> Vec<AuditEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.action == action)
            .cloned()
            .collect()
    }

    /// Events by one acting organization, oldest first.
    pub fn by_actor(&self, actor: &OrgId) -> Vec<AuditEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| &e.actor == actor)
            .cloned()
            .collect()
    }

    /// The last `n` events, oldest first.
    pub fn last_n(&self, n: usize) -> Vec<AuditEvent> {
        let events = self.events.read();
        let start = events.len().saturating_sub(n);
        events[start..].to_vec()
    }

    /// Number of retained events.
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every event.
    pub fn clear(&self) {
        self.events.write().clear();
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl AuditSink for AuditLog {
    fn record(&self, event: &AuditEvent) {
        let mut events = self.events.write();
        events.push(event.clone());
        if events.len() > self.capacity {
            let trim = (self.capacity / 10).max(1);
            events.drain(..trim);
        }
    }
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog")
            .field("events", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// Writes audit events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &AuditEvent) {
        let digest = event.digest().map(|d| d.to_string()).unwrap_or_default();
        tracing::info!(
            target: "prov::audit",
            event_id = %event.id,
            actor = %event.actor,
            action = %event.action,
            entity_type = %event.entity_type,
            entity_id = %event.entity_id,
            result = %event.result,
            digest = %digest,
            "audit"
        );
    }
}
