//! # Transition Records
//!
//! Every entity keeps an append-only history of what happened to it. A
//! record is written for each state change and for each mutation that
//! leaves the state unchanged (a split, a partial sale), in which case
//! `from_state == to_state`.

use serde::{Deserialize, Serialize};

use prov_core::{OrgId, Timestamp};

/// Who performed a transition, when, and why.
///
/// Timestamps are taken by the caller so that one engine operation stamps
/// every record it writes with the same instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionEvidence {
    /// Organization performing the transition.
    pub actor: OrgId,
    /// When the transition happened.
    pub at: Timestamp,
    /// Free-text reason recorded in history.
    pub reason: String,
}

impl TransitionEvidence {
    /// Evidence stamped with the current time.
    pub fn new(actor: OrgId, reason: impl Into<String>) -> Self {
        Self {
            actor,
            at: Timestamp::now(),
            reason: reason.into(),
        }
    }

    /// Override the timestamp.
    pub fn at(mut self, at: Timestamp) -> Self {
        self.at = at;
        self
    }

    /// Same actor and time, different reason.
    pub fn with_reason(&self, reason: impl Into<String>) -> Self {
        Self {
            actor: self.actor.clone(),
            at: self.at,
            reason: reason.into(),
        }
    }
}

/// Record of a single entity transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord<S> {
    /// State before the transition.
    pub from_state: S,
    /// State after the transition.
    pub to_state: S,
    /// When the transition occurred.
    pub timestamp: Timestamp,
    /// Organization that performed it.
    pub actor: OrgId,
    /// Reason for the transition.
    pub reason: String,
}

impl<S: Copy> TransitionRecord<S> {
    pub(crate) fn new(from: S, to: S, evidence: &TransitionEvidence) -> Self {
        Self {
            from_state: from,
            to_state: to,
            timestamp: evidence.at,
            actor: evidence.actor.clone(),
            reason: evidence.reason.clone(),
        }
    }
}
