//! # Organizations
//!
//! An organization is onboarded once and receives an identity from the
//! configured resolver. The identity never changes afterwards. Only
//! `Active` organizations may act.

use serde::{Deserialize, Serialize};

use prov_core::{Identity, OrgId, OrgType, Timestamp};

use crate::transition::{TransitionEvidence, TransitionRecord};

/// Whether an organization may currently act.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrgStatus {
    /// May perform operations.
    Active,
    /// Barred by a regulator until reinstated.
    Suspended,
}

impl std::fmt::Display for OrgStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => f.write_str("ACTIVE"),
            Self::Suspended => f.write_str("SUSPENDED"),
        }
    }
}

/// An onboarded organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    /// Unique organization identifier.
    pub id: OrgId,
    /// Kind of participant.
    pub org_type: OrgType,
    /// Display name.
    pub name: String,
    /// Identity assigned at onboarding.
    pub identity: Identity,
    /// Current status.
    pub status: OrgStatus,
    /// When it was onboarded.
    pub created_at: Timestamp,
    /// When it last changed.
    pub updated_at: Timestamp,
    /// Status changes.
    pub history: Vec<TransitionRecord<OrgStatus>>,
}

impl Organization {
    /// A newly onboarded, active organization.
    pub fn onboard(
        id: OrgId,
        org_type: OrgType,
        name: String,
        identity: Identity,
        evidence: &TransitionEvidence,
    ) -> Self {
        Self {
            id,
            org_type,
            name,
            identity,
            status: OrgStatus::Active,
            created_at: evidence.at,
            updated_at: evidence.at,
            history: vec![TransitionRecord::new(
                OrgStatus::Active,
                OrgStatus::Active,
                evidence,
            )],
        }
    }

    /// Whether the organization may act.
    pub fn is_active(&self) -> bool {
        self.status == OrgStatus::Active
    }

    /// Set the status. Returns `false` when it was already `to`.
    pub fn set_status(&mut self, to: OrgStatus, evidence: &TransitionEvidence) -> bool {
        if self.status == to {
            return false;
        }
        self.history
            .push(TransitionRecord::new(self.status, to, evidence));
        self.status = to;
        self.updated_at = evidence.at;
        true
    }
}
