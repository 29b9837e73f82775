//! # Transporter Pool Entries
//!
//! Each manufacturer keeps a pool of transporter identities allowed to
//! carry its shipments. An entry is keyed by `(manufacturer, transporter)`
//! and is never deleted; a rejected entry can be re-opened by a new
//! request, and its history keeps every decision.
//!
//! ```text
//! request ──▶ Pending ──approve──▶ Approved
//!                │                    │
//!                └──reject──▶ Rejected ◀──reject (revoke)
//!                               │
//!             request again ◀───┘
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use prov_core::{Identity, OrgId, Timestamp};

use crate::transition::{TransitionEvidence, TransitionRecord};

/// Approval state of a pool entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    /// Requested, awaiting the manufacturer.
    Pending,
    /// In the manufacturer's active pool.
    Approved,
    /// Refused or revoked.
    Rejected,
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        };
        f.write_str(s)
    }
}

/// Errors raised by pool entry transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolEntryError {
    /// A request already exists (pending) or is moot (approved).
    #[error("transporter {transporter} already {status} for manufacturer {manufacturer}")]
    DuplicateRequest {
        /// The manufacturer whose pool was addressed.
        manufacturer: OrgId,
        /// The transporter identity.
        transporter: Identity,
        /// The entry's current status.
        status: ApprovalStatus,
    },

    /// Attempted transition is not valid from the current state.
    #[error("invalid pool entry transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status.
        from: ApprovalStatus,
        /// Attempted status.
        to: ApprovalStatus,
    },
}

/// Descriptive fields a transporter supplies with its request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransporterProfile {
    /// Display name of the carrier.
    pub name: String,
    /// Contact email or phone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    /// Transport licence number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_number: Option<String>,
    /// Vehicle kinds operated.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vehicle_types: Vec<String>,
}

/// One transporter's standing in one manufacturer's pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransporterPoolEntry {
    /// The manufacturer owning the pool.
    pub manufacturer: OrgId,
    /// The transporter's assigned identity.
    pub transporter: Identity,
    /// Profile as last supplied.
    pub profile: TransporterProfile,
    /// Current approval state.
    pub status: ApprovalStatus,
    /// Organization that filed the latest request.
    pub requested_by: OrgId,
    /// When the entry was first created.
    pub created_at: Timestamp,
    /// When the entry last changed.
    pub updated_at: Timestamp,
    /// Every decision taken on this entry.
    pub history: Vec<TransitionRecord<ApprovalStatus>>,
}

impl TransporterPoolEntry {
    /// A new pending request.
    pub fn request(
        manufacturer: OrgId,
        transporter: Identity,
        profile: TransporterProfile,
        evidence: &TransitionEvidence,
    ) -> Self {
        Self::with_status(manufacturer, transporter, profile, ApprovalStatus::Pending, evidence)
    }

    /// An entry added directly by the manufacturer, already approved.
    pub fn direct(
        manufacturer: OrgId,
        transporter: Identity,
        profile: TransporterProfile,
        evidence: &TransitionEvidence,
    ) -> Self {
        Self::with_status(manufacturer, transporter, profile, ApprovalStatus::Approved, evidence)
    }

    fn with_status(
        manufacturer: OrgId,
        transporter: Identity,
        profile: TransporterProfile,
        status: ApprovalStatus,
        evidence: &TransitionEvidence,
    ) -> Self {
        Self {
            manufacturer,
            transporter,
            profile,
            status,
            requested_by: evidence.actor.clone(),
            created_at: evidence.at,
            updated_at: evidence.at,
            history: vec![TransitionRecord::new(status, status, evidence)],
        }
    }

    /// Whether the transporter may currently carry for this manufacturer.
    pub fn is_approved(&self) -> bool {
        self.status == ApprovalStatus::Approved
    }

    /// File a new request against an existing entry.
    ///
    /// Only a rejected entry can be re-opened.
    pub fn reopen(
        &mut self,
        profile: TransporterProfile,
        evidence: &TransitionEvidence,
    ) -> Result<(), PoolEntryError> {
        if self.status != ApprovalStatus::Rejected {
            return Err(PoolEntryError::DuplicateRequest {
                manufacturer: self.manufacturer.clone(),
                transporter: self.transporter.clone(),
                status: self.status,
            });
        }
        self.profile = profile;
        self.requested_by = evidence.actor.clone();
        self.record(ApprovalStatus::Pending, evidence);
        Ok(())
    }

    /// Approve a pending request. Returns `false` if already approved.
    pub fn approve(&mut self, evidence: &TransitionEvidence) -> Result<bool, PoolEntryError> {
        match self.status {
            ApprovalStatus::Approved => Ok(false),
            ApprovalStatus::Pending => {
                self.record(ApprovalStatus::Approved, evidence);
                Ok(true)
            }
            ApprovalStatus::Rejected => Err(PoolEntryError::InvalidTransition {
                from: self.status,
                to: ApprovalStatus::Approved,
            }),
        }
    }

    /// Reject a pending request or revoke an approval.
    pub fn reject(&mut self, evidence: &TransitionEvidence) -> Result<(), PoolEntryError> {
        if self.status == ApprovalStatus::Rejected {
            return Err(PoolEntryError::InvalidTransition {
                from: self.status,
                to: ApprovalStatus::Rejected,
            });
        }
        self.record(ApprovalStatus::Rejected, evidence);
        Ok(())
    }

    /// Manufacturer admits the transporter directly, whatever the current
    /// state. Returns `false` if already approved.
    pub fn admit(&mut self, profile: TransporterProfile, evidence: &TransitionEvidence) -> bool {
        if self.is_approved() {
            return false;
        }
        self.profile = profile;
        self.record(ApprovalStatus::Approved, evidence);
        true
    }

    fn record(&mut self, to: ApprovalStatus, evidence: &TransitionEvidence) {
        self.history
            .push(TransitionRecord::new(self.status, to, evidence));
        self.status = to;
        self.updated_at = evidence.at;
    }
}
