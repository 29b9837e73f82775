//! # Engine Errors
//!
//! [`EngineError`] is the single error type returned by every engine
//! operation. Errors from the lower crates are folded into it so callers
//! only ever branch on [`ErrorKind`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use prov_core::{BatchId, ContentDigest, ValidationError};
use prov_crypto::{AnchorError, WalletError};
use prov_state::{BatchError, PoolEntryError, ShipmentError};

/// The stable error taxonomy exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The referenced entity does not exist.
    NotFound,
    /// The actor may not perform the operation.
    Unauthorized,
    /// The entity's current state does not allow the operation.
    InvalidTransition,
    /// A quantity of zero was supplied.
    InvalidQuantity,
    /// More was requested than a batch holds.
    InsufficientQuantity,
    /// The identifier is already taken.
    DuplicateId,
    /// A transporter request already exists for the pair.
    DuplicateRequest,
    /// The record's hash is already anchored for another record.
    DuplicateHash,
    /// A referenced batch has been recalled.
    Recalled,
    /// A row changed between read and commit. Retryable.
    Conflict,
    /// Malformed input.
    Validation,
    /// Unexpected failure inside the engine.
    Internal,
}

impl ErrorKind {
    /// Stable name, used as a metrics label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "NotFound",
            Self::Unauthorized => "Unauthorized",
            Self::InvalidTransition => "InvalidTransition",
            Self::InvalidQuantity => "InvalidQuantity",
            Self::InsufficientQuantity => "InsufficientQuantity",
            Self::DuplicateId => "DuplicateId",
            Self::DuplicateRequest => "DuplicateRequest",
            Self::DuplicateHash => "DuplicateHash",
            Self::Recalled => "Recalled",
            Self::Conflict => "Conflict",
            Self::Validation => "Validation",
            Self::Internal => "Internal",
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by engine operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Entity not found.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity type.
        entity: &'static str,
        /// Requested identifier.
        id: String,
    },

    /// The actor is not allowed to perform the operation.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The operation is not valid in the entity's current state.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// Zero quantity.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    /// Not enough units in the batch.
    #[error("batch {batch_id} holds {available}, {requested} requested")]
    InsufficientQuantity {
        /// The batch.
        batch_id: BatchId,
        /// Quantity requested.
        requested: u64,
        /// Quantity available.
        available: u64,
    },

    /// Identifier already in use.
    #[error("{entity} {id} already exists")]
    DuplicateId {
        /// Entity type.
        entity: &'static str,
        /// The identifier.
        id: String,
    },

    /// Pending or approved transporter entry already exists.
    #[error("duplicate request: {0}")]
    DuplicateRequest(String),

    /// Content digest already anchored for another record.
    #[error("hash {hash} already anchored for {existing_data_id}")]
    DuplicateHash {
        /// The colliding digest.
        hash: ContentDigest,
        /// The record that owns it.
        existing_data_id: String,
    },

    /// A referenced batch is recalled.
    #[error("batch {batch_id} has been recalled")]
    Recalled {
        /// The recalled batch.
        batch_id: BatchId,
    },

    /// Optimistic concurrency failure.
    #[error("{entity} {id} was modified concurrently")]
    Conflict {
        /// Entity type.
        entity: &'static str,
        /// The identifier.
        id: String,
    },

    /// Malformed input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// The taxonomy bucket of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::InvalidTransition(_) => ErrorKind::InvalidTransition,
            Self::InvalidQuantity(_) => ErrorKind::InvalidQuantity,
            Self::InsufficientQuantity { .. } => ErrorKind::InsufficientQuantity,
            Self::DuplicateId { .. } => ErrorKind::DuplicateId,
            Self::DuplicateRequest(_) => ErrorKind::DuplicateRequest,
            Self::DuplicateHash { .. } => ErrorKind::DuplicateHash,
            Self::Recalled { .. } => ErrorKind::Recalled,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn duplicate(entity: &'static str, id: impl std::fmt::Display) -> Self {
        Self::DuplicateId {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<BatchError> for EngineError {
    fn from(err: BatchError) -> Self {
        match err {
            BatchError::Recalled { batch_id } => Self::Recalled { batch_id },
            BatchError::InsufficientQuantity {
                batch_id,
                requested,
                available,
            } => Self::InsufficientQuantity {
                batch_id,
                requested,
                available,
            },
            BatchError::InvalidQuantity { .. } => Self::InvalidQuantity(err.to_string()),
            BatchError::InvalidDates { .. } => Self::Validation(err.to_string()),
            BatchError::Terminal { .. }
            | BatchError::InvalidTransition { .. }
            | BatchError::Reserved { .. }
            | BatchError::NotReservedBy { .. }
            | BatchError::NotExpired { .. } => Self::InvalidTransition(err.to_string()),
        }
    }
}

impl From<ShipmentError> for EngineError {
    fn from(err: ShipmentError) -> Self {
        match err {
            ShipmentError::InvalidTransition { .. } | ShipmentError::NotSelfDelivery(_) => {
                Self::InvalidTransition(err.to_string())
            }
            ShipmentError::EmptyBatchList
            | ShipmentError::DuplicateBatch(_)
            | ShipmentError::SameParty(_)
            | ShipmentError::MissingTransporter => Self::Validation(err.to_string()),
        }
    }
}

impl From<PoolEntryError> for EngineError {
    fn from(err: PoolEntryError) -> Self {
        match err {
            PoolEntryError::DuplicateRequest { .. } => Self::DuplicateRequest(err.to_string()),
            PoolEntryError::InvalidTransition { .. } => Self::InvalidTransition(err.to_string()),
        }
    }
}

impl From<AnchorError> for EngineError {
    fn from(err: AnchorError) -> Self {
        match err {
            AnchorError::DuplicateHash {
                hash,
                existing_data_id,
                ..
            } => Self::DuplicateHash {
                hash,
                existing_data_id,
            },
            AnchorError::Canonicalization(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<WalletError> for EngineError {
    fn from(err: WalletError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}
