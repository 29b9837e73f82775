//! # Error Types
//!
//! Foundational errors shared by every crate in the workspace. Domain
//! crates (`prov-state`, `prov-crypto`, `prov-engine`) define their own
//! `thiserror` enums and convert from these where needed.

use thiserror::Error;

/// Top-level error type for the foundational layer.
#[derive(Error, Debug)]
pub enum ProvError {
    /// Canonicalization failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// An identifier or field failed validation.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A timestamp could not be parsed or is not UTC.
    #[error("invalid timestamp: {0}")]
    Timestamp(String),
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    #[error("float values are not permitted in canonical representations; use fixed-point integers: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Validation failure on a newtype constructor or parsed value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Identifier is empty after trimming.
    #[error("{kind} must not be empty")]
    EmptyIdentifier {
        /// The identifier kind (e.g. "batch_id").
        kind: &'static str,
    },

    /// Identifier exceeds the maximum length.
    #[error("{kind} exceeds {max} characters")]
    IdentifierTooLong {
        /// The identifier kind.
        kind: &'static str,
        /// Maximum permitted length.
        max: usize,
    },

    /// Identifier contains a character outside `[A-Za-z0-9._:-]`.
    #[error("{kind} contains invalid character {ch:?}")]
    InvalidCharacter {
        /// The identifier kind.
        kind: &'static str,
        /// The offending character.
        ch: char,
    },

    /// Unknown role name.
    #[error("unknown role: {0}")]
    UnknownRole(String),

    /// Unknown organization type.
    #[error("unknown organization type: {0}")]
    UnknownOrgType(String),

    /// A required free-text field is empty.
    #[error("{field} must not be empty")]
    EmptyField {
        /// The field name.
        field: &'static str,
    },

    /// Malformed content digest string.
    #[error("invalid digest: {0}")]
    InvalidDigest(String),
}
