//! # prov-core: Foundational Types for the Provenance Engine
//!
//! Every other crate in the workspace depends on `prov-core`; it depends on
//! nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Validated newtypes for identifiers.** `OrgId`, `ProductId`,
//!    `BatchId`, `ShipmentId`, `UserId` and `Identity` are distinct types.
//!    A batch identifier cannot be passed where a shipment identifier is
//!    expected.
//!
//! 2. **`CanonicalBytes` newtype.** All digest computation flows through
//!    `CanonicalBytes::new()`, which applies JCS (RFC 8785) canonicalization
//!    and rejects floats. Anchored hashes are therefore reproducible by any
//!    party holding the same record.
//!
//! 3. **Closed `Role` enum.** Capability checks match on roles; there is no
//!    actor type hierarchy.
//!
//! 4. **UTC-only timestamps.** `Timestamp` is UTC with seconds precision.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `prov-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

#![deny(unsafe_code)]

pub mod canonical;
pub mod digest;
pub mod error;
pub mod identity;
pub mod role;
pub mod temporal;

pub use canonical::CanonicalBytes;
pub use digest::{sha256_digest, sha256_hex, ContentDigest, DigestAlgorithm};
pub use error::{CanonicalizationError, ProvError, ValidationError};
pub use identity::{require_text, BatchId, Identity, OrgId, ProductId, ShipmentId, UserId};
pub use role::{Actor, OrgType, Role};
pub use temporal::Timestamp;
