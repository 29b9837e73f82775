//! # prov-crypto: Integrity and Identity
//!
//! - **Anchoring** (`anchor.rs`): append-only SHA-256 anchor log over JCS
//!   canonical bytes, with idempotent re-anchoring, cross-record collision
//!   refusal, atomic multi-record anchoring and verification.
//! - **Identity** (`wallet.rs`): the [`IdentityResolver`] trait, the
//!   deterministic [`WalletAssigner`] pool, and the [`Ed25519Issuer`].
//!
//! Every digest is computed from [`CanonicalBytes`](prov_core::CanonicalBytes),
//! so anchored hashes are reproducible from the record alone.

pub mod anchor;
pub mod wallet;

pub use anchor::{
    AnchorError, AnchorReceipt, AnchorRecord, AnchorRequest, AnchorService, Verification,
    VerifyOutcome,
};
pub use wallet::{Ed25519Issuer, IdentityResolver, WalletAssigner, WalletConfig, WalletError};
