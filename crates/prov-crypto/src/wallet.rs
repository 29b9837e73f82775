//! # Identity Assignment
//!
//! Organizations receive an address-like [`Identity`] at onboarding. Two
//! resolvers sit behind the [`IdentityResolver`] trait:
//!
//! - [`WalletAssigner`] maps an organization deterministically onto a fixed
//!   pool of addresses. The same `OrgId` always lands on the same address.
//!   The leading `reserved` entries belong to system and demo accounts and
//!   are never handed out. Pool addresses are labels, not key material.
//! - [`Ed25519Issuer`] generates a fresh Ed25519 key per organization and
//!   returns `ed25519:<public key hex>`. It can sign on the organization's
//!   behalf.
//!
//! ## Pool selection
//!
//! ```text
//! index = reserved + u64_be(SHA-256(org_id)[0..8]) mod (size - reserved)
//! ```
//!
//! Distinct organization ids may map onto one address when the pool is
//! small. The engine refuses to onboard a second holder of an address.

use std::collections::HashMap;

use ed25519_dalek::{Signer, Verifier};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use prov_core::{CanonicalBytes, Identity, OrgId, OrgType, ValidationError};

/// Prefix used when deriving pool addresses from a seed.
const POOL_DOMAIN: &str = "prov-wallet-pool";

/// Errors from identity assignment.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// The pool has no addresses.
    #[error("wallet pool is empty")]
    EmptyPool,

    /// Every address would be reserved.
    #[error("{reserved} reserved entries leave nothing in a pool of {size}")]
    ReservedExceedsPool {
        /// Configured reserved count.
        reserved: usize,
        /// Pool size.
        size: usize,
    },

    /// A configured address is not a valid identity.
    #[error("invalid pool address: {0}")]
    InvalidAddress(#[from] ValidationError),

    /// The issuer holds no key for the organization.
    #[error("no key issued for {0}")]
    UnknownOrganization(OrgId),

    /// A signature or public key could not be decoded.
    #[error("malformed key material: {0}")]
    MalformedKey(String),
}

/// Wallet pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Number of derived addresses. Ignored when `addresses` is non-empty.
    pub pool_size: usize,
    /// Leading entries never assigned to organizations.
    pub reserved: usize,
    /// Seed for address derivation.
    pub seed: String,
    /// Explicit pool. Overrides derivation when non-empty.
    pub addresses: Vec<String>,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            pool_size: 20,
            reserved: 2,
            seed: "default".to_string(),
            addresses: Vec::new(),
        }
    }
}

/// Pluggable source of organization identities.
pub trait IdentityResolver: Send + Sync {
    /// Identity for `org`. Must return the same identity for the same
    /// organization for the lifetime of the resolver.
    fn resolve(&self, org: &OrgId, org_type: OrgType) -> Result<Identity, WalletError>;

    /// Short name for logs.
    fn kind(&self) -> &'static str;
}

// ─── Pool assigner ───────────────────────────────────────────────────

/// Deterministic assignment over a fixed address pool.
#[derive(Debug, Clone)]
pub struct WalletAssigner {
    pool: Vec<Identity>,
    reserved: usize,
}

impl WalletAssigner {
    /// Build the pool described by `config`.
    pub fn new(config: &WalletConfig) -> Result<Self, WalletError> {
        let pool = if config.addresses.is_empty() {
            (0..config.pool_size)
                .map(|i| derive_address(&config.seed, i))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            config
                .addresses
                .iter()
                .map(Identity::new)
                .collect::<Result<Vec<_>, _>>()?
        };
        if pool.is_empty() {
            return Err(WalletError::EmptyPool);
        }
        if config.reserved >= pool.len() {
            return Err(WalletError::ReservedExceedsPool {
                reserved: config.reserved,
                size: pool.len(),
            });
        }
        Ok(Self {
            pool,
            reserved: config.reserved,
        })
    }

    /// The pool index `org` maps to. Always `>= reserved`.
    pub fn index_for(&self, org: &OrgId) -> usize {
        let hash = Sha256::digest(org.as_str().as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&hash[..8]);
        let assignable = (self.pool.len() - self.reserved) as u64;
        self.reserved + (u64::from_be_bytes(head) % assignable) as usize
    }

    /// The address assigned to `org`.
    pub fn assign(&self, org: &OrgId) -> Identity {
        self.pool[self.index_for(org)].clone()
    }

    /// Address at `index`, including reserved ones.
    pub fn address(&self, index: usize) -> Option<&Identity> {
        self.pool.get(index)
    }

    /// Total pool size.
    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    /// Number of reserved leading entries.
    pub fn reserved(&self) -> usize {
        self.reserved
    }
}

impl IdentityResolver for WalletAssigner {
    fn resolve(&self, org: &OrgId, _org_type: OrgType) -> Result<Identity, WalletError> {
        Ok(self.assign(org))
    }

    fn kind(&self) -> &'static str {
        "wallet-pool"
    }
}

fn derive_address(seed: &str, index: usize) -> Result<Identity, WalletError> {
    let hash = Sha256::digest(format!("{POOL_DOMAIN}:{seed}:{index}").as_bytes());
    Ok(Identity::new(format!("0x{}", to_hex(&hash[..20])))?)
}

// ─── Ed25519 issuer ──────────────────────────────────────────────────

/// Issues one Ed25519 key pair per organization.
///
/// Keys live in memory only; restarting the issuer forgets them.
#[derive(Default)]
pub struct Ed25519Issuer {
    keys: Mutex<HashMap<OrgId, ed25519_dalek::SigningKey>>,
}

impl Ed25519Issuer {
    /// An issuer holding no keys.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sign canonical bytes with the key issued to `org`. Returns hex.
    pub fn sign(&self, org: &OrgId, data: &CanonicalBytes) -> Result<String, WalletError> {
        let keys = self.keys.lock();
        let key = keys
            .get(org)
            .ok_or_else(|| WalletError::UnknownOrganization(org.clone()))?;
        Ok(to_hex(&key.sign(data.as_bytes()).to_bytes()))
    }

    /// Check a hex signature against an `ed25519:` identity.
    pub fn verify(
        identity: &Identity,
        data: &CanonicalBytes,
        signature_hex: &str,
    ) -> Result<bool, WalletError> {
        let key_hex = identity
            .as_str()
            .strip_prefix("ed25519:")
            .ok_or_else(|| WalletError::MalformedKey(identity.to_string()))?;
        let key_bytes: [u8; 32] = from_hex(key_hex)?
            .try_into()
            .map_err(|_| WalletError::MalformedKey("public key must be 32 bytes".into()))?;
        let sig_bytes: [u8; 64] = from_hex(signature_hex)?
            .try_into()
            .map_err(|_| WalletError::MalformedKey("signature must be 64 bytes".into()))?;
        let key = ed25519_dalek::VerifyingKey::from_bytes(&key_bytes)
            .map_err(|e| WalletError::MalformedKey(e.to_string()))?;
        let sig = ed25519_dalek::Signature::from_bytes(&sig_bytes);
        Ok(key.verify(data.as_bytes(), &sig).is_ok())
    }
}

impl std::fmt::Debug for Ed25519Issuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519Issuer")
            .field("issued", &self.keys.lock().len())
            .finish()
    }
}

impl IdentityResolver for Ed25519Issuer {
    fn resolve(&self, org: &OrgId, _org_type: OrgType) -> Result<Identity, WalletError> {
        let mut keys = self.keys.lock();
        let key = keys.entry(org.clone()).or_insert_with(|| {
            let mut csprng = rand::rngs::OsRng;
            ed25519_dalek::SigningKey::generate(&mut csprng)
        });
        let public = key.verifying_key().to_bytes();
        Ok(Identity::new(format!("ed25519:{}", to_hex(&public)))?)
    }

    fn kind(&self) -> &'static str {
        "ed25519"
    }
}

// ─── Hex helpers ─────────────────────────────────────────────────────

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn from_hex(hex: &str) -> Result<Vec<u8>, WalletError> {
    if hex.len() % 2 != 0 {
        return Err(WalletError::MalformedKey("odd-length hex".into()));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            hex.get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| WalletError::MalformedKey(format!("invalid hex at {i}")))
        })
        .collect()
}
