//! # Hash Anchoring
//!
//! The [`AnchorService`] keeps an append-only log of content digests of
//! off-chain records. Any party holding a record can later recompute its
//! digest and ask whether it matches what was anchored.
//!
//! ## Rules
//!
//! - The digest is SHA-256 over the JCS canonical bytes of the payload.
//! - Anchoring a `(data_id, hash)` pair that is already present is a no-op
//!   success.
//! - A hash already anchored under a different `data_id` is refused with
//!   [`AnchorError::DuplicateHash`]; a digest names exactly one record.
//! - Records are never updated or removed. A correction is a new anchor for
//!   the same `data_id`; verification compares against the latest one and
//!   every earlier record stays queryable through [`AnchorService::history`].
//!
//! The ledger in `prov-engine` anchors the records written by an operation
//! through [`AnchorService::anchor_all`] while holding its commit lock, so a
//! failed commit leaves no anchor behind.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use prov_core::{sha256_digest, CanonicalBytes, CanonicalizationError, ContentDigest, OrgId, Timestamp};

/// Errors from anchoring operations.
#[derive(Error, Debug)]
pub enum AnchorError {
    /// The digest is already anchored for another record.
    #[error("hash {hash} is already anchored for {existing_data_id}, refused for {data_id}")]
    DuplicateHash {
        /// The colliding digest.
        hash: ContentDigest,
        /// The record that owns the digest.
        existing_data_id: String,
        /// The record that attempted to reuse it.
        data_id: String,
    },

    /// The payload could not be canonicalized.
    #[error("payload canonicalization failed: {0}")]
    Canonicalization(#[from] CanonicalizationError),
}

/// An immutable anchor record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorRecord {
    /// Position in the anchor log, starting at 1.
    pub seq: u64,
    /// SHA-256 of the canonical payload.
    pub data_hash: ContentDigest,
    /// Kind of record anchored (`batch`, `shipment`, ...).
    pub data_type: String,
    /// Identifier of the anchored record, e.g. `batch:B1`.
    pub data_id: String,
    /// When the anchor was written.
    pub created_at: Timestamp,
    /// Organization whose operation produced the record.
    pub source: OrgId,
}

/// A record digest waiting to be anchored.
///
/// The payload is canonicalized and hashed on construction, so a batch of
/// requests can be prepared before any lock is taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorRequest {
    /// Kind of record.
    pub data_type: String,
    /// Record identifier.
    pub data_id: String,
    /// Digest of the canonical payload.
    pub data_hash: ContentDigest,
    /// Originating organization.
    pub source: OrgId,
}

impl AnchorRequest {
    /// Canonicalize and hash `payload`.
    pub fn new(
        data_type: impl Into<String>,
        data_id: impl Into<String>,
        payload: &impl Serialize,
        source: OrgId,
    ) -> Result<Self, AnchorError> {
        let canonical = CanonicalBytes::new(payload)?;
        Ok(Self {
            data_type: data_type.into(),
            data_id: data_id.into(),
            data_hash: sha256_digest(&canonical),
            source,
        })
    }
}

/// The result of anchoring one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorReceipt {
    /// The stored record (pre-existing on an idempotent re-anchor).
    pub record: AnchorRecord,
    /// `false` when the `(data_id, hash)` pair was already anchored.
    pub newly_anchored: bool,
}

/// Outcome of an integrity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerifyOutcome {
    /// The payload hashes to the latest anchor for the record.
    Match,
    /// The record was anchored with a different hash.
    Mismatch,
    /// Nothing was ever anchored for the record.
    NotFound,
}

/// Detailed verification result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    /// The verdict.
    pub outcome: VerifyOutcome,
    /// Record identifier checked.
    pub data_id: String,
    /// Digest of the presented payload.
    pub computed: ContentDigest,
    /// The latest anchored record, if any.
    pub anchored: Option<AnchorRecord>,
}

#[derive(Debug, Default)]
struct AnchorLog {
    records: Vec<AnchorRecord>,
    by_hash: HashMap<ContentDigest, usize>,
    by_id: HashMap<String, Vec<usize>>,
}

impl AnchorLog {
    /// Check a request against the log. `Ok(Some(i))` is an existing record.
    fn check(&self, req: &AnchorRequest) -> Result<Option<usize>, AnchorError> {
        match self.by_hash.get(&req.data_hash) {
            Some(&i) if self.records[i].data_id == req.data_id => Ok(Some(i)),
            Some(&i) => Err(AnchorError::DuplicateHash {
                hash: req.data_hash,
                existing_data_id: self.records[i].data_id.clone(),
                data_id: req.data_id.clone(),
            }),
            None => Ok(None),
        }
    }

    fn push(&mut self, req: AnchorRequest, at: Timestamp) -> usize {
        let index = self.records.len();
        self.records.push(AnchorRecord {
            seq: index as u64 + 1,
            data_hash: req.data_hash,
            data_type: req.data_type,
            data_id: req.data_id.clone(),
            created_at: at,
            source: req.source,
        });
        self.by_hash.insert(req.data_hash, index);
        self.by_id.entry(req.data_id).or_default().push(index);
        index
    }

    fn latest(&self, data_id: &str) -> Option<&AnchorRecord> {
        self.by_id
            .get(data_id)
            .and_then(|ix| ix.last())
            .map(|&i| &self.records[i])
    }
}

/// Append-only, insert-if-absent store of anchor records.
#[derive(Debug, Default)]
pub struct AnchorService {
    log: RwLock<AnchorLog>,
}

impl AnchorService {
    /// An empty anchor log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonicalize, hash and anchor a single payload.
    pub fn anchor(
        &self,
        data_type: &str,
        data_id: &str,
        payload: &impl Serialize,
        source: &OrgId,
    ) -> Result<AnchorReceipt, AnchorError> {
        let request = AnchorRequest::new(data_type, data_id, payload, source.clone())?;
        let mut log = self.log.write();
        let (index, newly_anchored) = match log.check(&request)? {
            Some(i) => (i, false),
            None => (log.push(request, Timestamp::now()), true),
        };
        Ok(AnchorReceipt {
            record: log.records[index].clone(),
            newly_anchored,
        })
    }

    /// Anchor every request or none of them.
    ///
    /// All requests are checked against the log and against each other
    /// before anything is written. Receipts come back in request order.
    pub fn anchor_all(
        &self,
        requests: Vec<AnchorRequest>,
    ) -> Result<Vec<AnchorReceipt>, AnchorError> {
        let mut log = self.log.write();

        let mut in_batch: HashMap<ContentDigest, &str> = HashMap::new();
        let mut existing = Vec::with_capacity(requests.len());
        for req in &requests {
            let found = log.check(req)?;
            if found.is_none() {
                if let Some(other) = in_batch.get(&req.data_hash) {
                    if *other != req.data_id {
                        return Err(AnchorError::DuplicateHash {
                            hash: req.data_hash,
                            existing_data_id: (*other).to_string(),
                            data_id: req.data_id.clone(),
                        });
                    }
                }
                in_batch.insert(req.data_hash, &req.data_id);
            }
            existing.push(found);
        }
        drop(in_batch);

        let at = Timestamp::now();
        let mut receipts = Vec::with_capacity(requests.len());
        for (req, found) in requests.into_iter().zip(existing) {
            let (index, newly_anchored) = match found {
                Some(i) => (i, false),
                // A duplicate inside the same batch resolves to the first copy.
                None => {
                    let prior = log.by_hash.get(&req.data_hash).copied();
                    match prior {
                        Some(i) => (i, false),
                        None => (log.push(req, at), true),
                    }
                }
            };
            receipts.push(AnchorReceipt {
                record: log.records[index].clone(),
                newly_anchored,
            });
        }
        Ok(receipts)
    }

    /// Verify `payload` against the latest anchor for `data_id`.
    pub fn verify(
        &self,
        data_id: &str,
        payload: &impl Serialize,
    ) -> Result<Verification, AnchorError> {
        let computed = sha256_digest(&CanonicalBytes::new(payload)?);
        Ok(self.verify_digest(data_id, computed))
    }

    /// Verify a precomputed digest against the latest anchor for `data_id`.
    pub fn verify_digest(&self, data_id: &str, computed: ContentDigest) -> Verification {
        let log = self.log.read();
        let anchored = log.latest(data_id).cloned();
        let outcome = match &anchored {
            None => VerifyOutcome::NotFound,
            Some(rec) if rec.data_hash == computed => VerifyOutcome::Match,
            Some(_) => VerifyOutcome::Mismatch,
        };
        Verification {
            outcome,
            data_id: data_id.to_string(),
            computed,
            anchored,
        }
    }

    /// All records for `data_id`, oldest first.
    pub fn history(&self, data_id: &str) -> Vec<AnchorRecord> {
        let log = self.log.read();
        log.by_id
            .get(data_id)
            .map(|ix| ix.iter().map(|&i| log.records[i].clone()).collect())
            .unwrap_or_default()
    }

    /// The latest record for `data_id`.
    pub fn latest(&self, data_id: &str) -> Option<AnchorRecord> {
        self.log.read().latest(data_id).cloned()
    }

    /// Look a record up by its hash.
    pub fn record(&self, hash: &ContentDigest) -> Option<AnchorRecord> {
        let log = self.log.read();
        log.by_hash.get(hash).map(|&i| log.records[i].clone())
    }

    /// The most recent `limit` records, newest first.
    pub fn recent(&self, limit: usize) -> Vec<AnchorRecord> {
        self.log.read().records.iter().rev().take(limit).cloned().collect()
    }

    /// Number of records in the log.
    pub fn len(&self) -> usize {
        self.log.read().records.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every record. Only for engine reset.
    pub fn clear(&self) {
        *self.log.write() = AnchorLog::default();
    }
}
