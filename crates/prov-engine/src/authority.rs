//! # Transporter Authority
//!
//! Per-manufacturer pools of transporter identities. A transporter asks to
//! join; the manufacturer approves, rejects or adds directly. Only an
//! `Approved` entry lets the transporter carry that manufacturer's goods.
//! Entries are never deleted.

use prov_core::{require_text, Actor, Identity, OrgId, OrgType};
use prov_state::{ApprovalStatus, Organization, TransporterPoolEntry, TransporterProfile};

use crate::capability::{authorize, Operation};
use crate::engine::{Applied, Engine, Outcome};
use crate::error::EngineError;
use crate::ledger::{PoolKey, Record, Tx};

/// Transporter pool operations.
#[derive(Debug, Clone, Copy)]
pub struct TransporterAuthority<'e> {
    engine: &'e Engine,
}

impl<'e> TransporterAuthority<'e> {
    pub(crate) fn new(engine: &'e Engine) -> Self {
        Self { engine }
    }

    /// File a request to join `manufacturer`'s pool.
    ///
    /// Fails with `DuplicateRequest` while a request is pending or the
    /// transporter is already approved. A rejected entry is re-opened.
    pub fn request_transporter(
        &self,
        actor: &Actor,
        manufacturer: &OrgId,
        transporter: &Identity,
        profile: TransporterProfile,
    ) -> Result<Outcome<TransporterPoolEntry>, EngineError> {
        self.engine
            .execute("request_transporter", actor, move |tx, ev| {
                let profile = validate_profile(profile)?;
                require_manufacturer(tx, manufacturer)?;
                let own_identity = match tx.get::<Organization>(&actor.org_id) {
                    Some(org) => org.identity,
                    None => {
                        return Err(EngineError::Unauthorized(format!(
                            "{} has no onboarded identity to request with",
                            actor.org_id
                        )))
                    }
                };
                authorize(
                    actor,
                    &Operation::RequestTransporter {
                        own_identity: &own_identity,
                        requested: transporter,
                    },
                )?;
                let key = PoolKey::new(manufacturer.clone(), transporter.clone());
                let entry = match tx.get::<TransporterPoolEntry>(&key) {
                    Some(mut entry) => {
                        entry.reopen(profile, ev)?;
                        entry
                    }
                    None => TransporterPoolEntry::request(
                        manufacturer.clone(),
                        transporter.clone(),
                        profile,
                        ev,
                    ),
                };
                tx.put(entry.clone());
                Ok(entry_applied(entry, key))
            })
    }

    /// Approve a pending request. Approving an approved entry is a no-op.
    pub fn approve_transporter(
        &self,
        actor: &Actor,
        manufacturer: &OrgId,
        transporter: &Identity,
    ) -> Result<Outcome<TransporterPoolEntry>, EngineError> {
        self.engine
            .execute("approve_transporter", actor, |tx, ev| {
                let key = PoolKey::new(manufacturer.clone(), transporter.clone());
                let mut entry: TransporterPoolEntry = tx.require(&key)?;
                authorize(actor, &Operation::ApproveTransporter { manufacturer })?;
                if entry.approve(ev)? {
                    tx.put(entry.clone());
                } else {
                    tracing::debug!(pool_entry = %key, "already approved");
                }
                Ok(entry_applied(entry, key))
            })
    }

    /// Reject a pending request or revoke an approval.
    pub fn reject_transporter(
        &self,
        actor: &Actor,
        manufacturer: &OrgId,
        transporter: &Identity,
        reason: Option<&str>,
    ) -> Result<Outcome<TransporterPoolEntry>, EngineError> {
        self.engine
            .execute("reject_transporter", actor, |tx, ev| {
                let key = PoolKey::new(manufacturer.clone(), transporter.clone());
                let mut entry: TransporterPoolEntry = tx.require(&key)?;
                authorize(actor, &Operation::RejectTransporter { manufacturer })?;
                let ev = match reason.map(str::trim).filter(|r| !r.is_empty()) {
                    Some(r) => ev.with_reason(r),
                    None => ev.clone(),
                };
                entry.reject(&ev)?;
                tx.put(entry.clone());
                Ok(entry_applied(entry, key))
            })
    }

    /// Add a transporter to the pool directly, already approved.
    pub fn add_transporter_to_pool(
        &self,
        actor: &Actor,
        manufacturer: &OrgId,
        transporter: &Identity,
        profile: TransporterProfile,
    ) -> Result<Outcome<TransporterPoolEntry>, EngineError> {
        self.engine
            .execute("add_transporter_to_pool", actor, move |tx, ev| {
                let profile = validate_profile(profile)?;
                authorize(actor, &Operation::AddTransporterToPool { manufacturer })?;
                let key = PoolKey::new(manufacturer.clone(), transporter.clone());
                let entry = match tx.get::<TransporterPoolEntry>(&key) {
                    Some(mut entry) => {
                        if entry.admit(profile, ev) {
                            tx.put(entry.clone());
                        }
                        entry
                    }
                    None => {
                        let entry = TransporterPoolEntry::direct(
                            manufacturer.clone(),
                            transporter.clone(),
                            profile,
                            ev,
                        );
                        tx.put(entry.clone());
                        entry
                    }
                };
                Ok(entry_applied(entry, key))
            })
    }

    // ─── Queries ────────────────────────────────────────────────────

    /// Whether `transporter` is approved in `manufacturer`'s pool.
    pub fn is_authorized(&self, manufacturer: &OrgId, transporter: &Identity) -> bool {
        self.entry(manufacturer, transporter)
            .is_some_and(|e| e.is_approved())
    }

    /// One pool entry.
    pub fn entry(&self, manufacturer: &OrgId, transporter: &Identity) -> Option<TransporterPoolEntry> {
        let key = PoolKey::new(manufacturer.clone(), transporter.clone());
        self.engine
            .ledger()
            .get::<TransporterPoolEntry>(&key)
            .map(|v| v.value)
    }

    /// Every entry in `manufacturer`'s pool, in any state.
    pub fn pool(&self, manufacturer: &OrgId) -> Vec<TransporterPoolEntry> {
        self.engine
            .ledger()
            .scan(|e: &TransporterPoolEntry| &e.manufacturer == manufacturer)
    }

    /// Entries awaiting `manufacturer`'s decision.
    pub fn pending_requests(&self, manufacturer: &OrgId) -> Vec<TransporterPoolEntry> {
        self.engine.ledger().scan(|e: &TransporterPoolEntry| {
            &e.manufacturer == manufacturer && e.status == ApprovalStatus::Pending
        })
    }

    /// Whether `transporter` is approved in `pool_owner`'s pool, reading
    /// through `tx` so a concurrent revocation conflicts at commit.
    pub(crate) fn approved_in(
        tx: &mut Tx<'_>,
        pool_owner: &OrgId,
        transporter: &Identity,
    ) -> bool {
        let key = PoolKey::new(pool_owner.clone(), transporter.clone());
        tx.get::<TransporterPoolEntry>(&key)
            .is_some_and(|e| e.is_approved())
    }
}

fn validate_profile(mut profile: TransporterProfile) -> Result<TransporterProfile, EngineError> {
    profile.name = require_text("profile.name", &profile.name)?;
    Ok(profile)
}

fn require_manufacturer(tx: &mut Tx<'_>, manufacturer: &OrgId) -> Result<(), EngineError> {
    let org: Organization = tx.require(manufacturer)?;
    if org.org_type != OrgType::Manufacturer {
        return Err(EngineError::Validation(format!(
            "{} is a {}, not a manufacturer",
            org.id, org.org_type
        )));
    }
    Ok(())
}

fn entry_applied(entry: TransporterPoolEntry, key: PoolKey) -> Applied<TransporterPoolEntry> {
    let status = entry.status;
    Applied::new(entry, TransporterPoolEntry::ENTITY, key, status)
}
