//! # Directory
//!
//! Onboarded organizations and the identities assigned to them.
//! Onboarding, suspension and reinstatement are regulator operations.

use serde::{Deserialize, Serialize};

use prov_core::{require_text, Actor, Identity, OrgId, OrgType};
use prov_state::{OrgStatus, Organization};

use crate::capability::{authorize, Operation};
use crate::engine::{Applied, Engine, Outcome};
use crate::error::EngineError;
use crate::ledger::Record;

/// Input to [`Directory::onboard_organization`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationSpec {
    /// Caller-chosen identifier.
    pub org_id: OrgId,
    /// Kind of participant.
    pub org_type: OrgType,
    /// Display name.
    pub name: String,
}

/// The identity an organization holds or would receive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletView {
    /// The organization.
    pub org_id: OrgId,
    /// Its identity.
    pub identity: Identity,
    /// `true` when the organization is onboarded; `false` for a preview of
    /// the pool address it would be assigned.
    pub assigned: bool,
}

/// Organization operations.
#[derive(Debug, Clone, Copy)]
pub struct Directory<'e> {
    engine: &'e Engine,
}

impl<'e> Directory<'e> {
    pub(crate) fn new(engine: &'e Engine) -> Self {
        Self { engine }
    }

    /// Onboard an organization and assign its identity.
    ///
    /// Identities are unique across organizations. When the resolver hands
    /// out an identity another organization already holds (a small wallet
    /// pool can map two ids onto one address) onboarding fails with
    /// [`EngineError::DuplicateId`] for entity `identity`.
    pub fn onboard_organization(
        &self,
        actor: &Actor,
        spec: OrganizationSpec,
    ) -> Result<Outcome<Organization>, EngineError> {
        self.engine
            .execute("onboard_organization", actor, move |tx, ev| {
                authorize(actor, &Operation::OnboardOrganization)?;
                let name = require_text("name", &spec.name)?;
                tx.ensure_absent::<Organization>(&spec.org_id)?;
                let identity = self
                    .engine
                    .resolver()
                    .resolve(&spec.org_id, spec.org_type)?;
                if let Some(holder) = tx.identity_holder(&identity) {
                    tracing::warn!(
                        org_id = %spec.org_id,
                        %identity,
                        held_by = %holder,
                        "identity already assigned"
                    );
                    return Err(EngineError::duplicate("identity", &identity));
                }
                let org = Organization::onboard(spec.org_id, spec.org_type, name, identity, ev);
                tx.put(org.clone());
                tracing::info!(
                    org_id = %org.id,
                    org_type = %org.org_type,
                    identity = %org.identity,
                    resolver = self.engine.resolver().kind(),
                    "organization onboarded"
                );
                let id = org.id.clone();
                let status = org.status;
                Ok(Applied::new(org, Organization::ENTITY, id, status))
            })
    }

    /// Bar an organization from acting.
    pub fn suspend_organization(
        &self,
        actor: &Actor,
        org_id: &OrgId,
        reason: &str,
    ) -> Result<Outcome<Organization>, EngineError> {
        self.set_status("suspend_organization", actor, org_id, OrgStatus::Suspended, reason)
    }

    /// Lift a suspension.
    pub fn reinstate_organization(
        &self,
        actor: &Actor,
        org_id: &OrgId,
        reason: &str,
    ) -> Result<Outcome<Organization>, EngineError> {
        self.set_status("reinstate_organization", actor, org_id, OrgStatus::Active, reason)
    }

    fn set_status(
        &self,
        operation: &'static str,
        actor: &Actor,
        org_id: &OrgId,
        to: OrgStatus,
        reason: &str,
    ) -> Result<Outcome<Organization>, EngineError> {
        self.engine.execute(operation, actor, |tx, ev| {
            let reason = require_text("reason", reason)?;
            let mut org: Organization = tx.require(org_id)?;
            authorize(actor, &Operation::SetOrganizationStatus)?;
            if org.set_status(to, &ev.with_reason(reason)) {
                tx.put(org.clone());
            }
            let status = org.status;
            Ok(Applied::new(org, Organization::ENTITY, org_id, status))
        })
    }

    // ─── Queries ────────────────────────────────────────────────────

    /// One organization.
    pub fn organization(&self, id: &OrgId) -> Result<Organization, EngineError> {
        self.engine
            .ledger()
            .get::<Organization>(id)
            .map(|v| v.value)
            .ok_or_else(|| EngineError::not_found(Organization::ENTITY, id))
    }

    /// Every onboarded organization.
    pub fn organizations(&self) -> Vec<Organization> {
        self.engine.ledger().list()
    }

    /// The identity `org_id` holds, or the pool address it would receive.
    pub fn wallet_for(&self, org_id: &OrgId) -> WalletView {
        match self.engine.ledger().get::<Organization>(org_id) {
            Some(org) => WalletView {
                org_id: org_id.clone(),
                identity: org.value.identity,
                assigned: true,
            },
            None => WalletView {
                org_id: org_id.clone(),
                identity: self.engine.wallet().assign(org_id),
                assigned: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::testing::*;
    use crate::ErrorKind;
    use prov_core::Role;

    fn spec(id: &str, org_type: OrgType) -> OrganizationSpec {
        OrganizationSpec {
            org_id: org(id),
            org_type,
            name: format!("{id} Ltd"),
        }
    }

    #[test]
    fn onboarding_assigns_identity_once() {
        let f = Fixture::new();
        let dir = f.engine.directory();
        let out = dir
            .onboard_organization(&f.regulator, spec("new-1", OrgType::Retailer))
            .unwrap();
        assert!(out.data.identity.as_str().starts_with("ed25519:"));
        assert!(out.data.is_active());

        let err = dir
            .onboard_organization(&f.regulator, spec("new-1", OrgType::Retailer))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateId);
        assert_eq!(dir.organization(&org("new-1")).unwrap().identity, out.data.identity);
    }

    #[test]
    fn only_regulators_onboard() {
        let f = Fixture::new();
        let err = f
            .engine
            .directory()
            .onboard_organization(&f.mfr, spec("new-1", OrgType::Retailer))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn wallet_pool_identities_are_deterministic() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        let regulator = Actor::new(org("fda"), Role::Regulator);
        let dir = engine.directory();
        let preview = dir.wallet_for(&org("mfr-9"));
        assert!(!preview.assigned);
        assert!(preview.identity.as_str().starts_with("0x"));

        let out = dir
            .onboard_organization(&regulator, spec("mfr-9", OrgType::Manufacturer))
            .unwrap();
        assert_eq!(out.data.identity, preview.identity);
        let view = dir.wallet_for(&org("mfr-9"));
        assert!(view.assigned);
        assert_eq!(view.identity, preview.identity);
    }

    #[test]
    fn colliding_pool_address_is_refused() {
        // trans-2 and trans-4 map onto the same address of the default pool.
        let engine = Engine::new(EngineConfig::default()).unwrap();
        let regulator = Actor::new(org("fda"), Role::Regulator);
        let dir = engine.directory();
        let shared = dir.wallet_for(&org("trans-2")).identity;
        assert_eq!(dir.wallet_for(&org("trans-4")).identity, shared);

        dir.onboard_organization(&regulator, spec("trans-2", OrgType::Transporter))
            .unwrap();
        let err = dir
            .onboard_organization(&regulator, spec("trans-4", OrgType::Transporter))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateId);
        assert!(err.to_string().contains(shared.as_str()));
        assert!(dir.organization(&org("trans-4")).is_err());
        assert!(!dir.wallet_for(&org("trans-4")).assigned);
        assert_eq!(engine.audit_log().by_action("onboard_organization").len(), 1);
    }

    #[test]
    fn approval_does_not_leak_to_a_colliding_id() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        let regulator = Actor::new(org("fda"), Role::Regulator);
        let dir = engine.directory();
        dir.onboard_organization(&regulator, spec("mfr-2", OrgType::Manufacturer))
            .unwrap();
        let carrier = dir
            .onboard_organization(&regulator, spec("trans-2", OrgType::Transporter))
            .unwrap()
            .data;
        let mfr = Actor::new(org("mfr-2"), Role::Manufacturer);
        engine
            .authority()
            .add_transporter_to_pool(
                &mfr,
                &org("mfr-2"),
                &carrier.identity,
                prov_state::TransporterProfile {
                    name: "Trans Two".into(),
                    ..Default::default()
                },
            )
            .unwrap();

        assert!(dir
            .onboard_organization(&regulator, spec("trans-4", OrgType::Transporter))
            .is_err());
        let impostor = Actor::new(org("trans-4"), Role::Transporter);
        let err = engine
            .authority()
            .request_transporter(
                &impostor,
                &org("mfr-2"),
                &carrier.identity,
                prov_state::TransporterProfile {
                    name: "Trans Four".into(),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert_eq!(engine.authority().pool(&org("mfr-2")).len(), 1);
    }

    #[test]
    fn suspended_organization_cannot_act() {
        let f = Fixture::new();
        let dir = f.engine.directory();
        let out = dir
            .suspend_organization(&f.regulator, &f.mfr.org_id, "licence lapsed")
            .unwrap();
        assert_eq!(out.data.status, OrgStatus::Suspended);

        let err = f
            .engine
            .registry()
            .register_product(&f.mfr, product_spec("P1"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        dir.reinstate_organization(&f.regulator, &f.mfr.org_id, "renewed")
            .unwrap();
        f.engine
            .registry()
            .register_product(&f.mfr, product_spec("P1"))
            .unwrap();
        assert_eq!(dir.organization(&f.mfr.org_id).unwrap().history.len(), 3);
    }

    #[test]
    fn actor_must_be_onboarded_with_matching_role() {
        let f = Fixture::new();
        let stranger = Actor::new(org("ghost"), Role::Manufacturer);
        let err = f
            .engine
            .registry()
            .register_product(&stranger, product_spec("P1"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        let posing = Actor::new(f.dist.org_id.clone(), Role::Manufacturer);
        let err = f
            .engine
            .registry()
            .register_product(&posing, product_spec("P1"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn organizations_listed_in_id_order() {
        let f = Fixture::new();
        let ids: Vec<_> = f
            .engine
            .directory()
            .organizations()
            .into_iter()
            .map(|o| o.id.to_string())
            .collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        assert_eq!(ids.len(), 4);
    }
}
