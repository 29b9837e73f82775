//! Shared fixtures for the engine's unit tests.

use chrono::NaiveDate;

use prov_core::{Actor, BatchId, Identity, OrgId, OrgType, ProductId, Role, ShipmentId};
use prov_state::{Batch, Conveyance, Product, TransporterProfile};

use crate::config::{EngineConfig, IdentityBackend};
use crate::custody::ShipmentSpec;
use crate::directory::OrganizationSpec;
use crate::registry::{BatchSpec, ProductSpec};
use crate::Engine;

pub(crate) fn org(s: &str) -> OrgId {
    OrgId::new(s).unwrap()
}

pub(crate) fn bid(s: &str) -> BatchId {
    BatchId::new(s).unwrap()
}

pub(crate) fn sid(s: &str) -> ShipmentId {
    ShipmentId::new(s).unwrap()
}

pub(crate) fn pid(s: &str) -> ProductId {
    ProductId::new(s).unwrap()
}

pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// A product of `mfr-1`.
pub(crate) fn product_spec(id: &str) -> ProductSpec {
    ProductSpec {
        product_id: pid(id),
        name: format!("{id} vaccine"),
        category: "vaccine".into(),
        manufacturer: org("mfr-1"),
        description: None,
    }
}

pub(crate) fn batch_spec(id: &str, product: &str, quantity: u64) -> BatchSpec {
    BatchSpec {
        batch_id: bid(id),
        product_id: pid(product),
        quantity,
        mfg_date: date(2026, 1, 1),
        exp_date: date(2027, 1, 1),
        origin: "Plant A".into(),
    }
}

/// A carrier shipment sent by `mfr-1`.
pub(crate) fn shipment_spec(
    id: &str,
    batches: &[&str],
    receiver: &Actor,
    transporter: Option<&Actor>,
) -> ShipmentSpec {
    ShipmentSpec {
        shipment_id: sid(id),
        batch_ids: batches.iter().map(|b| bid(b)).collect(),
        sender: org("mfr-1"),
        receiver: receiver.org_id.clone(),
        transporter: transporter.map(|t| t.org_id.clone()),
        conveyance: Conveyance {
            vehicle_id: Some("TRK-7".into()),
            ..Default::default()
        },
        self_delivery: false,
        location: None,
    }
}

/// An engine with one regulator and one onboarded organization per
/// participant type.
pub(crate) struct Fixture {
    pub engine: Engine,
    pub regulator: Actor,
    pub mfr: Actor,
    pub dist: Actor,
    pub trans: Actor,
    pub shop: Actor,
}

impl Fixture {
    pub fn new() -> Self {
        let config = EngineConfig {
            identity: IdentityBackend::Ed25519,
            audit: crate::config::AuditConfig {
                tracing: false,
                ..Default::default()
            },
            ..Default::default()
        };
        let engine = Engine::new(config).unwrap();
        let regulator = Actor::new(org("fda"), Role::Regulator);
        let mut f = Self {
            engine,
            regulator,
            mfr: Actor::new(org("mfr-1"), Role::Manufacturer),
            dist: Actor::new(org("dist-1"), Role::Distributor),
            trans: Actor::new(org("trans-1"), Role::Transporter),
            shop: Actor::new(org("shop-1"), Role::Retailer),
        };
        f.mfr = f.onboard("mfr-1", OrgType::Manufacturer);
        f.dist = f.onboard("dist-1", OrgType::Distributor);
        f.trans = f.onboard("trans-1", OrgType::Transporter);
        f.shop = f.onboard("shop-1", OrgType::Retailer);
        f
    }

    /// Onboard `id` and return an actor holding the matching role.
    pub fn onboard(&self, id: &str, org_type: OrgType) -> Actor {
        self.engine
            .directory()
            .onboard_organization(
                &self.regulator,
                OrganizationSpec {
                    org_id: org(id),
                    org_type,
                    name: format!("{id} Ltd"),
                },
            )
            .unwrap();
        Actor::new(org(id), org_type.default_role())
    }

    pub fn product(&self, id: &str) -> Product {
        self.engine
            .registry()
            .register_product(&self.mfr, product_spec(id))
            .unwrap()
            .data
    }

    pub fn batch(&self, id: &str, product: &str, quantity: u64) -> Batch {
        self.engine
            .registry()
            .create_batch(&self.mfr, batch_spec(id, product, quantity))
            .unwrap()
            .data
    }

    pub fn identity_of(&self, actor: &Actor) -> Identity {
        self.engine
            .directory()
            .organization(&actor.org_id)
            .unwrap()
            .identity
    }

    /// Put `trans-1` in `mfr-1`'s pool.
    pub fn approve_transporter(&self) {
        let ident = self.identity_of(&self.trans);
        self.engine
            .authority()
            .add_transporter_to_pool(
                &self.mfr,
                &self.mfr.org_id,
                &ident,
                TransporterProfile {
                    name: "Trans One".into(),
                    ..Default::default()
                },
            )
            .unwrap();
    }

    /// `mfr-1` ships `batches` to `dist-1` with `trans-1`.
    pub fn ship(&self, id: &str, batches: &[&str]) {
        self.engine
            .custody()
            .create_shipment(&self.mfr, shipment_spec(id, batches, &self.dist, Some(&self.trans)))
            .unwrap();
    }

    /// Hand `batch` from its owner `from` to `to` by self-delivery.
    pub fn hand_over(&self, shipment: &str, batch: &str, from: &Actor, to: &Actor) {
        let spec = ShipmentSpec {
            shipment_id: sid(shipment),
            batch_ids: vec![bid(batch)],
            sender: from.org_id.clone(),
            receiver: to.org_id.clone(),
            transporter: None,
            conveyance: Conveyance::default(),
            self_delivery: true,
            location: Some("loading dock".into()),
        };
        self.engine.custody().create_shipment(from, spec).unwrap();
    }
}
