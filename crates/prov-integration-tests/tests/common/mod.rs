//! Shared setup for the cross-crate tests.

#![allow(dead_code)]

use chrono::NaiveDate;

use prov_core::{Actor, BatchId, OrgId, OrgType, ProductId, Role, ShipmentId};
use prov_engine::{
    AuditConfig, BatchSpec, Engine, EngineConfig, IdentityBackend, OrganizationSpec, ProductSpec,
    ShipmentSpec,
};
use prov_state::TransporterProfile;

pub fn org(s: &str) -> OrgId {
    OrgId::new(s).unwrap()
}

pub fn bid(s: &str) -> BatchId {
    BatchId::new(s).unwrap()
}

pub fn sid(s: &str) -> ShipmentId {
    ShipmentId::new(s).unwrap()
}

/// An engine with a regulator and one participant of each kind onboarded,
/// product `P1` registered and batch `B1` of `quantity` units created.
pub struct World {
    pub engine: Engine,
    pub fda: Actor,
    pub mfr: Actor,
    pub dist: Actor,
    pub trans: Actor,
    pub shop: Actor,
}

impl World {
    pub fn new(quantity: u64) -> Self {
        let engine = Engine::new(EngineConfig {
            identity: IdentityBackend::Ed25519,
            audit: AuditConfig {
                tracing: false,
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap();
        let fda = Actor::new(org("fda"), Role::Regulator);
        let onboard = |id: &str, org_type: OrgType| {
            engine
                .directory()
                .onboard_organization(
                    &fda,
                    OrganizationSpec {
                        org_id: org(id),
                        org_type,
                        name: format!("{id} Ltd"),
                    },
                )
                .unwrap();
            Actor::new(org(id), org_type.default_role())
        };
        let mfr = onboard("mfr-1", OrgType::Manufacturer);
        let dist = onboard("dist-1", OrgType::Distributor);
        let trans = onboard("trans-1", OrgType::Transporter);
        let shop = onboard("shop-1", OrgType::Retailer);

        engine
            .registry()
            .register_product(
                &mfr,
                ProductSpec {
                    product_id: ProductId::new("P1").unwrap(),
                    name: "Vaccine".into(),
                    category: "vaccine".into(),
                    manufacturer: org("mfr-1"),
                    description: None,
                },
            )
            .unwrap();
        engine
            .registry()
            .create_batch(
                &mfr,
                BatchSpec {
                    batch_id: bid("B1"),
                    product_id: ProductId::new("P1").unwrap(),
                    quantity,
                    mfg_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                    exp_date: NaiveDate::from_ymd_opt(2027, 1, 1).unwrap(),
                    origin: "Plant A".into(),
                },
            )
            .unwrap();

        Self {
            engine,
            fda,
            mfr,
            dist,
            trans,
            shop,
        }
    }

    /// `trans-1` joins `mfr-1`'s pool, approved.
    pub fn approve_transporter(&self) {
        let identity = self.engine.directory().organization(&org("trans-1")).unwrap().identity;
        self.engine
            .authority()
            .add_transporter_to_pool(
                &self.mfr,
                &org("mfr-1"),
                &identity,
                TransporterProfile {
                    name: "Trans One".into(),
                    ..Default::default()
                },
            )
            .unwrap();
    }

    /// mfr-1 → dist-1 via trans-1.
    pub fn spec(&self, shipment: &str, batches: &[&str]) -> ShipmentSpec {
        ShipmentSpec {
            shipment_id: sid(shipment),
            batch_ids: batches.iter().map(|b| bid(b)).collect(),
            sender: org("mfr-1"),
            receiver: org("dist-1"),
            transporter: Some(org("trans-1")),
            conveyance: Default::default(),
            self_delivery: false,
            location: None,
        }
    }

    /// mfr-1 hands `batch` straight to shop-1 (self-delivery).
    pub fn hand_to_shop(&self, shipment: &str, batch: &str) {
        let mut spec = self.spec(shipment, &[batch]);
        spec.receiver = org("shop-1");
        spec.transporter = None;
        spec.self_delivery = true;
        spec.location = Some("shop counter".into());
        self.engine.custody().create_shipment(&self.mfr, spec).unwrap();
    }
}
