//! # Default Wallet Pool
//!
//! The engine as `prov replay` and `prov-api` build it when no
//! configuration is given: identities come from the 20-address wallet pool
//! with two reserved entries. Ids that land on one address cannot both be
//! onboarded, so an approval can never reach a second organization.

mod common;

use std::thread;

use chrono::NaiveDate;

use common::{bid, org, sid};
use prov_core::{Actor, OrgType, ProductId, Role};
use prov_engine::{
    BatchSpec, Engine, EngineConfig, ErrorKind, OrganizationSpec, ProductSpec, ShipmentSpec,
};
use prov_state::{BatchStatus, ShipmentStatus, TransitReading, TransporterProfile};

fn onboard(engine: &Engine, fda: &Actor, id: &str, org_type: OrgType) -> Actor {
    engine
        .directory()
        .onboard_organization(
            fda,
            OrganizationSpec {
                org_id: org(id),
                org_type,
                name: format!("{id} Ltd"),
            },
        )
        .unwrap();
    Actor::new(org(id), org_type.default_role())
}

#[test]
fn carrier_flow_on_the_default_pool() {
    let engine = Engine::new(EngineConfig::default()).unwrap();
    let fda = Actor::new(org("fda"), Role::Regulator);
    let mfr = onboard(&engine, &fda, "mfr-1", OrgType::Manufacturer);
    let dist = onboard(&engine, &fda, "dist-1", OrgType::Distributor);
    let trans = onboard(&engine, &fda, "trans-3", OrgType::Transporter);

    let dir = engine.directory();
    let mut identities: Vec<_> = dir.organizations().into_iter().map(|o| o.identity).collect();
    assert!(identities.iter().all(|i| i.as_str().starts_with("0x")));
    identities.sort();
    identities.dedup();
    assert_eq!(identities.len(), 3);

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
                quantity: 50,
                mfg_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                exp_date: NaiveDate::from_ymd_opt(2027, 1, 1).unwrap(),
                origin: "Plant A".into(),
            },
        )
        .unwrap();

    let carrier = dir.organization(&org("trans-3")).unwrap().identity;
    let authority = engine.authority();
    authority
        .request_transporter(
            &trans,
            &org("mfr-1"),
            &carrier,
            TransporterProfile {
                name: "Fast Freight".into(),
                ..Default::default()
            },
        )
        .unwrap();
    authority.approve_transporter(&mfr, &org("mfr-1"), &carrier).unwrap();
    assert!(authority.is_authorized(&org("mfr-1"), &carrier));
    let shipper = dir.organization(&org("mfr-1")).unwrap().identity;
    assert!(!authority.is_authorized(&org("mfr-1"), &shipper));

    let custody = engine.custody();
    let s1 = sid("S1");
    custody
        .create_shipment(
            &mfr,
            ShipmentSpec {
                shipment_id: s1.clone(),
                batch_ids: vec![bid("B1")],
                sender: org("mfr-1"),
                receiver: org("dist-1"),
                transporter: Some(org("trans-3")),
                conveyance: Default::default(),
                self_delivery: false,
                location: None,
            },
        )
        .unwrap();
    custody.confirm_pickup(&trans, &s1, "Plant A").unwrap();
    custody
        .log_transit(
            &trans,
            &s1,
            TransitReading {
                location: "Highway 5".into(),
                temperature_centi_c: 450,
                humidity_centi_pct: 5000,
            },
        )
        .unwrap();
    custody.complete_delivery(&trans, &s1, "Depot", None).unwrap();
    let out = custody.accept_delivery(&dist, &s1, "Depot").unwrap();
    assert_eq!(out.data.status, ShipmentStatus::Accepted);

    let batch = engine.registry().batch(&bid("B1")).unwrap();
    assert_eq!(batch.owner, org("dist-1"));
    assert_eq!(batch.status, BatchStatus::Delivered);
    assert_eq!(engine.audit_log().by_action("accept_delivery").len(), 1);
}

#[test]
fn id_sharing_an_address_with_an_onboarded_org_is_refused() {
    let engine = Engine::new(EngineConfig::default()).unwrap();
    let fda = Actor::new(org("fda"), Role::Regulator);
    onboard(&engine, &fda, "mfr-1", OrgType::Manufacturer);

    // trans-1 maps onto mfr-1's address.
    let dir = engine.directory();
    assert_eq!(
        dir.wallet_for(&org("trans-1")).identity,
        dir.wallet_for(&org("mfr-1")).identity
    );
    let err = dir
        .onboard_organization(
            &fda,
            OrganizationSpec {
                org_id: org("trans-1"),
                org_type: OrgType::Transporter,
                name: "Trans One".into(),
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateId);
    assert_eq!(dir.organizations().len(), 1);
}

#[test]
fn racing_onboardings_of_one_address_admit_one() {
    let engine = Engine::new(EngineConfig::default()).unwrap();
    let handles: Vec<_> = ["trans-2", "trans-4"]
        .into_iter()
        .map(|id| {
            let engine = engine.clone();
            thread::spawn(move || {
                let fda = Actor::new(org("fda"), Role::Regulator);
                let spec = OrganizationSpec {
                    org_id: org(id),
                    org_type: OrgType::Transporter,
                    name: format!("{id} Ltd"),
                };
                engine.retry_on_conflict(1_000, |e| {
                    e.directory().onboard_organization(&fda, spec.clone())
                })
            })
        })
        .collect();

    let mut admitted = 0;
    for h in handles {
        match h.join().unwrap() {
            Ok(_) => admitted += 1,
            Err(e) => assert_eq!(e.kind(), ErrorKind::DuplicateId, "unexpected {e}"),
        }
    }
    assert_eq!(admitted, 1);
    assert_eq!(engine.directory().organizations().len(), 1);
}
