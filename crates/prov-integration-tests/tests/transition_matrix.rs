//! # Shipment Transition Matrix
//!
//! Drives a shipment into every state and attempts every carrier-flow
//! operation from there. Only the edges of the shipment state machine
//! succeed; everything else is refused with `InvalidTransition` and leaves
//! the shipment untouched. Once the carried batch is recalled every
//! operation reports `Recalled`, whatever state the shipment is in.

mod common;

use common::{bid, sid, World};
use prov_engine::{EngineError, ErrorKind};
use prov_state::{ShipmentStatus, TransitReading};

const STATES: [ShipmentStatus; 6] = [
    ShipmentStatus::PendingPickup,
    ShipmentStatus::PickedUp,
    ShipmentStatus::InTransit,
    ShipmentStatus::Delivered,
    ShipmentStatus::Accepted,
    ShipmentStatus::Rejected,
];

#[derive(Debug, Clone, Copy)]
enum Op {
    Pickup,
    LogTransit,
    Deliver,
    Accept,
    Reject,
}

const OPS: [Op; 5] = [Op::Pickup, Op::LogTransit, Op::Deliver, Op::Accept, Op::Reject];

fn permitted(from: ShipmentStatus, op: Op) -> bool {
    use ShipmentStatus::*;
    matches!(
        (from, op),
        (PendingPickup, Op::Pickup)
            | (PickedUp | InTransit, Op::LogTransit)
            | (PickedUp | InTransit, Op::Deliver)
            | (Delivered, Op::Accept)
            | (Delivered, Op::Reject)
    )
}

fn reading() -> TransitReading {
    TransitReading {
        location: "Highway 5".into(),
        temperature_centi_c: 500,
        humidity_centi_pct: 4500,
    }
}

/// A world whose shipment `S1` (mfr-1 → dist-1 via trans-1) sits in `target`.
fn shipment_in(target: ShipmentStatus) -> World {
    let w = World::new(100);
    w.approve_transporter();
    let custody = w.engine.custody();
    let s1 = sid("S1");
    custody.create_shipment(&w.mfr, w.spec("S1", &["B1"])).unwrap();
    if target == ShipmentStatus::PendingPickup {
        return w;
    }
    custody.confirm_pickup(&w.trans, &s1, "Plant A").unwrap();
    if target == ShipmentStatus::PickedUp {
        return w;
    }
    custody.log_transit(&w.trans, &s1, reading()).unwrap();
    if target == ShipmentStatus::InTransit {
        return w;
    }
    custody.complete_delivery(&w.trans, &s1, "Depot", None).unwrap();
    match target {
        ShipmentStatus::Accepted => {
            custody.accept_delivery(&w.dist, &s1, "Depot").unwrap();
        }
        ShipmentStatus::Rejected => {
            custody.reject_delivery(&w.dist, &s1, "damaged").unwrap();
        }
        _ => {}
    }
    w
}

fn attempt(w: &World, op: Op) -> Result<(), EngineError> {
    let custody = w.engine.custody();
    let s1 = sid("S1");
    match op {
        Op::Pickup => custody.confirm_pickup(&w.trans, &s1, "Plant A").map(drop),
        Op::LogTransit => custody.log_transit(&w.trans, &s1, reading()).map(drop),
        Op::Deliver => custody.complete_delivery(&w.trans, &s1, "Depot", None).map(drop),
        Op::Accept => custody.accept_delivery(&w.dist, &s1, "Depot").map(drop),
        Op::Reject => custody.reject_delivery(&w.dist, &s1, "late").map(drop),
    }
}

#[test]
fn setup_reaches_every_state() {
    for state in STATES {
        let w = shipment_in(state);
        assert_eq!(w.engine.custody().shipment(&sid("S1")).unwrap().status, state);
    }
}

#[test]
fn only_state_machine_edges_succeed() {
    for from in STATES {
        for op in OPS {
            let w = shipment_in(from);
            let before = w.engine.custody().shipment(&sid("S1")).unwrap();
            let events = w.engine.audit_log().len();
            match attempt(&w, op) {
                Ok(()) => assert!(permitted(from, op), "{op:?} from {from} should be refused"),
                Err(e) => {
                    assert!(!permitted(from, op), "{op:?} from {from} failed: {e}");
                    assert_eq!(e.kind(), ErrorKind::InvalidTransition, "{op:?} from {from}");
                    let after = w.engine.custody().shipment(&sid("S1")).unwrap();
                    assert_eq!(after, before, "{op:?} from {from} changed the shipment");
                    assert_eq!(w.engine.audit_log().len(), events);
                }
            }
        }
    }
}

#[test]
fn terminal_states_have_no_exits() {
    for state in STATES.into_iter().filter(ShipmentStatus::is_terminal) {
        assert!(state.valid_transitions().is_empty());
        let w = shipment_in(state);
        for op in OPS {
            assert_eq!(attempt(&w, op).unwrap_err().kind(), ErrorKind::InvalidTransition);
        }
    }
}

#[test]
fn pickup_may_go_straight_to_delivery() {
    let w = shipment_in(ShipmentStatus::PickedUp);
    let out = w
        .engine
        .custody()
        .complete_delivery(&w.trans, &sid("S1"), "Depot", Some("pod-7".into()))
        .unwrap();
    assert_eq!(out.data.status, ShipmentStatus::Delivered);
    assert!(out.data.transit_logs.is_empty());
}

#[test]
fn wrong_party_is_refused_before_the_state_machine() {
    // Accept on a pending shipment by the sender: capability fails first.
    let w = shipment_in(ShipmentStatus::PendingPickup);
    let err = w
        .engine
        .custody()
        .accept_delivery(&w.mfr, &sid("S1"), "Depot")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    let err = w
        .engine
        .custody()
        .confirm_pickup(&w.dist, &sid("S1"), "Plant A")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
}

fn recall_b1(w: &World) {
    w.engine
        .registry()
        .recall_batch(&w.fda, &bid("B1"), "contamination")
        .unwrap();
}

#[test]
fn recalled_batch_blocks_every_operation_from_every_state() {
    for from in STATES {
        for op in OPS {
            let w = shipment_in(from);
            recall_b1(&w);
            let before = w.engine.custody().shipment(&sid("S1")).unwrap();
            let err = attempt(&w, op).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Recalled, "{op:?} from {from}: {err}");
            assert_eq!(w.engine.custody().shipment(&sid("S1")).unwrap(), before);
        }
    }
}

#[test]
fn recalled_delivery_cannot_be_completed_accepted_or_rejected() {
    let w = shipment_in(ShipmentStatus::InTransit);
    recall_b1(&w);
    let custody = w.engine.custody();
    let s1 = sid("S1");
    let err = custody.log_transit(&w.trans, &s1, reading()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Recalled);
    let err = custody.complete_delivery(&w.trans, &s1, "Depot", None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Recalled);

    let w = shipment_in(ShipmentStatus::Delivered);
    recall_b1(&w);
    let custody = w.engine.custody();
    let err = custody.accept_delivery(&w.dist, &s1, "Depot").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Recalled);
    let err = custody.reject_delivery(&w.dist, &s1, "damaged").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Recalled);
    assert_eq!(custody.shipment(&s1).unwrap().status, ShipmentStatus::Delivered);
}

#[test]
fn recalled_stock_cannot_be_sold() {
    let w = World::new(100);
    w.hand_to_shop("S0", "B1");
    let sold = w.engine.registry().sell_to_consumer(&w.shop, &bid("B1"), 1).unwrap();
    assert_eq!(sold.data.quantity, 99);

    recall_b1(&w);
    let err = w
        .engine
        .registry()
        .sell_to_consumer(&w.shop, &bid("B1"), 1)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Recalled);
    // Recall wins over ownership too.
    let err = w
        .engine
        .registry()
        .sell_to_consumer(&w.dist, &bid("B1"), 1)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Recalled);
    assert_eq!(w.engine.registry().batch(&bid("B1")).unwrap().quantity, 99);
}
