//! # Concurrent Mutations
//!
//! Threads share one engine and race on the same batch. Optimistic version
//! checks turn lost updates into `Conflict`, which callers retry; quantity
//! is never over-allocated.

mod common;

use std::thread;

use common::{bid, World};
use prov_engine::ErrorKind;
use prov_state::BatchStatus;

const RETRIES: usize = 10_000;

#[test]
fn racing_sales_are_all_counted() {
    let w = World::new(1000);
    w.hand_to_shop("S0", "B1");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = w.engine.clone();
            let shop = w.shop.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    engine
                        .retry_on_conflict(RETRIES, |e| {
                            e.registry().sell_to_consumer(&shop, &bid("B1"), 2)
                        })
                        .unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let batch = w.engine.registry().batch(&bid("B1")).unwrap();
    assert_eq!(batch.quantity, 1000 - 8 * 50 * 2);
    assert_eq!(batch.status, BatchStatus::Delivered);
    assert_eq!(w.engine.audit_log().by_action("sell_to_consumer").len(), 400);
}

#[test]
fn oversubscribed_sales_never_overdraw() {
    let w = World::new(1000);
    w.hand_to_shop("S0", "B1");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = w.engine.clone();
            let shop = w.shop.clone();
            thread::spawn(move || {
                engine.retry_on_conflict(RETRIES, |e| {
                    e.registry().sell_to_consumer(&shop, &bid("B1"), 200)
                })
            })
        })
        .collect();

    let mut sold = 0;
    for h in handles {
        match h.join().unwrap() {
            Ok(_) => sold += 200,
            Err(e) => assert!(
                matches!(
                    e.kind(),
                    ErrorKind::InsufficientQuantity | ErrorKind::InvalidTransition
                ),
                "unexpected {e}"
            ),
        }
    }
    assert_eq!(sold, 1000);
    let batch = w.engine.registry().batch(&bid("B1")).unwrap();
    assert_eq!(batch.quantity, 0);
    assert_eq!(batch.status, BatchStatus::Consumed);
}

#[test]
fn racing_splits_conserve_the_family_total() {
    let w = World::new(1000);

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let engine = w.engine.clone();
            let mfr = w.mfr.clone();
            thread::spawn(move || {
                let child = bid(&format!("B1-{i}"));
                engine
                    .retry_on_conflict(RETRIES, |e| {
                        e.registry().split_batch(&mfr, &bid("B1"), &child, 300)
                    })
                    .map(|_| child)
            })
        })
        .collect();

    let mut children = Vec::new();
    for h in handles {
        match h.join().unwrap() {
            Ok(child) => children.push(child),
            Err(e) => assert_eq!(e.kind(), ErrorKind::InsufficientQuantity, "unexpected {e}"),
        }
    }
    assert_eq!(children.len(), 3);

    let registry = w.engine.registry();
    let parent = registry.batch(&bid("B1")).unwrap();
    assert_eq!(parent.quantity, 100);
    let total: u64 = children
        .iter()
        .map(|c| registry.batch(c).unwrap().quantity)
        .sum::<u64>()
        + parent.quantity;
    assert_eq!(total, 1000);
    assert_eq!(registry.batch_lineage(&bid("B1")).unwrap().children.len(), 3);
}

#[test]
fn competing_shipments_reserve_a_batch_once() {
    let w = World::new(10);
    w.approve_transporter();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let engine = w.engine.clone();
            let mfr = w.mfr.clone();
            let spec = w.spec(&format!("S{i}"), &["B1"]);
            thread::spawn(move || {
                engine.retry_on_conflict(RETRIES, |e| {
                    e.custody().create_shipment(&mfr, spec.clone())
                })
            })
        })
        .collect();

    let mut winners = 0;
    for h in handles {
        match h.join().unwrap() {
            Ok(_) => winners += 1,
            Err(e) => assert_eq!(e.kind(), ErrorKind::InvalidTransition, "unexpected {e}"),
        }
    }
    assert_eq!(winners, 1);
    let batch = w.engine.registry().batch(&bid("B1")).unwrap();
    assert_eq!(batch.status, BatchStatus::InTransit);
    assert!(batch.reserved_by.is_some());
}
