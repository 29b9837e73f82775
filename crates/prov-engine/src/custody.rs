//! # Custody Engine
//!
//! Drives shipments through their state machine and keeps the referenced
//! batches in step:
//!
//! | Shipment transition | Batch effect |
//! |---|---|
//! | create | reserved, `InTransit` |
//! | complete delivery | `Arrived` |
//! | accept | owner becomes the receiver, `Delivered`, reservation dropped |
//! | reject | reservation dropped, prior state restored, owner unchanged |
//! | self-delivery | reserved and transferred in the same commit |
//!
//! Every call first loads the shipment and each referenced batch, failing
//! with `Recalled` if any batch has been recalled. Input validation and
//! the capability check only run after that.

use serde::{Deserialize, Serialize};

use prov_core::{require_text, Actor, BatchId, OrgId, OrgType, ShipmentId};
use prov_state::{
    Batch, Conveyance, NewShipment, Organization, Shipment, TransitLog, TransitReading,
    TransitionEvidence,
};

use crate::authority::TransporterAuthority;
use crate::capability::{authorize, Operation};
use crate::engine::{Applied, Engine, Outcome};
use crate::error::EngineError;
use crate::ledger::{Record, Tx};
use crate::metrics;
use crate::registry::Registry;

/// Input to [`CustodyEngine::create_shipment`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentSpec {
    /// Caller-chosen identifier.
    pub shipment_id: ShipmentId,
    /// Batches to carry.
    pub batch_ids: Vec<BatchId>,
    /// Current owner of the batches; must be the actor.
    pub sender: OrgId,
    /// Destination organization.
    pub receiver: OrgId,
    /// Carrier. Required unless `self_delivery`.
    #[serde(default)]
    pub transporter: Option<OrgId>,
    /// Vehicle and driver.
    #[serde(default)]
    pub conveyance: Conveyance,
    /// The sender delivers the goods itself.
    #[serde(default)]
    pub self_delivery: bool,
    /// Hand-over location. Required for self-delivery.
    #[serde(default)]
    pub location: Option<String>,
}

/// Shipment operations.
#[derive(Debug, Clone, Copy)]
pub struct CustodyEngine<'e> {
    engine: &'e Engine,
}

impl<'e> CustodyEngine<'e> {
    pub(crate) fn new(engine: &'e Engine) -> Self {
        Self { engine }
    }

    // ─── Mutations ──────────────────────────────────────────────────

    /// Create a shipment and reserve its batches.
    ///
    /// A carrier shipment needs a transporter approved in the sender's
    /// pool or in the pool of each batch's manufacturer. A self-delivery
    /// is accepted on creation and ownership moves to the receiver at once.
    pub fn create_shipment(
        &self,
        actor: &Actor,
        spec: ShipmentSpec,
    ) -> Result<Outcome<Shipment>, EngineError> {
        self.engine.execute("create_shipment", actor, move |tx, ev| {
            let mut batches = Vec::with_capacity(spec.batch_ids.len());
            for id in &spec.batch_ids {
                batches.push(tx.require::<Batch>(id)?);
            }
            tx.require::<Organization>(&spec.receiver)?;
            let carrier = match (&spec.transporter, spec.self_delivery) {
                (Some(t), false) => Some(tx.require::<Organization>(t)?),
                _ => None,
            };
            for batch in &batches {
                batch.ensure_not_recalled()?;
            }

            if spec.self_delivery && spec.transporter.as_ref().is_some_and(|t| t != &spec.sender) {
                return Err(EngineError::Validation(
                    "a self-delivery is carried by the sender".into(),
                ));
            }
            let location = match (spec.self_delivery, spec.location.as_deref()) {
                (true, Some(l)) => Some(require_text("location", l)?),
                (true, None) => {
                    return Err(EngineError::Validation(
                        "a self-delivery needs a hand-over location".into(),
                    ))
                }
                (false, _) => None,
            };
            let mut shipment = Shipment::create(
                NewShipment {
                    id: spec.shipment_id,
                    batch_ids: spec.batch_ids,
                    sender: spec.sender,
                    receiver: spec.receiver,
                    transporter: spec.transporter,
                    conveyance: spec.conveyance,
                    self_delivery: spec.self_delivery,
                },
                ev,
            )?;

            authorize(
                actor,
                &Operation::CreateShipment {
                    sender: &shipment.sender,
                },
            )?;
            if let Some(batch) = batches.iter().find(|b| b.owner != shipment.sender) {
                return Err(EngineError::Unauthorized(format!(
                    "{} does not own batch {}",
                    shipment.sender, batch.id
                )));
            }
            if let Some(carrier) = &carrier {
                check_carrier(tx, &shipment.sender, carrier, &batches)?;
            }

            tx.ensure_absent::<Shipment>(&shipment.id)?;
            for batch in &mut batches {
                batch.reserve(&shipment.id, ev)?;
            }
            tx.put(shipment.clone());
            for batch in batches {
                tx.put(batch);
            }

            if let Some(location) = location {
                let handover = ev.with_reason(format!(
                    "self-delivery by {}; receiver acknowledgment not recorded",
                    shipment.sender
                ));
                shipment.self_deliver(location, &handover)?;
                tx.put(shipment.clone());
                for id in &shipment.batch_ids {
                    Registry::transfer_ownership(
                        tx,
                        id,
                        &shipment.id,
                        &shipment.receiver,
                        &handover,
                    )?;
                }
            }
            Ok(shipment_applied(shipment))
        })
    }

    /// Transporter collected the goods.
    pub fn confirm_pickup(
        &self,
        actor: &Actor,
        shipment_id: &ShipmentId,
        location: &str,
    ) -> Result<Outcome<Shipment>, EngineError> {
        self.engine.execute("confirm_pickup", actor, |tx, ev| {
            let (mut shipment, _) = load(tx, shipment_id)?;
            let location = require_text("location", location)?;
            authorize(
                actor,
                &Operation::ConfirmPickup {
                    transporter: shipment.transporter.as_ref(),
                },
            )?;
            shipment.confirm_pickup(location, ev)?;
            tx.put(shipment.clone());
            Ok(shipment_applied(shipment))
        })
    }

    /// Append a transit reading. The returned log says whether it was in
    /// the configured safe range; excursions never block the shipment.
    pub fn log_transit(
        &self,
        actor: &Actor,
        shipment_id: &ShipmentId,
        reading: TransitReading,
    ) -> Result<Outcome<TransitLog>, EngineError> {
        let range = self.engine.config().cold_chain;
        let out = self.engine.execute("log_transit", actor, move |tx, ev| {
            let (mut shipment, _) = load(tx, shipment_id)?;
            let mut reading = reading;
            reading.location = require_text("location", &reading.location)?;
            authorize(
                actor,
                &Operation::LogTransit {
                    transporter: shipment.transporter.as_ref(),
                },
            )?;
            let log = shipment.log_transit(reading, &range, ev)?.clone();
            tx.put(shipment.clone());
            let result = if log.in_range {
                format!("{} reading {}", shipment.status, log.seq)
            } else {
                format!("{} reading {} out of range", shipment.status, log.seq)
            };
            Ok(Applied::new(log, Shipment::ENTITY, shipment_id, result))
        })?;
        if !out.data.in_range {
            metrics::cold_chain_excursion();
            tracing::warn!(
                shipment_id = %shipment_id,
                seq = out.data.seq,
                location = %out.data.reading.location,
                temperature_centi_c = out.data.reading.temperature_centi_c,
                humidity_centi_pct = out.data.reading.humidity_centi_pct,
                "cold-chain excursion"
            );
        }
        Ok(out)
    }

    /// Goods handed over at the destination; batches become `Arrived`.
    pub fn complete_delivery(
        &self,
        actor: &Actor,
        shipment_id: &ShipmentId,
        location: &str,
        proof: Option<String>,
    ) -> Result<Outcome<Shipment>, EngineError> {
        self.engine.execute("complete_delivery", actor, move |tx, ev| {
            let (mut shipment, batches) = load(tx, shipment_id)?;
            let location = require_text("location", location)?;
            authorize(
                actor,
                &Operation::CompleteDelivery {
                    transporter: shipment.transporter.as_ref(),
                },
            )?;
            shipment.complete_delivery(location, proof.filter(|p| !p.trim().is_empty()), ev)?;
            tx.put(shipment.clone());
            for mut batch in batches {
                batch.mark_arrived(shipment_id, ev)?;
                tx.put(batch);
            }
            Ok(shipment_applied(shipment))
        })
    }

    /// Receiver accepts; ownership of every batch moves to the receiver.
    pub fn accept_delivery(
        &self,
        actor: &Actor,
        shipment_id: &ShipmentId,
        location: &str,
    ) -> Result<Outcome<Shipment>, EngineError> {
        self.engine.execute("accept_delivery", actor, |tx, ev| {
            let (mut shipment, _) = load(tx, shipment_id)?;
            let location = require_text("location", location)?;
            authorize(
                actor,
                &Operation::AcceptDelivery {
                    receiver: &shipment.receiver,
                },
            )?;
            shipment.accept(location, ev)?;
            tx.put(shipment.clone());
            for id in &shipment.batch_ids {
                Registry::transfer_ownership(tx, id, &shipment.id, &shipment.receiver, ev)?;
            }
            Ok(shipment_applied(shipment))
        })
    }

    /// Receiver refuses; reservations are released and owners unchanged.
    pub fn reject_delivery(
        &self,
        actor: &Actor,
        shipment_id: &ShipmentId,
        reason: &str,
    ) -> Result<Outcome<Shipment>, EngineError> {
        self.engine.execute("reject_delivery", actor, |tx, ev| {
            let (mut shipment, batches) = load(tx, shipment_id)?;
            let reason = require_text("reason", reason)?;
            authorize(
                actor,
                &Operation::RejectDelivery {
                    receiver: &shipment.receiver,
                },
            )?;
            let ev = ev.with_reason(reason);
            shipment.reject(&ev)?;
            tx.put(shipment.clone());
            for mut batch in batches {
                batch.release(shipment_id, &ev)?;
                tx.put(batch);
            }
            Ok(shipment_applied(shipment))
        })
    }

    // ─── Queries ────────────────────────────────────────────────────

    /// One shipment.
    pub fn shipment(&self, id: &ShipmentId) -> Result<Shipment, EngineError> {
        self.engine
            .ledger()
            .get::<Shipment>(id)
            .map(|v| v.value)
            .ok_or_else(|| EngineError::not_found(Shipment::ENTITY, id))
    }

    /// Every shipment.
    pub fn shipments(&self) -> Vec<Shipment> {
        self.engine.ledger().list()
    }

    /// A shipment's transit log.
    pub fn transit_logs(&self, id: &ShipmentId) -> Result<Vec<TransitLog>, EngineError> {
        self.shipment(id).map(|s| s.transit_logs)
    }

    /// Every shipment that carried `batch_id`, oldest first.
    pub fn shipments_for_batch(&self, batch_id: &BatchId) -> Vec<Shipment> {
        let mut trail = self
            .engine
            .ledger()
            .scan(|s: &Shipment| s.batch_ids.contains(batch_id));
        trail.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        trail
    }

    /// Shipments `org` sends, receives or carries.
    pub fn shipments_involving(&self, org: &OrgId) -> Vec<Shipment> {
        self.engine.ledger().scan(|s: &Shipment| {
            &s.sender == org || &s.receiver == org || s.transporter.as_ref() == Some(org)
        })
    }
}

/// Load a shipment and its batches, failing if any batch is recalled.
fn load(tx: &mut Tx<'_>, shipment_id: &ShipmentId) -> Result<(Shipment, Vec<Batch>), EngineError> {
    let shipment: Shipment = tx.require(shipment_id)?;
    let mut batches = Vec::with_capacity(shipment.batch_ids.len());
    for id in &shipment.batch_ids {
        let batch: Batch = tx.require(id)?;
        batch.ensure_not_recalled()?;
        batches.push(batch);
    }
    Ok((shipment, batches))
}

fn check_carrier(
    tx: &mut Tx<'_>,
    sender: &OrgId,
    carrier: &Organization,
    batches: &[Batch],
) -> Result<(), EngineError> {
    if carrier.org_type != OrgType::Transporter {
        return Err(EngineError::Validation(format!(
            "{} is a {}, not a transporter",
            carrier.id, carrier.org_type
        )));
    }
    if !carrier.is_active() {
        return Err(EngineError::Unauthorized(format!(
            "transporter {} is {}",
            carrier.id, carrier.status
        )));
    }
    let in_sender_pool = TransporterAuthority::approved_in(tx, sender, &carrier.identity);
    for batch in batches {
        if !in_sender_pool
            && !TransporterAuthority::approved_in(tx, &batch.manufacturer, &carrier.identity)
        {
            return Err(EngineError::Unauthorized(format!(
                "transporter {} is not approved by {} or by {}",
                carrier.id, sender, batch.manufacturer
            )));
        }
    }
    Ok(())
}

fn shipment_applied(shipment: Shipment) -> Applied<Shipment> {
    let id = shipment.id.clone();
    let status = shipment.status;
    Applied::new(shipment, Shipment::ENTITY, id, status)
}
