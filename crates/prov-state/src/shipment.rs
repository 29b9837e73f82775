//! # Shipment State Machine
//!
//! ```text
//! PendingPickup ──▶ PickedUp ──▶ InTransit ──▶ Delivered ──▶ Accepted (terminal)
//!                      │                           ▲   └────▶ Rejected (terminal)
//!                      └───────────────────────────┘
//! ```
//!
//! The first transit log moves a picked-up shipment to `InTransit`; later
//! logs leave it there. Delivery may be completed straight from `PickedUp`
//! when no readings were logged.
//!
//! Self-delivery is the one shortcut: the sender carries the goods itself
//! and the shipment goes from `PendingPickup` to `Accepted` in a single
//! step. No receiver acknowledgment is recorded for such shipments.
//!
//! Who may drive each transition (transporter, receiver) is decided by the
//! engine's capability check, not here.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use prov_core::{BatchId, OrgId, ShipmentId, Timestamp};

use crate::transition::{TransitionEvidence, TransitionRecord};

// ─── Shipment Status ─────────────────────────────────────────────────

/// The lifecycle state of a shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipmentStatus {
    /// Created, waiting for the transporter.
    PendingPickup,
    /// Collected by the transporter.
    PickedUp,
    /// At least one transit reading logged.
    InTransit,
    /// Handed over at the destination, awaiting the receiver.
    Delivered,
    /// Accepted by the receiver (terminal).
    Accepted,
    /// Rejected by the receiver (terminal).
    Rejected,
}

impl ShipmentStatus {
    /// Whether this state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected)
    }

    /// States reachable from this one through the carrier flow.
    pub fn valid_transitions(&self) -> &'static [ShipmentStatus] {
        match self {
            Self::PendingPickup => &[Self::PickedUp],
            Self::PickedUp => &[Self::InTransit, Self::Delivered],
            Self::InTransit => &[Self::Delivered],
            Self::Delivered => &[Self::Accepted, Self::Rejected],
            Self::Accepted | Self::Rejected => &[],
        }
    }

    /// Whether `to` is reachable in one step.
    pub fn can_transition_to(&self, to: ShipmentStatus) -> bool {
        self.valid_transitions().contains(&to)
    }
}

impl std::fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::PendingPickup => "PENDING_PICKUP",
            Self::PickedUp => "PICKED_UP",
            Self::InTransit => "IN_TRANSIT",
            Self::Delivered => "DELIVERED",
            Self::Accepted => "ACCEPTED",
            Self::Rejected => "REJECTED",
        };
        f.write_str(s)
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors raised by shipment construction and transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShipmentError {
    /// Attempted transition is not valid from the current state.
    #[error("invalid shipment transition for {shipment_id}: {from} -> {to}")]
    InvalidTransition {
        /// The shipment identifier.
        shipment_id: ShipmentId,
        /// Current state.
        from: ShipmentStatus,
        /// Attempted target state.
        to: ShipmentStatus,
    },

    /// No batches listed.
    #[error("shipment must carry at least one batch")]
    EmptyBatchList,

    /// The same batch is listed twice.
    #[error("batch {0} is listed more than once")]
    DuplicateBatch(BatchId),

    /// Sender and receiver are the same organization.
    #[error("sender and receiver are both {0}")]
    SameParty(OrgId),

    /// A carrier shipment was created without a transporter.
    #[error("a transporter is required unless the sender delivers directly")]
    MissingTransporter,

    /// The self-delivery shortcut was used on a carrier shipment.
    #[error("shipment {0} is not a self-delivery")]
    NotSelfDelivery(ShipmentId),
}

// ─── Transit readings ────────────────────────────────────────────────

/// A sensor reading reported by the transporter.
///
/// Temperature is in hundredths of a degree Celsius (`450` is 4.50 °C),
/// humidity in hundredths of a percent (`5500` is 55.00 %).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitReading {
    /// Where the reading was taken.
    pub location: String,
    /// Temperature in hundredths of °C.
    pub temperature_centi_c: i32,
    /// Relative humidity in hundredths of a percent.
    pub humidity_centi_pct: u32,
}

/// Acceptable ranges for transit readings. Bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafeRange {
    /// Lowest acceptable temperature (hundredths of °C).
    pub min_temperature_centi_c: i32,
    /// Highest acceptable temperature (hundredths of °C).
    pub max_temperature_centi_c: i32,
    /// Lowest acceptable humidity (hundredths of %).
    pub min_humidity_centi_pct: u32,
    /// Highest acceptable humidity (hundredths of %).
    pub max_humidity_centi_pct: u32,
}

impl SafeRange {
    /// Whether `reading` lies within this range.
    pub fn contains(&self, reading: &TransitReading) -> bool {
        (self.min_temperature_centi_c..=self.max_temperature_centi_c)
            .contains(&reading.temperature_centi_c)
            && (self.min_humidity_centi_pct..=self.max_humidity_centi_pct)
                .contains(&reading.humidity_centi_pct)
    }
}

impl Default for SafeRange {
    /// 2–8 °C, 30–70 % relative humidity.
    fn default() -> Self {
        Self {
            min_temperature_centi_c: 200,
            max_temperature_centi_c: 800,
            min_humidity_centi_pct: 3000,
            max_humidity_centi_pct: 7000,
        }
    }
}

/// An entry in a shipment's transit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitLog {
    /// Position in the log, starting at 1.
    pub seq: u32,
    /// When the reading was recorded.
    pub recorded_at: Timestamp,
    /// The reading itself.
    #[serde(flatten)]
    pub reading: TransitReading,
    /// Whether the reading was inside the configured safe range.
    pub in_range: bool,
}

// ─── Shipment ────────────────────────────────────────────────────────

/// Vehicle and driver descriptors supplied at creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conveyance {
    /// Vehicle registration or identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<String>,
    /// Vehicle kind (reefer truck, van, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_type: Option<String>,
    /// Driver name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_name: Option<String>,
    /// Driver contact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_contact: Option<String>,
}

/// Parameters for a new shipment.
#[derive(Debug, Clone)]
pub struct NewShipment {
    /// Caller-chosen identifier.
    pub id: ShipmentId,
    /// Batches carried.
    pub batch_ids: Vec<BatchId>,
    /// Current owner of the batches.
    pub sender: OrgId,
    /// Destination organization.
    pub receiver: OrgId,
    /// Carrier organization. `None` only for self-delivery.
    pub transporter: Option<OrgId>,
    /// Vehicle and driver.
    pub conveyance: Conveyance,
    /// Whether the sender delivers directly.
    pub self_delivery: bool,
}

/// A shipment with its lifecycle state, transit log and history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipment {
    /// Unique shipment identifier.
    pub id: ShipmentId,
    /// Batches carried, in the order given.
    pub batch_ids: Vec<BatchId>,
    /// Sending organization.
    pub sender: OrgId,
    /// Receiving organization.
    pub receiver: OrgId,
    /// Carrier organization. For self-delivery this is the sender.
    pub transporter: Option<OrgId>,
    /// Vehicle and driver.
    pub conveyance: Conveyance,
    /// Whether the sender delivered directly.
    pub self_delivery: bool,
    /// Current lifecycle state.
    pub status: ShipmentStatus,
    /// Where the transporter collected the goods.
    pub pickup_location: Option<String>,
    /// Where the goods were handed over.
    pub delivery_location: Option<String>,
    /// Proof of delivery supplied by the transporter.
    pub delivery_proof: Option<String>,
    /// Where the receiver accepted the goods.
    pub acceptance_location: Option<String>,
    /// Reason given by the receiver on rejection.
    pub rejection_reason: Option<String>,
    /// Ordered, append-only transit log.
    pub transit_logs: Vec<TransitLog>,
    /// When the shipment was created.
    pub created_at: Timestamp,
    /// When the shipment last changed.
    pub updated_at: Timestamp,
    /// Ordered log of every transition.
    pub history: Vec<TransitionRecord<ShipmentStatus>>,
}

impl Shipment {
    /// Create a shipment in `PendingPickup`.
    pub fn create(new: NewShipment, evidence: &TransitionEvidence) -> Result<Self, ShipmentError> {
        if new.batch_ids.is_empty() {
            return Err(ShipmentError::EmptyBatchList);
        }
        let mut seen = HashSet::new();
        for id in &new.batch_ids {
            if !seen.insert(id) {
                return Err(ShipmentError::DuplicateBatch(id.clone()));
            }
        }
        if new.sender == new.receiver {
            return Err(ShipmentError::SameParty(new.sender));
        }
        let transporter = match (new.self_delivery, new.transporter) {
            (true, _) => Some(new.sender.clone()),
            (false, Some(t)) => Some(t),
            (false, None) => return Err(ShipmentError::MissingTransporter),
        };
        Ok(Self {
            id: new.id,
            batch_ids: new.batch_ids,
            sender: new.sender,
            receiver: new.receiver,
            transporter,
            conveyance: new.conveyance,
            self_delivery: new.self_delivery,
            status: ShipmentStatus::PendingPickup,
            pickup_location: None,
            delivery_location: None,
            delivery_proof: None,
            acceptance_location: None,
            rejection_reason: None,
            transit_logs: Vec::new(),
            created_at: evidence.at,
            updated_at: evidence.at,
            history: vec![TransitionRecord::new(
                ShipmentStatus::PendingPickup,
                ShipmentStatus::PendingPickup,
                evidence,
            )],
        })
    }

    /// Whether the shipment is still open (holds batch reservations).
    pub fn is_open(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Whether `org` is the assigned transporter.
    pub fn is_transporter(&self, org: &OrgId) -> bool {
        self.transporter.as_ref() == Some(org)
    }

    /// Transporter collected the goods (`PendingPickup` → `PickedUp`).
    pub fn confirm_pickup(
        &mut self,
        location: String,
        evidence: &TransitionEvidence,
    ) -> Result<(), ShipmentError> {
        self.require_transition(ShipmentStatus::PickedUp)?;
        self.pickup_location = Some(location);
        self.record(ShipmentStatus::PickedUp, evidence);
        Ok(())
    }

    /// Append a transit reading. Returns the stored log entry.
    ///
    /// Out-of-range readings are stored with `in_range == false`; they never
    /// block the shipment.
    pub fn log_transit(
        &mut self,
        reading: TransitReading,
        range: &SafeRange,
        evidence: &TransitionEvidence,
    ) -> Result<&TransitLog, ShipmentError> {
        match self.status {
            ShipmentStatus::PickedUp => self.record(ShipmentStatus::InTransit, evidence),
            ShipmentStatus::InTransit => self.updated_at = evidence.at,
            _ => return Err(self.invalid(ShipmentStatus::InTransit)),
        }
        let in_range = range.contains(&reading);
        let seq = u32::try_from(self.transit_logs.len() + 1).unwrap_or(u32::MAX);
        self.transit_logs.push(TransitLog {
            seq,
            recorded_at: evidence.at,
            reading,
            in_range,
        });
        let last = self.transit_logs.len() - 1;
        Ok(&self.transit_logs[last])
    }

    /// Goods handed over at the destination (→ `Delivered`).
    pub fn complete_delivery(
        &mut self,
        location: String,
        proof: Option<String>,
        evidence: &TransitionEvidence,
    ) -> Result<(), ShipmentError> {
        self.require_transition(ShipmentStatus::Delivered)?;
        self.delivery_location = Some(location);
        self.delivery_proof = proof;
        self.record(ShipmentStatus::Delivered, evidence);
        Ok(())
    }

    /// Receiver accepts the goods (`Delivered` → `Accepted`).
    pub fn accept(
        &mut self,
        location: String,
        evidence: &TransitionEvidence,
    ) -> Result<(), ShipmentError> {
        self.require_transition(ShipmentStatus::Accepted)?;
        self.acceptance_location = Some(location);
        self.record(ShipmentStatus::Accepted, evidence);
        Ok(())
    }

    /// Receiver refuses the goods (`Delivered` → `Rejected`).
    pub fn reject(&mut self, evidence: &TransitionEvidence) -> Result<(), ShipmentError> {
        self.require_transition(ShipmentStatus::Rejected)?;
        self.rejection_reason = Some(evidence.reason.clone());
        self.record(ShipmentStatus::Rejected, evidence);
        Ok(())
    }

    /// Self-delivery shortcut (`PendingPickup` → `Accepted`).
    pub fn self_deliver(
        &mut self,
        location: String,
        evidence: &TransitionEvidence,
    ) -> Result<(), ShipmentError> {
        if !self.self_delivery {
            return Err(ShipmentError::NotSelfDelivery(self.id.clone()));
        }
        if self.status != ShipmentStatus::PendingPickup {
            return Err(self.invalid(ShipmentStatus::Accepted));
        }
        self.pickup_location = Some(location.clone());
        self.delivery_location = Some(location);
        self.record(ShipmentStatus::Accepted, evidence);
        Ok(())
    }

    fn require_transition(&self, to: ShipmentStatus) -> Result<(), ShipmentError> {
        if !self.status.can_transition_to(to) {
            return Err(self.invalid(to));
        }
        Ok(())
    }

    fn invalid(&self, to: ShipmentStatus) -> ShipmentError {
        ShipmentError::InvalidTransition {
            shipment_id: self.id.clone(),
            from: self.status,
            to,
        }
    }

    fn record(&mut self, to: ShipmentStatus, evidence: &TransitionEvidence) {
        self.history
            .push(TransitionRecord::new(self.status, to, evidence));
        self.status = to;
        self.updated_at = evidence.at;
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ShipmentStatus; 6] = [
        ShipmentStatus::PendingPickup,
        ShipmentStatus::PickedUp,
        ShipmentStatus::InTransit,
        ShipmentStatus::Delivered,
        ShipmentStatus::Accepted,
        ShipmentStatus::Rejected,
    ];

    fn org(s: &str) -> OrgId {
        OrgId::new(s).unwrap()
    }

    fn ev(reason: &str) -> TransitionEvidence {
        TransitionEvidence::new(org("trans-1"), reason)
    }

    fn draft() -> NewShipment {
        NewShipment {
            id: ShipmentId::new("S1").unwrap(),
            batch_ids: vec![BatchId::new("B1").unwrap()],
            sender: org("mfr-1"),
            receiver: org("dist-1"),
            transporter: Some(org("trans-1")),
            conveyance: Conveyance::default(),
            self_delivery: false,
        }
    }

    fn reading(temp: i32, hum: u32) -> TransitReading {
        TransitReading {
            location: "Highway 9".into(),
            temperature_centi_c: temp,
            humidity_centi_pct: hum,
        }
    }

    fn delivered() -> Shipment {
        let mut s = Shipment::create(draft(), &ev("created")).unwrap();
        s.confirm_pickup("Plant A".into(), &ev("pickup")).unwrap();
        s.complete_delivery("Depot".into(), Some("sig:123".into()), &ev("dropoff"))
            .unwrap();
        s
    }

    #[test]
    fn transition_matrix() {
        for from in ALL {
            for to in ALL {
                let expected = matches!(
                    (from, to),
                    (ShipmentStatus::PendingPickup, ShipmentStatus::PickedUp)
                        | (ShipmentStatus::PickedUp, ShipmentStatus::InTransit)
                        | (ShipmentStatus::PickedUp, ShipmentStatus::Delivered)
                        | (ShipmentStatus::InTransit, ShipmentStatus::Delivered)
                        | (ShipmentStatus::Delivered, ShipmentStatus::Accepted)
                        | (ShipmentStatus::Delivered, ShipmentStatus::Rejected)
                );
                assert_eq!(from.can_transition_to(to), expected, "{from} -> {to}");
            }
        }
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for s in ALL.into_iter().filter(ShipmentStatus::is_terminal) {
            assert!(s.valid_transitions().is_empty());
        }
    }

    #[test]
    fn create_validates_input() {
        let mut d = draft();
        d.batch_ids.clear();
        assert_eq!(
            Shipment::create(d, &ev("c")).unwrap_err(),
            ShipmentError::EmptyBatchList
        );

        let mut d = draft();
        d.batch_ids.push(BatchId::new("B1").unwrap());
        assert!(matches!(
            Shipment::create(d, &ev("c")),
            Err(ShipmentError::DuplicateBatch(_))
        ));

        let mut d = draft();
        d.receiver = org("mfr-1");
        assert!(matches!(
            Shipment::create(d, &ev("c")),
            Err(ShipmentError::SameParty(_))
        ));

        let mut d = draft();
        d.transporter = None;
        assert_eq!(
            Shipment::create(d, &ev("c")).unwrap_err(),
            ShipmentError::MissingTransporter
        );
    }

    #[test]
    fn full_carrier_flow() {
        let mut s = Shipment::create(draft(), &ev("created")).unwrap();
        assert_eq!(s.status, ShipmentStatus::PendingPickup);
        s.confirm_pickup("Plant A".into(), &ev("pickup")).unwrap();
        let range = SafeRange::default();
        assert!(s.log_transit(reading(450, 5000), &range, &ev("log")).unwrap().in_range);
        assert_eq!(s.status, ShipmentStatus::InTransit);
        assert!(!s.log_transit(reading(1200, 5000), &range, &ev("log")).unwrap().in_range);
        assert_eq!(s.transit_logs.len(), 2);
        assert_eq!(s.transit_logs[1].seq, 2);
        s.complete_delivery("Depot".into(), None, &ev("dropoff")).unwrap();
        s.accept("Depot".into(), &ev("accepted")).unwrap();
        assert_eq!(s.status, ShipmentStatus::Accepted);
        assert!(!s.is_open());
        let states: Vec<_> = s.history.iter().map(|r| r.to_state).collect();
        assert_eq!(
            states,
            vec![
                ShipmentStatus::PendingPickup,
                ShipmentStatus::PickedUp,
                ShipmentStatus::InTransit,
                ShipmentStatus::Delivered,
                ShipmentStatus::Accepted
            ]
        );
    }

    #[test]
    fn cannot_skip_pickup() {
        let mut s = Shipment::create(draft(), &ev("created")).unwrap();
        assert!(matches!(
            s.complete_delivery("Depot".into(), None, &ev("x")),
            Err(ShipmentError::InvalidTransition { .. })
        ));
        assert!(s
            .log_transit(reading(450, 5000), &SafeRange::default(), &ev("x"))
            .is_err());
        assert!(s.accept("Depot".into(), &ev("x")).is_err());
    }

    #[test]
    fn reject_records_reason_and_is_terminal() {
        let mut s = delivered();
        s.reject(&ev("damaged packaging")).unwrap();
        assert_eq!(s.status, ShipmentStatus::Rejected);
        assert_eq!(s.rejection_reason.as_deref(), Some("damaged packaging"));
        assert!(s.accept("Depot".into(), &ev("x")).is_err());
        assert!(s.reject(&ev("again")).is_err());
    }

    #[test]
    fn no_logs_after_delivery() {
        let mut s = delivered();
        assert!(s
            .log_transit(reading(450, 5000), &SafeRange::default(), &ev("late"))
            .is_err());
    }

    #[test]
    fn self_delivery_shortcut() {
        let mut d = draft();
        d.transporter = None;
        d.self_delivery = true;
        let mut s = Shipment::create(d, &ev("created")).unwrap();
        assert!(s.is_transporter(&org("mfr-1")));
        s.self_deliver("Retail Store".into(), &ev("self-delivered")).unwrap();
        assert_eq!(s.status, ShipmentStatus::Accepted);

        let mut carrier = Shipment::create(draft(), &ev("created")).unwrap();
        assert!(matches!(
            carrier.self_deliver("x".into(), &ev("x")),
            Err(ShipmentError::NotSelfDelivery(_))
        ));
    }

    #[test]
    fn safe_range_bounds_are_inclusive() {
        let r = SafeRange::default();
        assert!(r.contains(&reading(200, 3000)));
        assert!(r.contains(&reading(800, 7000)));
        assert!(!r.contains(&reading(199, 5000)));
        assert!(!r.contains(&reading(500, 7001)));
    }

    #[test]
    fn transit_log_serializes_flat_integers() {
        let mut s = Shipment::create(draft(), &ev("created")).unwrap();
        s.confirm_pickup("Plant A".into(), &ev("pickup")).unwrap();
        let log = s
            .log_transit(reading(450, 5500), &SafeRange::default(), &ev("log"))
            .unwrap()
            .clone();
        let v = serde_json::to_value(&log).unwrap();
        assert_eq!(v["temperature_centi_c"], 450);
        assert_eq!(v["humidity_centi_pct"], 5500);
        assert_eq!(v["in_range"], true);
    }
}
