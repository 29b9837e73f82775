//! # Batch Lifecycle State Machine
//!
//! A batch is a quantity of one product with a single owner. Quantity only
//! goes down (split, sale). Ownership only changes when a shipment carrying
//! the batch is accepted.
//!
//! ## States
//!
//! ```text
//! Created ──reserve──▶ InTransit ──arrive──▶ Arrived ──accept──▶ Delivered
//!    ▲                     │                    │                    │
//!    └──────── release (shipment rejected) ─────┘        reserve ◀───┘
//!
//! Created | Delivered ──sell to zero──▶ Consumed   (terminal)
//! any non-terminal    ──expire────────▶ Expired    (terminal)
//! any                 ──recall────────▶ Recalled   (terminal, sticky)
//! ```
//!
//! A reserved batch (`reserved_by` is set) belongs to an open shipment.
//! While reserved it cannot be split, sold, expired or put on a second
//! shipment.
//!
//! `Recalled` is checked before every other guard: once recalled, every
//! operation on the batch fails with [`BatchError::Recalled`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use prov_core::{BatchId, OrgId, ProductId, ShipmentId, Timestamp};

use crate::transition::{TransitionEvidence, TransitionRecord};

// ─── Batch Status ────────────────────────────────────────────────────

/// The lifecycle state of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    /// Produced, held by its owner, not on a shipment.
    Created,
    /// Reserved by an open shipment.
    InTransit,
    /// The carrying shipment was delivered, awaiting the receiver.
    Arrived,
    /// Accepted by its current owner at the end of a shipment.
    Delivered,
    /// Sold down to zero (terminal).
    Consumed,
    /// Recalled by a regulator (terminal, sticky).
    Recalled,
    /// Past its expiry date (terminal).
    Expired,
}

impl BatchStatus {
    /// Whether this state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Consumed | Self::Recalled | Self::Expired)
    }

    /// Whether a batch in this state may be placed on a shipment.
    pub fn is_shippable(&self) -> bool {
        matches!(self, Self::Created | Self::Delivered)
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "CREATED",
            Self::InTransit => "IN_TRANSIT",
            Self::Arrived => "ARRIVED",
            Self::Delivered => "DELIVERED",
            Self::Consumed => "CONSUMED",
            Self::Recalled => "RECALLED",
            Self::Expired => "EXPIRED",
        };
        f.write_str(s)
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors raised by batch transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    /// The batch has been recalled. Checked before every other guard.
    #[error("batch {batch_id} has been recalled")]
    Recalled {
        /// The recalled batch.
        batch_id: BatchId,
    },

    /// The batch is in a terminal state.
    #[error("batch {batch_id} is in terminal state {state}")]
    Terminal {
        /// The batch identifier.
        batch_id: BatchId,
        /// The terminal state.
        state: BatchStatus,
    },

    /// The requested transition is not valid from the current state.
    #[error("invalid batch transition for {batch_id}: {from} -> {to}")]
    InvalidTransition {
        /// The batch identifier.
        batch_id: BatchId,
        /// Current state.
        from: BatchStatus,
        /// Attempted target state.
        to: BatchStatus,
    },

    /// The batch is reserved by an open shipment.
    #[error("batch {batch_id} is reserved by shipment {shipment_id}")]
    Reserved {
        /// The batch identifier.
        batch_id: BatchId,
        /// The shipment holding the reservation.
        shipment_id: ShipmentId,
    },

    /// The batch is not reserved by the given shipment.
    #[error("batch {batch_id} is not reserved by shipment {shipment_id}")]
    NotReservedBy {
        /// The batch identifier.
        batch_id: BatchId,
        /// The shipment that expected to hold the reservation.
        shipment_id: ShipmentId,
    },

    /// A quantity of zero was requested.
    #[error("quantity for batch {batch_id} must be greater than zero")]
    InvalidQuantity {
        /// The batch identifier.
        batch_id: BatchId,
    },

    /// More was requested than the batch holds.
    #[error("batch {batch_id} holds {available}, {requested} requested")]
    InsufficientQuantity {
        /// The batch identifier.
        batch_id: BatchId,
        /// Quantity requested.
        requested: u64,
        /// Quantity available.
        available: u64,
    },

    /// Expiry was requested before the expiry date.
    #[error("batch {batch_id} expires on {exp_date}, not expired as of {as_of}")]
    NotExpired {
        /// The batch identifier.
        batch_id: BatchId,
        /// The batch expiry date.
        exp_date: NaiveDate,
        /// The date the caller evaluated expiry at.
        as_of: NaiveDate,
    },

    /// Expiry date precedes manufacturing date.
    #[error("batch {batch_id} expiry {exp_date} precedes manufacture {mfg_date}")]
    InvalidDates {
        /// The batch identifier.
        batch_id: BatchId,
        /// Manufacturing date.
        mfg_date: NaiveDate,
        /// Expiry date.
        exp_date: NaiveDate,
    },
}

// ─── Batch ───────────────────────────────────────────────────────────

/// Parameters for a freshly manufactured batch.
#[derive(Debug, Clone)]
pub struct NewBatch {
    /// Caller-chosen batch identifier.
    pub id: BatchId,
    /// The product this batch is an instance of.
    pub product: ProductId,
    /// Manufacturer of the product; becomes the first owner.
    pub manufacturer: OrgId,
    /// Units in the batch. Must be positive.
    pub quantity: u64,
    /// Manufacturing date.
    pub mfg_date: NaiveDate,
    /// Expiry date.
    pub exp_date: NaiveDate,
    /// Place of manufacture.
    pub origin: String,
}

/// A batch with its lifecycle state and transition history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    /// Unique batch identifier.
    pub id: BatchId,
    /// The product this batch is an instance of.
    pub product: ProductId,
    /// Manufacturer of the product. Inherited by split children.
    pub manufacturer: OrgId,
    /// Units currently in the batch.
    pub quantity: u64,
    /// Manufacturing date.
    pub mfg_date: NaiveDate,
    /// Expiry date.
    pub exp_date: NaiveDate,
    /// Place of manufacture.
    pub origin: String,
    /// Current owner.
    pub owner: OrgId,
    /// Current lifecycle state.
    pub status: BatchStatus,
    /// The batch this one was split from.
    pub parent: Option<BatchId>,
    /// The open shipment holding this batch, if any.
    pub reserved_by: Option<ShipmentId>,
    /// State held when the reservation was taken; restored on release.
    pub status_before_reservation: Option<BatchStatus>,
    /// Reason given by the regulator on recall.
    pub recall_reason: Option<String>,
    /// When the batch was created.
    pub created_at: Timestamp,
    /// When the batch last changed.
    pub updated_at: Timestamp,
    /// Ordered log of every mutation.
    pub history: Vec<TransitionRecord<BatchStatus>>,
}

impl Batch {
    /// Create a batch in the `Created` state owned by its manufacturer.
    pub fn create(new: NewBatch, evidence: &TransitionEvidence) -> Result<Self, BatchError> {
        if new.quantity == 0 {
            return Err(BatchError::InvalidQuantity { batch_id: new.id });
        }
        if new.exp_date < new.mfg_date {
            return Err(BatchError::InvalidDates {
                batch_id: new.id,
                mfg_date: new.mfg_date,
                exp_date: new.exp_date,
            });
        }
        Ok(Self {
            owner: new.manufacturer.clone(),
            id: new.id,
            product: new.product,
            manufacturer: new.manufacturer,
            quantity: new.quantity,
            mfg_date: new.mfg_date,
            exp_date: new.exp_date,
            origin: new.origin,
            status: BatchStatus::Created,
            parent: None,
            reserved_by: None,
            status_before_reservation: None,
            recall_reason: None,
            created_at: evidence.at,
            updated_at: evidence.at,
            history: vec![TransitionRecord::new(
                BatchStatus::Created,
                BatchStatus::Created,
                evidence,
            )],
        })
    }

    /// Whether the batch has been recalled.
    pub fn is_recalled(&self) -> bool {
        self.status == BatchStatus::Recalled
    }

    /// Whether the batch is held by an open shipment.
    pub fn is_reserved(&self) -> bool {
        self.reserved_by.is_some()
    }

    /// Fail with [`BatchError::Recalled`] if the batch has been recalled.
    pub fn ensure_not_recalled(&self) -> Result<(), BatchError> {
        if self.is_recalled() {
            return Err(BatchError::Recalled {
                batch_id: self.id.clone(),
            });
        }
        Ok(())
    }

    /// Fail unless the batch is neither recalled, terminal, nor reserved.
    pub fn ensure_available(&self) -> Result<(), BatchError> {
        self.ensure_not_recalled()?;
        if self.status.is_terminal() {
            return Err(BatchError::Terminal {
                batch_id: self.id.clone(),
                state: self.status,
            });
        }
        if let Some(shipment_id) = &self.reserved_by {
            return Err(BatchError::Reserved {
                batch_id: self.id.clone(),
                shipment_id: shipment_id.clone(),
            });
        }
        Ok(())
    }

    /// Split `quantity` units off into a new child batch.
    ///
    /// The parent is decremented by exactly `quantity`; the child inherits
    /// product, manufacturer, owner, dates, origin and status.
    pub fn split(
        &mut self,
        child_id: BatchId,
        quantity: u64,
        evidence: &TransitionEvidence,
    ) -> Result<Batch, BatchError> {
        self.ensure_available()?;
        self.check_quantity(quantity)?;

        self.quantity -= quantity;
        let child = Batch {
            id: child_id,
            product: self.product.clone(),
            manufacturer: self.manufacturer.clone(),
            quantity,
            mfg_date: self.mfg_date,
            exp_date: self.exp_date,
            origin: self.origin.clone(),
            owner: self.owner.clone(),
            status: self.status,
            parent: Some(self.id.clone()),
            reserved_by: None,
            status_before_reservation: None,
            recall_reason: None,
            created_at: evidence.at,
            updated_at: evidence.at,
            history: vec![TransitionRecord::new(self.status, self.status, evidence)],
        };
        self.record(self.status, evidence);
        Ok(child)
    }

    /// Sell `quantity` units to consumers. Reaching zero consumes the batch.
    pub fn sell(&mut self, quantity: u64, evidence: &TransitionEvidence) -> Result<(), BatchError> {
        self.ensure_available()?;
        self.check_quantity(quantity)?;

        self.quantity -= quantity;
        let to = if self.quantity == 0 {
            BatchStatus::Consumed
        } else {
            self.status
        };
        self.record(to, evidence);
        Ok(())
    }

    /// Recall the batch. Valid from every state except `Recalled`.
    pub fn recall(&mut self, evidence: &TransitionEvidence) -> Result<(), BatchError> {
        self.ensure_not_recalled()?;
        self.recall_reason = Some(evidence.reason.clone());
        self.record(BatchStatus::Recalled, evidence);
        Ok(())
    }

    /// Mark the batch expired as of `as_of`.
    pub fn expire(
        &mut self,
        as_of: NaiveDate,
        evidence: &TransitionEvidence,
    ) -> Result<(), BatchError> {
        self.ensure_available()?;
        if self.exp_date > as_of {
            return Err(BatchError::NotExpired {
                batch_id: self.id.clone(),
                exp_date: self.exp_date,
                as_of,
            });
        }
        self.record(BatchStatus::Expired, evidence);
        Ok(())
    }

    /// Reserve the batch for an open shipment (→ `InTransit`).
    pub fn reserve(
        &mut self,
        shipment_id: &ShipmentId,
        evidence: &TransitionEvidence,
    ) -> Result<(), BatchError> {
        self.ensure_available()?;
        if !self.status.is_shippable() {
            return Err(self.invalid(BatchStatus::InTransit));
        }
        self.reserved_by = Some(shipment_id.clone());
        self.status_before_reservation = Some(self.status);
        self.record(BatchStatus::InTransit, evidence);
        Ok(())
    }

    /// The carrying shipment was delivered (`InTransit` → `Arrived`).
    pub fn mark_arrived(
        &mut self,
        shipment_id: &ShipmentId,
        evidence: &TransitionEvidence,
    ) -> Result<(), BatchError> {
        self.ensure_held_by(shipment_id)?;
        if self.status != BatchStatus::InTransit {
            return Err(self.invalid(BatchStatus::Arrived));
        }
        self.record(BatchStatus::Arrived, evidence);
        Ok(())
    }

    /// The carrying shipment was rejected: drop the reservation and restore
    /// the state held before it. Ownership does not change.
    pub fn release(
        &mut self,
        shipment_id: &ShipmentId,
        evidence: &TransitionEvidence,
    ) -> Result<(), BatchError> {
        self.ensure_held_by(shipment_id)?;
        let restored = self
            .status_before_reservation
            .take()
            .unwrap_or(BatchStatus::Created);
        self.reserved_by = None;
        self.record(restored, evidence);
        Ok(())
    }

    /// The carrying shipment was accepted: hand the batch to `new_owner`
    /// and drop the reservation (→ `Delivered`).
    ///
    /// This is the only place the owner changes.
    pub fn transfer_to(
        &mut self,
        shipment_id: &ShipmentId,
        new_owner: OrgId,
        evidence: &TransitionEvidence,
    ) -> Result<(), BatchError> {
        self.ensure_held_by(shipment_id)?;
        if !matches!(self.status, BatchStatus::InTransit | BatchStatus::Arrived) {
            return Err(self.invalid(BatchStatus::Delivered));
        }
        self.owner = new_owner;
        self.reserved_by = None;
        self.status_before_reservation = None;
        self.record(BatchStatus::Delivered, evidence);
        Ok(())
    }

    fn ensure_held_by(&self, shipment_id: &ShipmentId) -> Result<(), BatchError> {
        self.ensure_not_recalled()?;
        if self.reserved_by.as_ref() != Some(shipment_id) {
            return Err(BatchError::NotReservedBy {
                batch_id: self.id.clone(),
                shipment_id: shipment_id.clone(),
            });
        }
        Ok(())
    }

    fn check_quantity(&self, requested: u64) -> Result<(), BatchError> {
        if requested == 0 {
            return Err(BatchError::InvalidQuantity {
                batch_id: self.id.clone(),
            });
        }
        if requested > self.quantity {
            return Err(BatchError::InsufficientQuantity {
                batch_id: self.id.clone(),
                requested,
                available: self.quantity,
            });
        }
        Ok(())
    }

    fn invalid(&self, to: BatchStatus) -> BatchError {
        BatchError::InvalidTransition {
            batch_id: self.id.clone(),
            from: self.status,
            to,
        }
    }

    fn record(&mut self, to: BatchStatus, evidence: &TransitionEvidence) {
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

    fn org(s: &str) -> OrgId {
        OrgId::new(s).unwrap()
    }

    fn ev(reason: &str) -> TransitionEvidence {
        TransitionEvidence::new(org("mfr-1"), reason)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn make_batch(qty: u64) -> Batch {
        Batch::create(
            NewBatch {
                id: BatchId::new("B1").unwrap(),
                product: ProductId::new("P1").unwrap(),
                manufacturer: org("mfr-1"),
                quantity: qty,
                mfg_date: date(2026, 1, 10),
                exp_date: date(2027, 1, 10),
                origin: "Plant A".into(),
            },
            &ev("manufactured"),
        )
        .unwrap()
    }

    fn shipment(s: &str) -> ShipmentId {
        ShipmentId::new(s).unwrap()
    }

    #[test]
    fn new_batch_is_created_and_owned_by_manufacturer() {
        let b = make_batch(1000);
        assert_eq!(b.status, BatchStatus::Created);
        assert_eq!(b.owner, org("mfr-1"));
        assert_eq!(b.history.len(), 1);
    }

    #[test]
    fn zero_quantity_batch_rejected() {
        let err = Batch::create(
            NewBatch {
                id: BatchId::new("B0").unwrap(),
                product: ProductId::new("P1").unwrap(),
                manufacturer: org("mfr-1"),
                quantity: 0,
                mfg_date: date(2026, 1, 1),
                exp_date: date(2026, 6, 1),
                origin: "Plant A".into(),
            },
            &ev("manufactured"),
        )
        .unwrap_err();
        assert!(matches!(err, BatchError::InvalidQuantity { .. }));
    }

    #[test]
    fn expiry_before_manufacture_rejected() {
        let err = Batch::create(
            NewBatch {
                id: BatchId::new("B0").unwrap(),
                product: ProductId::new("P1").unwrap(),
                manufacturer: org("mfr-1"),
                quantity: 5,
                mfg_date: date(2026, 6, 1),
                exp_date: date(2026, 1, 1),
                origin: "Plant A".into(),
            },
            &ev("manufactured"),
        )
        .unwrap_err();
        assert!(matches!(err, BatchError::InvalidDates { .. }));
    }

    #[test]
    fn split_conserves_quantity() {
        let mut parent = make_batch(1000);
        let child = parent
            .split(BatchId::new("B1-SUB1").unwrap(), 300, &ev("split"))
            .unwrap();
        assert_eq!(parent.quantity, 700);
        assert_eq!(child.quantity, 300);
        assert_eq!(child.parent.as_ref(), Some(&parent.id));
        assert_eq!(child.owner, parent.owner);
        assert_eq!(child.status, parent.status);
    }

    #[test]
    fn split_entire_quantity_is_allowed() {
        let mut parent = make_batch(10);
        parent
            .split(BatchId::new("B1-ALL").unwrap(), 10, &ev("split"))
            .unwrap();
        assert_eq!(parent.quantity, 0);
    }

    #[test]
    fn split_more_than_available_fails() {
        let mut parent = make_batch(100);
        let err = parent
            .split(BatchId::new("B2").unwrap(), 101, &ev("split"))
            .unwrap_err();
        assert_eq!(
            err,
            BatchError::InsufficientQuantity {
                batch_id: parent.id.clone(),
                requested: 101,
                available: 100
            }
        );
        assert_eq!(parent.quantity, 100);
    }

    #[test]
    fn split_zero_fails() {
        let mut parent = make_batch(100);
        assert!(matches!(
            parent.split(BatchId::new("B2").unwrap(), 0, &ev("split")),
            Err(BatchError::InvalidQuantity { .. })
        ));
    }

    #[test]
    fn sell_to_zero_consumes() {
        let mut b = make_batch(50);
        b.sell(20, &ev("sale")).unwrap();
        assert_eq!(b.status, BatchStatus::Created);
        b.sell(30, &ev("sale")).unwrap();
        assert_eq!(b.quantity, 0);
        assert_eq!(b.status, BatchStatus::Consumed);
        assert!(matches!(
            b.sell(1, &ev("sale")),
            Err(BatchError::Terminal { .. })
        ));
    }

    #[test]
    fn recall_is_sticky_and_checked_first() {
        let mut b = make_batch(50);
        b.reserve(&shipment("S1"), &ev("ship")).unwrap();
        b.recall(&ev("contamination")).unwrap();
        assert_eq!(b.recall_reason.as_deref(), Some("contamination"));

        let id = b.id.clone();
        let recalled = BatchError::Recalled { batch_id: id };
        assert_eq!(b.recall(&ev("again")).unwrap_err(), recalled);
        assert_eq!(b.sell(1, &ev("sale")).unwrap_err(), recalled);
        assert_eq!(
            b.split(BatchId::new("B9").unwrap(), 1, &ev("split")).unwrap_err(),
            recalled
        );
        assert_eq!(
            b.transfer_to(&shipment("S1"), org("dist-1"), &ev("accept"))
                .unwrap_err(),
            recalled
        );
        assert_eq!(b.release(&shipment("S1"), &ev("reject")).unwrap_err(), recalled);
    }

    #[test]
    fn recall_allowed_after_consumption_or_expiry() {
        let mut b = make_batch(5);
        b.sell(5, &ev("sale")).unwrap();
        b.recall(&ev("late finding")).unwrap();
        assert_eq!(b.status, BatchStatus::Recalled);
    }

    #[test]
    fn reserve_blocks_second_reservation_and_split() {
        let mut b = make_batch(100);
        b.reserve(&shipment("S1"), &ev("ship")).unwrap();
        assert_eq!(b.status, BatchStatus::InTransit);
        assert!(matches!(
            b.reserve(&shipment("S2"), &ev("ship")),
            Err(BatchError::Reserved { .. })
        ));
        assert!(matches!(
            b.split(BatchId::new("B2").unwrap(), 10, &ev("split")),
            Err(BatchError::Reserved { .. })
        ));
        assert!(matches!(
            b.sell(10, &ev("sale")),
            Err(BatchError::Reserved { .. })
        ));
    }

    #[test]
    fn accept_path_transfers_ownership() {
        let mut b = make_batch(100);
        let s1 = shipment("S1");
        b.reserve(&s1, &ev("ship")).unwrap();
        b.mark_arrived(&s1, &ev("delivered")).unwrap();
        b.transfer_to(&s1, org("dist-1"), &ev("accepted")).unwrap();
        assert_eq!(b.status, BatchStatus::Delivered);
        assert_eq!(b.owner, org("dist-1"));
        assert!(!b.is_reserved());
        // A delivered batch can be shipped onward.
        b.reserve(&shipment("S2"), &ev("ship")).unwrap();
    }

    #[test]
    fn release_restores_previous_state_and_owner() {
        let mut b = make_batch(100);
        let s1 = shipment("S1");
        b.reserve(&s1, &ev("ship")).unwrap();
        b.mark_arrived(&s1, &ev("delivered")).unwrap();
        b.release(&s1, &ev("rejected")).unwrap();
        assert_eq!(b.status, BatchStatus::Created);
        assert_eq!(b.owner, org("mfr-1"));
        assert!(!b.is_reserved());
    }

    #[test]
    fn wrong_shipment_cannot_touch_reservation() {
        let mut b = make_batch(100);
        b.reserve(&shipment("S1"), &ev("ship")).unwrap();
        assert!(matches!(
            b.transfer_to(&shipment("S2"), org("x"), &ev("accept")),
            Err(BatchError::NotReservedBy { .. })
        ));
    }

    #[test]
    fn expire_requires_date_passed() {
        let mut b = make_batch(100);
        assert!(matches!(
            b.expire(date(2026, 12, 31), &ev("expire")),
            Err(BatchError::NotExpired { .. })
        ));
        b.expire(date(2027, 1, 10), &ev("expire")).unwrap();
        assert_eq!(b.status, BatchStatus::Expired);
        assert!(matches!(
            b.reserve(&shipment("S1"), &ev("ship")),
            Err(BatchError::Terminal { .. })
        ));
    }

    #[test]
    fn history_records_every_mutation() {
        let mut b = make_batch(100);
        b.sell(10, &ev("sale")).unwrap();
        b.reserve(&shipment("S1"), &ev("ship")).unwrap();
        let states: Vec<_> = b.history.iter().map(|r| r.to_state).collect();
        assert_eq!(
            states,
            vec![BatchStatus::Created, BatchStatus::Created, BatchStatus::InTransit]
        );
    }

    #[test]
    fn status_serializes_screaming_snake_case() {
        assert_eq!(
            serde_json::to_string(&BatchStatus::InTransit).unwrap(),
            "\"IN_TRANSIT\""
        );
        assert_eq!(BatchStatus::InTransit.to_string(), "IN_TRANSIT");
    }
}
