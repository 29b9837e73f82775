//! # prov-state: Entity State Machines
//!
//! Enum-based state machines for the custody engine. Each entity carries its
//! own append-only transition history; transitions are methods returning
//! `Result`, so an invalid move is rejected with a structured error and
//! leaves the entity untouched.
//!
//! - **Batch** (`batch.rs`): `Created → InTransit → Arrived → Delivered`,
//!   with `Consumed`, `Recalled` and `Expired` terminal states and the
//!   shipment reservation lock.
//! - **Shipment** (`shipment.rs`): `PendingPickup → PickedUp → InTransit →
//!   Delivered → Accepted | Rejected`, plus the self-delivery shortcut and
//!   fixed-point transit readings.
//! - **Transporter pool entry** (`transporter.rs`): `Pending → Approved |
//!   Rejected`, re-openable after rejection.
//! - **Product** and **Organization** records.
//!
//! Authorization is not checked here. The engine decides who may call a
//! transition; this crate decides whether the transition is legal.

pub mod batch;
pub mod organization;
pub mod product;
pub mod shipment;
pub mod transition;
pub mod transporter;

pub use batch::{Batch, BatchError, BatchStatus, NewBatch};
pub use organization::{OrgStatus, Organization};
pub use product::Product;
pub use shipment::{
    Conveyance, NewShipment, SafeRange, Shipment, ShipmentError, ShipmentStatus, TransitLog,
    TransitReading,
};
pub use transition::{TransitionEvidence, TransitionRecord};
pub use transporter::{ApprovalStatus, PoolEntryError, TransporterPoolEntry, TransporterProfile};
