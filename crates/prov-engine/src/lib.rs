//! # prov-engine: Custody & Provenance Engine
//!
//! Enforces who may move which goods, and anchors every resulting record.
//!
//! ## Components
//!
//! - **Registry** (`registry.rs`): products and batches; creation,
//!   splitting, consumer sales, recall cascades, expiry, lineage.
//! - **CustodyEngine** (`custody.rs`): the shipment state machine and the
//!   batch reservation lock; ownership moves only on acceptance.
//! - **TransporterAuthority** (`authority.rs`): per-manufacturer pools of
//!   approved carriers.
//! - **Directory** (`directory.rs`): onboarded organizations, their
//!   identities and suspension status.
//!
//! ## Plumbing
//!
//! - **Ledger** (`ledger.rs`): versioned tables with optimistic commits.
//!   A commit anchors every written record or fails as a whole.
//! - **Capability check** (`capability.rs`): a pure function of the actor
//!   and the operation's target.
//! - **Audit** (`audit.rs`): one event per successful mutation, fanned out
//!   to [`AuditSink`]s.
//! - **Configuration** (`config.rs`), **metrics** (`metrics.rs`) and the
//!   response [`Envelope`].
//!
//! ## Check order
//!
//! Every mutation checks, in order:
//!
//! 1. the actor: onboarded, active, role matching the organization type;
//! 2. existence of the referenced entities;
//! 3. recall of any referenced batch, so a recalled batch reports
//!    `Recalled` even when the rest of the input is malformed;
//! 4. input validation (required text, shipment shape);
//! 5. the capability check;
//! 6. the entity's own state machine.

pub mod audit;
pub mod authority;
pub mod capability;
pub mod config;
pub mod custody;
pub mod directory;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod registry;

#[cfg(test)]
mod testing;

pub use audit::{AuditEvent, AuditLog, AuditSink, TracingAuditSink};
pub use authority::TransporterAuthority;
pub use capability::{authorize, Denial, Operation};
pub use config::{AuditConfig, ConfigError, EngineConfig, IdentityBackend};
pub use custody::{CustodyEngine, ShipmentSpec};
pub use directory::{Directory, OrganizationSpec, WalletView};
pub use engine::{Engine, EngineBuilder, Outcome};
pub use envelope::Envelope;
pub use error::{EngineError, ErrorKind};
pub use ledger::{Ledger, PoolKey, Record, Tx, Versioned};
pub use registry::{BatchLineage, BatchSpec, ProductSpec, Registry, SplitResult};
