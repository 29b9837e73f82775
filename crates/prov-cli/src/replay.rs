//! # Replay Subcommand
//!
//! Runs a scenario file against a fresh in-process engine and checks each
//! step's outcome against its expectation.
//!
//! ```yaml
//! name: recall blocks shipping
//! steps:
//!   - actor: regulator:fda
//!     op:
//!       onboard_organization: { org_id: mfr-1, org_type: manufacturer, name: Acme }
//!   - actor: regulator:fda
//!     op:
//!       recall_batch: { batch_id: B1, reason: contamination }
//!     expect: NotFound
//! ```
//!
//! `actor` is `{role}:{org_id}`. `expect` is `ok` (the default) or an error
//! kind such as `Recalled`. Transporter pool steps name the transporter by
//! organization; its assigned identity is looked up at replay time.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::Args;
use serde::{Deserialize, Serialize};

use prov_core::{Actor, BatchId, Identity, OrgId, Role, ShipmentId, UserId};
use prov_engine::{
    BatchSpec, Engine, EngineConfig, EngineError, Envelope, OrganizationSpec, Outcome,
    ProductSpec, ShipmentSpec,
};
use prov_state::{TransitReading, TransporterProfile};

/// Arguments for the `prov replay` subcommand.
#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Scenario file (YAML or JSON).
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Print each step's envelope as a JSON line.
    #[arg(long)]
    pub json: bool,

    /// Stop at the first step whose outcome differs from its expectation.
    #[arg(long)]
    pub fail_fast: bool,
}

/// A scenario: an ordered list of steps.
#[derive(Debug, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    pub steps: Vec<Step>,
}

/// One engine call.
#[derive(Debug, Deserialize)]
pub struct Step {
    /// `{role}:{org_id}`.
    pub actor: String,
    #[serde(default)]
    pub user: Option<String>,
    pub op: Command,
    /// `ok` or an error kind. Defaults to `ok`.
    #[serde(default)]
    pub expect: Option<String>,
}

/// Engine operations a scenario can invoke.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    OnboardOrganization(OrganizationSpec),
    SuspendOrganization { org_id: OrgId, reason: String },
    ReinstateOrganization { org_id: OrgId, reason: String },
    RegisterProduct(ProductSpec),
    CreateBatch(BatchSpec),
    SplitBatch { batch_id: BatchId, child_id: BatchId, quantity: u64 },
    SellToConsumer { batch_id: BatchId, quantity: u64 },
    RecallBatch { batch_id: BatchId, reason: String },
    ExpireBatch { batch_id: BatchId, as_of: NaiveDate },
    RequestTransporter {
        manufacturer: OrgId,
        transporter: OrgId,
        profile: TransporterProfile,
    },
    ApproveTransporter { manufacturer: OrgId, transporter: OrgId },
    RejectTransporter {
        manufacturer: OrgId,
        transporter: OrgId,
        #[serde(default)]
        reason: Option<String>,
    },
    AddTransporterToPool {
        manufacturer: OrgId,
        transporter: OrgId,
        profile: TransporterProfile,
    },
    CreateShipment(ShipmentSpec),
    ConfirmPickup { shipment_id: ShipmentId, location: String },
    LogTransit { shipment_id: ShipmentId, reading: TransitReading },
    CompleteDelivery {
        shipment_id: ShipmentId,
        location: String,
        #[serde(default)]
        proof: Option<String>,
    },
    AcceptDelivery { shipment_id: ShipmentId, location: String },
    RejectDelivery { shipment_id: ShipmentId, reason: String },
}

impl Command {
    /// Operation name as used in audit events.
    pub fn name(&self) -> &'static str {
        match self {
            Self::OnboardOrganization(_) => "onboard_organization",
            Self::SuspendOrganization { .. } => "suspend_organization",
            Self::ReinstateOrganization { .. } => "reinstate_organization",
            Self::RegisterProduct(_) => "register_product",
            Self::CreateBatch(_) => "create_batch",
            Self::SplitBatch { .. } => "split_batch",
            Self::SellToConsumer { .. } => "sell_to_consumer",
            Self::RecallBatch { .. } => "recall_batch",
            Self::ExpireBatch { .. } => "expire_batch",
            Self::RequestTransporter { .. } => "request_transporter",
            Self::ApproveTransporter { .. } => "approve_transporter",
            Self::RejectTransporter { .. } => "reject_transporter",
            Self::AddTransporterToPool { .. } => "add_transporter_to_pool",
            Self::CreateShipment(_) => "create_shipment",
            Self::ConfirmPickup { .. } => "confirm_pickup",
            Self::LogTransit { .. } => "log_transit",
            Self::CompleteDelivery { .. } => "complete_delivery",
            Self::AcceptDelivery { .. } => "accept_delivery",
            Self::RejectDelivery { .. } => "reject_delivery",
        }
    }
}

/// Result of one replayed step.
#[derive(Debug, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub op: &'static str,
    pub actor: String,
    pub expected: String,
    pub met: bool,
    pub envelope: Envelope<serde_json::Value>,
}

/// Execute the replay subcommand.
pub fn run_replay(args: &ReplayArgs, config: EngineConfig) -> Result<u8> {
    let document = crate::read_document(&args.file)?;
    let scenario: Scenario = serde_json::from_value(document)
        .with_context(|| format!("invalid scenario: {}", args.file.display()))?;
    let engine = Engine::new(config).context("failed to build engine")?;

    if let Some(name) = &scenario.name {
        tracing::info!(scenario = %name, steps = scenario.steps.len(), "replaying");
    }

    let reports = replay(&engine, scenario.steps, args.fail_fast)?;
    let mut unmet = 0;
    for report in &reports {
        if args.json {
            println!("{}", serde_json::to_string(report)?);
        } else {
            println!("{}", summarize(report));
        }
        if !report.met {
            unmet += 1;
        }
    }

    if unmet == 0 {
        println!("OK: {} step(s) replayed", reports.len());
        Ok(0)
    } else {
        println!("FAILED: {unmet} of {} step(s) did not meet expectations", reports.len());
        Ok(1)
    }
}

/// Replay `steps` in order against `engine`.
pub fn replay(engine: &Engine, steps: Vec<Step>, fail_fast: bool) -> Result<Vec<StepReport>> {
    let mut reports = Vec::with_capacity(steps.len());
    for (i, step) in steps.into_iter().enumerate() {
        let index = i + 1;
        let actor = parse_actor(&step.actor, step.user.as_deref())
            .with_context(|| format!("step {index}: invalid actor {:?}", step.actor))?;
        let expected = step.expect.unwrap_or_else(|| "ok".to_string());
        let op = step.op.name();
        let envelope = execute(engine, &actor, step.op);
        let met = meets(&envelope, &expected);
        tracing::debug!(index, op, met, "step replayed");
        reports.push(StepReport {
            index,
            op,
            actor: step.actor,
            expected,
            met,
            envelope,
        });
        if fail_fast && !met {
            break;
        }
    }
    Ok(reports)
}

fn parse_actor(raw: &str, user: Option<&str>) -> Result<Actor> {
    let Some((role, org)) = raw.split_once(':') else {
        bail!("expected {{role}}:{{org_id}}");
    };
    let role: Role = role.parse()?;
    let actor = Actor::new(OrgId::new(org)?, role);
    Ok(match user {
        Some(user) => actor.with_user(UserId::new(user)?),
        None => actor,
    })
}

fn meets(envelope: &Envelope<serde_json::Value>, expected: &str) -> bool {
    match &envelope.error_kind {
        None => expected.eq_ignore_ascii_case("ok"),
        Some(kind) => kind.as_str() == expected,
    }
}

fn summarize(report: &StepReport) -> String {
    let outcome = match (&report.envelope.error_kind, &report.envelope.anchor_ref) {
        (Some(kind), _) => format!(
            "{kind}: {}",
            report.envelope.message.as_deref().unwrap_or("internal error")
        ),
        (None, Some(anchor)) => format!("ok anchor={anchor}"),
        (None, None) => "ok (no change)".to_string(),
    };
    let marker = if report.met { "  " } else { "!!" };
    format!(
        "{marker} [{:>3}] {} by {} -> {outcome}",
        report.index, report.op, report.actor
    )
}

fn wrap<T: Serialize>(result: Result<Outcome<T>, EngineError>) -> Envelope<serde_json::Value> {
    match result {
        Ok(out) => match serde_json::to_value(&out.data) {
            Ok(data) => Envelope::ok(data, out.anchor_ref),
            Err(e) => Envelope::error(&EngineError::Internal(e.to_string())),
        },
        Err(e) => Envelope::error(&e),
    }
}

fn identity_of(engine: &Engine, org: &OrgId) -> Result<Identity, EngineError> {
    engine.directory().organization(org).map(|o| o.identity)
}

fn execute(engine: &Engine, actor: &Actor, command: Command) -> Envelope<serde_json::Value> {
    let registry = engine.registry();
    let custody = engine.custody();
    let authority = engine.authority();
    let directory = engine.directory();

    match command {
        Command::OnboardOrganization(spec) => wrap(directory.onboard_organization(actor, spec)),
        Command::SuspendOrganization { org_id, reason } => {
            wrap(directory.suspend_organization(actor, &org_id, &reason))
        }
        Command::ReinstateOrganization { org_id, reason } => {
            wrap(directory.reinstate_organization(actor, &org_id, &reason))
        }
        Command::RegisterProduct(spec) => wrap(registry.register_product(actor, spec)),
        Command::CreateBatch(spec) => wrap(registry.create_batch(actor, spec)),
        Command::SplitBatch {
            batch_id,
            child_id,
            quantity,
        } => wrap(registry.split_batch(actor, &batch_id, &child_id, quantity)),
        Command::SellToConsumer { batch_id, quantity } => {
            wrap(registry.sell_to_consumer(actor, &batch_id, quantity))
        }
        Command::RecallBatch { batch_id, reason } => {
            wrap(registry.recall_batch(actor, &batch_id, &reason))
        }
        Command::ExpireBatch { batch_id, as_of } => {
            wrap(registry.expire_batch(actor, &batch_id, as_of))
        }
        Command::RequestTransporter {
            manufacturer,
            transporter,
            profile,
        } => wrap(identity_of(engine, &transporter).and_then(|identity| {
            authority.request_transporter(actor, &manufacturer, &identity, profile)
        })),
        Command::ApproveTransporter {
            manufacturer,
            transporter,
        } => wrap(identity_of(engine, &transporter).and_then(|identity| {
            authority.approve_transporter(actor, &manufacturer, &identity)
        })),
        Command::RejectTransporter {
            manufacturer,
            transporter,
            reason,
        } => wrap(identity_of(engine, &transporter).and_then(|identity| {
            authority.reject_transporter(actor, &manufacturer, &identity, reason.as_deref())
        })),
        Command::AddTransporterToPool {
            manufacturer,
            transporter,
            profile,
        } => wrap(identity_of(engine, &transporter).and_then(|identity| {
            authority.add_transporter_to_pool(actor, &manufacturer, &identity, profile)
        })),
        Command::CreateShipment(spec) => wrap(custody.create_shipment(actor, spec)),
        Command::ConfirmPickup {
            shipment_id,
            location,
        } => wrap(custody.confirm_pickup(actor, &shipment_id, &location)),
        Command::LogTransit {
            shipment_id,
            reading,
        } => wrap(custody.log_transit(actor, &shipment_id, reading)),
        Command::CompleteDelivery {
            shipment_id,
            location,
            proof,
        } => wrap(custody.complete_delivery(actor, &shipment_id, &location, proof)),
        Command::AcceptDelivery {
            shipment_id,
            location,
        } => wrap(custody.accept_delivery(actor, &shipment_id, &location)),
        Command::RejectDelivery {
            shipment_id,
            reason,
        } => wrap(custody.reject_delivery(actor, &shipment_id, &reason)),
    }
}
