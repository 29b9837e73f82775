//! # Registry
//!
//! Products and batches: registration, creation, splitting, sale to
//! consumers, recall and expiry. Ownership changes only through
//! [`Registry::transfer_ownership`], which the custody engine calls when a
//! shipment is accepted.
//!
//! Guard order for every batch operation: the batch must exist, must not
//! be recalled, the actor must pass the capability check, then the state
//! machine decides.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use prov_core::{require_text, Actor, BatchId, OrgId, ProductId, ShipmentId};
use prov_state::{Batch, NewBatch, Product, TransitionEvidence};

use crate::capability::{authorize, Operation};
use crate::engine::{Applied, Engine, Outcome};
use crate::error::EngineError;
use crate::ledger::{Record, Tx};

/// Input to [`Registry::register_product`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSpec {
    /// Caller-chosen identifier.
    pub product_id: ProductId,
    /// Display name.
    pub name: String,
    /// Category, e.g. `vaccine`.
    pub category: String,
    /// Manufacturing organization.
    pub manufacturer: OrgId,
    /// Free-text description.
    #[serde(default)]
    pub description: Option<String>,
}

/// Input to [`Registry::create_batch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSpec {
    /// Caller-chosen identifier.
    pub batch_id: BatchId,
    /// Product the batch is made of.
    pub product_id: ProductId,
    /// Units produced.
    pub quantity: u64,
    /// Manufacturing date.
    pub mfg_date: NaiveDate,
    /// Expiry date.
    pub exp_date: NaiveDate,
    /// Production site.
    pub origin: String,
}

/// Both halves of a split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitResult {
    /// The parent after the split.
    pub parent: Batch,
    /// The new child batch.
    pub child: Batch,
}

/// Where a batch came from and what was split off it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchLineage {
    /// The batch itself.
    pub batch: Batch,
    /// Parent, grandparent, ... up to the root batch.
    pub ancestors: Vec<Batch>,
    /// Batches split directly off this one.
    pub children: Vec<Batch>,
}

/// Product and batch operations.
#[derive(Debug, Clone, Copy)]
pub struct Registry<'e> {
    engine: &'e Engine,
}

impl<'e> Registry<'e> {
    pub(crate) fn new(engine: &'e Engine) -> Self {
        Self { engine }
    }

    // ─── Mutations ──────────────────────────────────────────────────

    /// Register a product. The actor must be its manufacturer.
    pub fn register_product(
        &self,
        actor: &Actor,
        spec: ProductSpec,
    ) -> Result<Outcome<Product>, EngineError> {
        self.engine
            .execute("register_product", actor, move |tx, ev| {
                authorize(
                    actor,
                    &Operation::RegisterProduct {
                        manufacturer: &spec.manufacturer,
                    },
                )?;
                tx.ensure_absent::<Product>(&spec.product_id)?;
                let product = Product::new(
                    spec.product_id,
                    &spec.name,
                    &spec.category,
                    spec.manufacturer,
                    spec.description,
                    ev.at,
                )?;
                tx.put(product.clone());
                let id = product.id.clone();
                Ok(Applied::new(product, Product::ENTITY, id, "REGISTERED"))
            })
    }

    /// Create a batch of a product, owned by its manufacturer.
    pub fn create_batch(
        &self,
        actor: &Actor,
        spec: BatchSpec,
    ) -> Result<Outcome<Batch>, EngineError> {
        self.engine.execute("create_batch", actor, move |tx, ev| {
            let product: Product = tx.require(&spec.product_id)?;
            authorize(
                actor,
                &Operation::CreateBatch {
                    manufacturer: &product.manufacturer,
                },
            )?;
            tx.ensure_absent::<Batch>(&spec.batch_id)?;
            let batch = Batch::create(
                NewBatch {
                    id: spec.batch_id,
                    product: product.id,
                    manufacturer: product.manufacturer,
                    quantity: spec.quantity,
                    mfg_date: spec.mfg_date,
                    exp_date: spec.exp_date,
                    origin: require_text("origin", &spec.origin)?,
                },
                ev,
            )?;
            tx.put(batch.clone());
            Ok(batch_applied(batch))
        })
    }

    /// Split `quantity` units off `parent_id` into a new batch `child_id`.
    pub fn split_batch(
        &self,
        actor: &Actor,
        parent_id: &BatchId,
        child_id: &BatchId,
        quantity: u64,
    ) -> Result<Outcome<SplitResult>, EngineError> {
        self.engine.execute("split_batch", actor, |tx, ev| {
            let mut parent: Batch = tx.require(parent_id)?;
            parent.ensure_not_recalled()?;
            authorize(actor, &Operation::SplitBatch { owner: &parent.owner })?;
            tx.ensure_absent::<Batch>(child_id)?;
            let child = parent.split(child_id.clone(), quantity, ev)?;
            tx.put(parent.clone());
            tx.put(child.clone());
            let result = format!("{} left, {} split off", parent.quantity, child.quantity);
            Ok(Applied::new(
                SplitResult { parent, child },
                Batch::ENTITY,
                parent_id,
                result,
            ))
        })
    }

    /// Sell `quantity` units to consumers. Reaching zero consumes the batch.
    pub fn sell_to_consumer(
        &self,
        actor: &Actor,
        batch_id: &BatchId,
        quantity: u64,
    ) -> Result<Outcome<Batch>, EngineError> {
        self.engine.execute("sell_to_consumer", actor, |tx, ev| {
            let mut batch: Batch = tx.require(batch_id)?;
            batch.ensure_not_recalled()?;
            authorize(actor, &Operation::SellToConsumer { owner: &batch.owner })?;
            batch.sell(quantity, ev)?;
            tx.put(batch.clone());
            Ok(batch_applied(batch))
        })
    }

    /// Recall a batch and every batch split from it, irreversibly.
    pub fn recall_batch(
        &self,
        actor: &Actor,
        batch_id: &BatchId,
        reason: &str,
    ) -> Result<Outcome<Batch>, EngineError> {
        self.engine.execute("recall_batch", actor, |tx, ev| {
            let mut batch: Batch = tx.require(batch_id)?;
            batch.ensure_not_recalled()?;
            let reason = require_text("reason", reason)?;
            authorize(actor, &Operation::RecallBatch)?;
            batch.recall(&ev.with_reason(reason.clone()))?;
            tx.put(batch.clone());

            let cascade = ev.with_reason(format!("parent batch {batch_id} recalled: {reason}"));
            let mut frontier = vec![batch_id.clone()];
            let mut descendants = 0usize;
            while let Some(parent) = frontier.pop() {
                for found in self
                    .engine
                    .ledger()
                    .scan(|b: &Batch| b.parent.as_ref() == Some(&parent))
                {
                    let mut child: Batch = tx.require(&found.id)?;
                    frontier.push(child.id.clone());
                    if !child.is_recalled() {
                        child.recall(&cascade)?;
                        tx.put(child);
                        descendants += 1;
                    }
                }
            }
            if descendants > 0 {
                tracing::info!(batch_id = %batch_id, descendants, "recall cascaded to split batches");
            }
            Ok(batch_applied(batch))
        })
    }

    /// Mark a batch expired as of `as_of`. Owner or regulator.
    pub fn expire_batch(
        &self,
        actor: &Actor,
        batch_id: &BatchId,
        as_of: NaiveDate,
    ) -> Result<Outcome<Batch>, EngineError> {
        self.engine.execute("expire_batch", actor, |tx, ev| {
            let mut batch: Batch = tx.require(batch_id)?;
            batch.ensure_not_recalled()?;
            authorize(actor, &Operation::ExpireBatch { owner: &batch.owner })?;
            batch.expire(as_of, &ev.with_reason(format!("expired as of {as_of}")))?;
            tx.put(batch.clone());
            Ok(batch_applied(batch))
        })
    }

    /// Hand a batch reserved by `shipment_id` to `to`.
    ///
    /// Only reachable from the custody engine, inside its transaction.
    pub(crate) fn transfer_ownership(
        tx: &mut Tx<'_>,
        batch_id: &BatchId,
        shipment_id: &ShipmentId,
        to: &OrgId,
        evidence: &TransitionEvidence,
    ) -> Result<Batch, EngineError> {
        let mut batch: Batch = tx.require(batch_id)?;
        batch.transfer_to(shipment_id, to.clone(), evidence)?;
        tx.put(batch.clone());
        Ok(batch)
    }

    // ─── Queries ────────────────────────────────────────────────────

    /// One product.
    pub fn product(&self, id: &ProductId) -> Result<Product, EngineError> {
        self.engine
            .ledger()
            .get::<Product>(id)
            .map(|v| v.value)
            .ok_or_else(|| EngineError::not_found(Product::ENTITY, id))
    }

    /// All products, optionally of one manufacturer.
    pub fn products(&self, manufacturer: Option<&OrgId>) -> Vec<Product> {
        self.engine
            .ledger()
            .scan(|p: &Product| manufacturer.map_or(true, |m| &p.manufacturer == m))
    }

    /// One batch.
    pub fn batch(&self, id: &BatchId) -> Result<Batch, EngineError> {
        self.engine
            .ledger()
            .get::<Batch>(id)
            .map(|v| v.value)
            .ok_or_else(|| EngineError::not_found(Batch::ENTITY, id))
    }

    /// The parent chain and direct children of a batch.
    pub fn batch_lineage(&self, id: &BatchId) -> Result<BatchLineage, EngineError> {
        let ledger = self.engine.ledger();
        let batch = self.batch(id)?;
        let mut ancestors = Vec::new();
        let mut next = batch.parent.clone();
        while let Some(parent_id) = next {
            let Some(parent) = ledger.get::<Batch>(&parent_id) else {
                break;
            };
            next = parent.value.parent.clone();
            ancestors.push(parent.value);
            if ancestors.len() > ledger.count::<Batch>() {
                break;
            }
        }
        let children = ledger.scan(|b: &Batch| b.parent.as_ref() == Some(id));
        Ok(BatchLineage {
            batch,
            ancestors,
            children,
        })
    }

    /// Batches currently owned by `org`.
    pub fn batches_owned_by(&self, org: &OrgId) -> Vec<Batch> {
        self.engine.ledger().scan(|b: &Batch| &b.owner == org)
    }
}

fn batch_applied(batch: Batch) -> Applied<Batch> {
    let id = batch.id.clone();
    let status = batch.status;
    Applied::new(batch, Batch::ENTITY, id, status)
}
