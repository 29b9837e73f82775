//! # Versioned Ledger
//!
//! Typed tables of [`Versioned`] rows behind one `parking_lot::RwLock`.
//!
//! ## Optimistic transactions
//!
//! An operation opens a [`Tx`], reads the rows it needs (each read records
//! the version it saw, or that the row was absent), validates and mutates
//! clones with no lock held, stages the results with [`Tx::put`], and calls
//! [`Tx::commit`]. Under the write lock the commit:
//!
//! 1. checks every recorded version is still current, failing with
//!    [`EngineError::Conflict`] otherwise;
//! 2. anchors every staged row through [`AnchorService::anchor_all`];
//! 3. applies the staged rows, bumping each version.
//!
//! A failure at step 1 or 2 leaves both the tables and the anchor log
//! untouched. Different entities never conflict with each other; two
//! transactions touching the same row are serialized by the version check.
//!
//! ## Identity index
//!
//! Organizations are also indexed by their assigned [`Identity`]. The index
//! is derived from the organization table and never anchored on its own.
//! [`Tx::identity_holder`] records the lookup like any other read, so two
//! transactions claiming the same identity conflict at commit.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use parking_lot::RwLock;
use serde::Serialize;

use prov_core::{BatchId, Identity, OrgId, ProductId, ShipmentId};
use prov_crypto::{AnchorError, AnchorReceipt, AnchorRequest, AnchorService};
use prov_state::{Batch, Organization, Product, Shipment, TransporterPoolEntry};

use crate::error::EngineError;

// ─── Rows ────────────────────────────────────────────────────────────

/// A stored value and the number of times it has been written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Versioned<T> {
    /// Starts at 1 on insert.
    pub version: u64,
    /// The stored value.
    pub value: T,
}

/// Key of a transporter pool entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolKey {
    /// Manufacturer owning the pool.
    pub manufacturer: OrgId,
    /// Transporter identity.
    pub transporter: Identity,
}

impl PoolKey {
    /// Build a key.
    pub fn new(manufacturer: OrgId, transporter: Identity) -> Self {
        Self {
            manufacturer,
            transporter,
        }
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.manufacturer, self.transporter)
    }
}

mod store {
    use std::collections::HashMap;

    use prov_core::{BatchId, Identity, OrgId, ProductId, ShipmentId};
    use prov_state::{Batch, Organization, Product, Shipment, TransporterPoolEntry};

    use super::{PoolKey, Versioned};

    #[derive(Default)]
    pub struct Tables {
        pub organizations: HashMap<OrgId, Versioned<Organization>>,
        pub products: HashMap<ProductId, Versioned<Product>>,
        pub batches: HashMap<BatchId, Versioned<Batch>>,
        pub shipments: HashMap<ShipmentId, Versioned<Shipment>>,
        pub pool: HashMap<PoolKey, Versioned<TransporterPoolEntry>>,
        pub identities: HashMap<Identity, OrgId>,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    pub enum RowKey {
        Organization(OrgId),
        Product(ProductId),
        Batch(BatchId),
        Shipment(ShipmentId),
        Pool(PoolKey),
        Identity(Identity),
    }

    #[derive(Debug, Clone)]
    pub enum Row {
        Organization(Organization),
        Product(Product),
        Batch(Batch),
        Shipment(Shipment),
        Pool(TransporterPoolEntry),
    }
}

use store::{Row, RowKey, Tables};

/// A type stored in one of the ledger's tables.
///
/// Implemented for the five entity types; the trait is sealed by its
/// private table accessors.
#[allow(private_interfaces)]
pub trait Record: Clone + Serialize + Sized {
    /// Primary key type.
    type Key: Clone + Eq + Hash + Ord + fmt::Display;

    /// Entity name, used as anchor data type and in errors.
    const ENTITY: &'static str;

    /// Primary key of this value.
    fn key(&self) -> Self::Key;

    /// Anchor data id for `key`: `<entity>:<key>`.
    fn data_id(key: &Self::Key) -> String {
        format!("{}:{}", Self::ENTITY, key)
    }

    #[doc(hidden)]
    fn row_key(key: &Self::Key) -> RowKey;
    #[doc(hidden)]
    fn into_row(self) -> Row;
    #[doc(hidden)]
    fn from_row(row: &Row) -> Option<&Self>;
    #[doc(hidden)]
    fn table(tables: &Tables) -> &HashMap<Self::Key, Versioned<Self>>;
    #[doc(hidden)]
    fn table_mut(tables: &mut Tables) -> &mut HashMap<Self::Key, Versioned<Self>>;
}

macro_rules! record {
    ($ty:ty, $key:ty, $entity:literal, $variant:ident, $table:ident, |$v:ident| $key_expr:expr) => {
        #[allow(private_interfaces)]
        impl Record for $ty {
            type Key = $key;
            const ENTITY: &'static str = $entity;

            fn key(&self) -> Self::Key {
                let $v = self;
                $key_expr
            }

            fn row_key(key: &Self::Key) -> RowKey {
                RowKey::$variant(key.clone())
            }

            fn into_row(self) -> Row {
                Row::$variant(self)
            }

            fn from_row(row: &Row) -> Option<&Self> {
                match row {
                    Row::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn table(tables: &Tables) -> &HashMap<Self::Key, Versioned<Self>> {
                &tables.$table
            }

            fn table_mut(tables: &mut Tables) -> &mut HashMap<Self::Key, Versioned<Self>> {
                &mut tables.$table
            }
        }
    };
}

record!(Organization, OrgId, "organization", Organization, organizations, |v| v.id.clone());
record!(Product, ProductId, "product", Product, products, |v| v.id.clone());
record!(Batch, BatchId, "batch", Batch, batches, |v| v.id.clone());
record!(Shipment, ShipmentId, "shipment", Shipment, shipments, |v| v.id.clone());
record!(TransporterPoolEntry, PoolKey, "transporter", Pool, pool, |v| PoolKey::new(
    v.manufacturer.clone(),
    v.transporter.clone()
));

impl RowKey {
    fn describe(&self) -> (&'static str, String) {
        match self {
            Self::Organization(k) => (Organization::ENTITY, k.to_string()),
            Self::Product(k) => (Product::ENTITY, k.to_string()),
            Self::Batch(k) => (Batch::ENTITY, k.to_string()),
            Self::Shipment(k) => (Shipment::ENTITY, k.to_string()),
            Self::Pool(k) => (TransporterPoolEntry::ENTITY, k.to_string()),
            Self::Identity(k) => ("identity", k.to_string()),
        }
    }
}

impl Row {
    fn anchor_request(&self, source: &OrgId) -> Result<AnchorRequest, AnchorError> {
        fn request<T: Record>(value: &T, source: &OrgId) -> Result<AnchorRequest, AnchorError> {
            AnchorRequest::new(T::ENTITY, T::data_id(&value.key()), value, source.clone())
        }
        match self {
            Self::Organization(v) => request(v, source),
            Self::Product(v) => request(v, source),
            Self::Batch(v) => request(v, source),
            Self::Shipment(v) => request(v, source),
            Self::Pool(v) => request(v, source),
        }
    }
}

impl Tables {
    fn version_of(&self, key: &RowKey) -> Option<u64> {
        match key {
            RowKey::Organization(k) => self.organizations.get(k).map(|v| v.version),
            RowKey::Product(k) => self.products.get(k).map(|v| v.version),
            RowKey::Batch(k) => self.batches.get(k).map(|v| v.version),
            RowKey::Shipment(k) => self.shipments.get(k).map(|v| v.version),
            RowKey::Pool(k) => self.pool.get(k).map(|v| v.version),
            // Index entries are written once and never change.
            RowKey::Identity(k) => self.identities.contains_key(k).then_some(1),
        }
    }

    fn apply(&mut self, row: Row, version: u64) {
        fn put<T: Record>(tables: &mut Tables, value: T, version: u64) {
            T::table_mut(tables).insert(value.key(), Versioned { version, value });
        }
        match row {
            Row::Organization(v) => {
                self.identities.insert(v.identity.clone(), v.id.clone());
                put(self, v, version)
            }
            Row::Product(v) => put(self, v, version),
            Row::Batch(v) => put(self, v, version),
            Row::Shipment(v) => put(self, v, version),
            Row::Pool(v) => put(self, v, version),
        }
    }
}

// ─── Ledger ──────────────────────────────────────────────────────────

/// The engine's entity store.
#[derive(Default)]
pub struct Ledger {
    tables: RwLock<Tables>,
}

impl Ledger {
    /// An empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a transaction.
    pub fn begin(&self) -> Tx<'_> {
        Tx {
            ledger: self,
            reads: HashMap::new(),
            writes: Vec::new(),
        }
    }

    /// Read one row outside any transaction.
    pub fn get<T: Record>(&self, key: &T::Key) -> Option<Versioned<T>> {
        T::table(&self.tables.read()).get(key).cloned()
    }

    /// Every value in a table, ordered by key.
    pub fn list<T: Record>(&self) -> Vec<T> {
        self.scan(|_: &T| true)
    }

    /// Values matching `pred`, ordered by key.
    pub fn scan<T: Record>(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        let tables = self.tables.read();
        let mut rows: Vec<&Versioned<T>> = T::table(&tables)
            .values()
            .filter(|v| pred(&v.value))
            .collect();
        rows.sort_by_key(|v| v.value.key());
        rows.into_iter().map(|v| v.value.clone()).collect()
    }

    /// Number of rows in a table.
    pub fn count<T: Record>(&self) -> usize {
        T::table(&self.tables.read()).len()
    }

    /// Drop every row.
    pub fn clear(&self) {
        *self.tables.write() = Tables::default();
    }
}

impl fmt::Debug for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = self.tables.read();
        f.debug_struct("Ledger")
            .field("organizations", &t.organizations.len())
            .field("products", &t.products.len())
            .field("batches", &t.batches.len())
            .field("shipments", &t.shipments.len())
            .field("pool", &t.pool.len())
            .field("identities", &t.identities.len())
            .finish()
    }
}

// ─── Transactions ────────────────────────────────────────────────────

/// An optimistic transaction over the ledger.
///
/// Dropping a transaction without committing discards it.
pub struct Tx<'l> {
    ledger: &'l Ledger,
    reads: HashMap<RowKey, Option<u64>>,
    writes: Vec<(RowKey, Row)>,
}

impl Tx<'_> {
    /// Read a row, recording the version seen. Staged writes are visible.
    pub fn get<T: Record>(&mut self, key: &T::Key) -> Option<T> {
        let row_key = T::row_key(key);
        if let Some((_, row)) = self.writes.iter().find(|(k, _)| k == &row_key) {
            return T::from_row(row).cloned();
        }
        let tables = self.ledger.tables.read();
        let found = T::table(&tables).get(key);
        self.reads
            .entry(row_key)
            .or_insert_with(|| found.map(|v| v.version));
        found.map(|v| v.value.clone())
    }

    /// Read a row or fail with [`EngineError::NotFound`].
    pub fn require<T: Record>(&mut self, key: &T::Key) -> Result<T, EngineError> {
        self.get(key)
            .ok_or_else(|| EngineError::not_found(T::ENTITY, key))
    }

    /// Fail with [`EngineError::DuplicateId`] if the row exists.
    pub fn ensure_absent<T: Record>(&mut self, key: &T::Key) -> Result<(), EngineError> {
        match self.get::<T>(key) {
            Some(_) => Err(EngineError::duplicate(T::ENTITY, key)),
            None => Ok(()),
        }
    }

    /// The organization holding `identity`, staged writes included.
    ///
    /// The lookup is recorded: if another transaction assigns `identity`
    /// first, this one fails its commit with [`EngineError::Conflict`].
    pub fn identity_holder(&mut self, identity: &Identity) -> Option<OrgId> {
        let staged = self.writes.iter().find_map(|(_, row)| match row {
            Row::Organization(o) if &o.identity == identity => Some(o.id.clone()),
            _ => None,
        });
        if staged.is_some() {
            return staged;
        }
        let tables = self.ledger.tables.read();
        let holder = tables.identities.get(identity).cloned();
        self.reads
            .entry(RowKey::Identity(identity.clone()))
            .or_insert_with(|| holder.as_ref().map(|_| 1));
        holder
    }

    /// Stage a write. A row never read by this transaction is expected to
    /// be absent at commit.
    pub fn put<T: Record>(&mut self, value: T) {
        let row_key = T::row_key(&value.key());
        self.reads.entry(row_key.clone()).or_insert(None);
        let row = value.into_row();
        match self.writes.iter_mut().find(|(k, _)| k == &row_key) {
            Some(slot) => slot.1 = row,
            None => self.writes.push((row_key, row)),
        }
    }

    /// Number of staged writes.
    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    /// Validate, anchor and apply. Receipts come back in write order.
    pub fn commit(
        self,
        anchors: &AnchorService,
        source: &OrgId,
    ) -> Result<Vec<AnchorReceipt>, EngineError> {
        if self.writes.is_empty() {
            return Ok(Vec::new());
        }
        let requests = self
            .writes
            .iter()
            .map(|(_, row)| row.anchor_request(source))
            .collect::<Result<Vec<_>, _>>()?;

        let mut tables = self.ledger.tables.write();
        for (key, expected) in &self.reads {
            if tables.version_of(key) != *expected {
                let (entity, id) = key.describe();
                tracing::debug!(entity, %id, "optimistic version check failed");
                return Err(EngineError::Conflict { entity, id });
            }
        }
        let receipts = anchors.anchor_all(requests)?;
        for (key, row) in self.writes {
            let version = self.reads.get(&key).copied().flatten().map_or(1, |v| v + 1);
            tables.apply(row, version);
        }
        Ok(receipts)
    }
}
