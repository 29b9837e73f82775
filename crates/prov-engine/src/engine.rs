//! # Engine
//!
//! [`Engine`] owns the ledger, the anchor log, the identity resolver and
//! the audit sinks. It is cheap to clone; clones share state.
//!
//! The operations are grouped into component views borrowed from the
//! engine: [`Registry`], [`CustodyEngine`], [`TransporterAuthority`] and
//! [`Directory`]. Every mutating operation runs through
//! [`Engine::execute`], which:
//!
//! 1. opens a ledger transaction and checks the actor (onboarded, active,
//!    roles consistent with the organization type; regulators exempt);
//! 2. runs the operation body against the transaction;
//! 3. commits, anchoring every written record;
//! 4. emits one audit event, a metrics sample and a tracing event.
//!
//! Any failure leaves no write and no anchor behind.

use std::sync::Arc;

use serde::Serialize;

use prov_core::{Actor, ContentDigest, Role};
use prov_crypto::{AnchorService, Ed25519Issuer, IdentityResolver, WalletAssigner};
use prov_state::{Organization, TransitionEvidence};

use crate::audit::{AuditEvent, AuditLog, AuditSink, TracingAuditSink};
use crate::authority::TransporterAuthority;
use crate::config::{ConfigError, EngineConfig, IdentityBackend};
use crate::custody::CustodyEngine;
use crate::directory::Directory;
use crate::error::EngineError;
use crate::ledger::{Ledger, Tx};
use crate::metrics;
use crate::registry::Registry;

/// The result of a successful operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome<T> {
    /// The operation's result, usually the primary record after the change.
    pub data: T,
    /// Digest anchored for the primary record; `None` when nothing changed.
    pub anchor_ref: Option<ContentDigest>,
}

/// What an operation body hands back to [`Engine::execute`].
pub(crate) struct Applied<T> {
    pub data: T,
    pub entity_type: &'static str,
    pub entity_id: String,
    pub result: String,
}

impl<T> Applied<T> {
    pub(crate) fn new(
        data: T,
        entity_type: &'static str,
        entity_id: impl ToString,
        result: impl ToString,
    ) -> Self {
        Self {
            data,
            entity_type,
            entity_id: entity_id.to_string(),
            result: result.to_string(),
        }
    }
}

struct Inner {
    config: EngineConfig,
    ledger: Ledger,
    anchors: AnchorService,
    resolver: Box<dyn IdentityResolver>,
    wallet: WalletAssigner,
    audit: Arc<AuditLog>,
    sinks: Vec<Arc<dyn AuditSink>>,
}

/// The custody and provenance engine.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

/// Builder for [`Engine`] with a custom resolver or extra audit sinks.
pub struct EngineBuilder {
    config: EngineConfig,
    resolver: Option<Box<dyn IdentityResolver>>,
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl EngineBuilder {
    /// Use `resolver` instead of the configured backend.
    pub fn resolver(mut self, resolver: impl IdentityResolver + 'static) -> Self {
        self.resolver = Some(Box::new(resolver));
        self
    }

    /// Register an additional audit sink.
    pub fn audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Validate the configuration and build the engine.
    pub fn build(self) -> Result<Engine, ConfigError> {
        self.config.validate()?;
        let wallet = WalletAssigner::new(&self.config.wallet)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let resolver: Box<dyn IdentityResolver> = match self.resolver {
            Some(r) => r,
            None => match self.config.identity {
                IdentityBackend::WalletPool => Box::new(wallet.clone()),
                IdentityBackend::Ed25519 => Box::new(Ed25519Issuer::new()),
            },
        };
        let audit = Arc::new(AuditLog::new(self.config.audit.capacity));
        let mut sinks: Vec<Arc<dyn AuditSink>> = vec![audit.clone()];
        if self.config.audit.tracing {
            sinks.push(Arc::new(TracingAuditSink));
        }
        sinks.extend(self.sinks);

        tracing::info!(
            resolver = resolver.kind(),
            pool_size = wallet.pool_size(),
            audit_capacity = audit.capacity(),
            "engine initialised"
        );
        Ok(Engine {
            inner: Arc::new(Inner {
                config: self.config,
                ledger: Ledger::new(),
                anchors: AnchorService::new(),
                resolver,
                wallet,
                audit,
                sinks,
            }),
        })
    }
}

impl Engine {
    /// An engine for `config` with the configured identity backend.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        Self::builder(config).build()
    }

    /// Start building an engine.
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder {
            config,
            resolver: None,
            sinks: Vec::new(),
        }
    }

    /// Products and batches.
    pub fn registry(&self) -> Registry<'_> {
        Registry::new(self)
    }

    /// Shipments.
    pub fn custody(&self) -> CustodyEngine<'_> {
        CustodyEngine::new(self)
    }

    /// Transporter pools.
    pub fn authority(&self) -> TransporterAuthority<'_> {
        TransporterAuthority::new(self)
    }

    /// Organizations and identities.
    pub fn directory(&self) -> Directory<'_> {
        Directory::new(self)
    }

    /// The anchor log.
    pub fn anchors(&self) -> &AnchorService {
        &self.inner.anchors
    }

    /// The in-memory audit log.
    pub fn audit_log(&self) -> &AuditLog {
        &self.inner.audit
    }

    /// The entity store.
    pub fn ledger(&self) -> &Ledger {
        &self.inner.ledger
    }

    /// Active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub(crate) fn resolver(&self) -> &dyn IdentityResolver {
        self.inner.resolver.as_ref()
    }

    pub(crate) fn wallet(&self) -> &WalletAssigner {
        &self.inner.wallet
    }

    /// Drop every entity, anchor and audit event.
    pub fn reset(&self) {
        self.inner.ledger.clear();
        self.inner.anchors.clear();
        self.inner.audit.clear();
        tracing::info!("engine reset");
    }

    /// Run `op`, retrying up to `retries` more times while it fails with
    /// [`EngineError::Conflict`]. Any other error is returned at once.
    pub fn retry_on_conflict<T>(
        &self,
        retries: usize,
        mut op: impl FnMut(&Engine) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let mut attempt = 0;
        loop {
            match op(self) {
                Err(e) if e.kind().is_retryable() && attempt < retries => {
                    attempt += 1;
                    tracing::debug!(attempt, error = %e, "retrying after conflict");
                }
                other => return other,
            }
        }
    }

    /// Run one mutating operation. See the module docs for the steps.
    pub(crate) fn execute<T>(
        &self,
        operation: &'static str,
        actor: &Actor,
        body: impl FnOnce(&mut Tx<'_>, &TransitionEvidence) -> Result<Applied<T>, EngineError>,
    ) -> Result<Outcome<T>, EngineError> {
        let span = tracing::info_span!("operation", operation, actor = %actor);
        let _entered = span.enter();

        let result = (|| {
            let mut tx = self.inner.ledger.begin();
            self.check_actor(&mut tx, actor)?;
            let evidence = TransitionEvidence::new(actor.org_id.clone(), operation);
            let applied = body(&mut tx, &evidence)?;
            let receipts = tx.commit(&self.inner.anchors, &actor.org_id)?;
            let fresh = receipts.iter().filter(|r| r.newly_anchored).count() as u64;
            metrics::anchors(fresh);
            let anchor_ref = receipts.first().map(|r| r.record.data_hash);
            Ok::<_, EngineError>((applied, anchor_ref, evidence))
        })();

        match result {
            Ok((applied, anchor_ref, evidence)) => {
                metrics::operation(operation, "ok");
                let event = AuditEvent::new(
                    actor,
                    operation,
                    applied.entity_type,
                    &applied.entity_id,
                    &applied.result,
                    anchor_ref,
                    evidence.at,
                );
                for sink in &self.inner.sinks {
                    sink.record(&event);
                }
                tracing::info!(
                    entity_type = applied.entity_type,
                    entity_id = %applied.entity_id,
                    result = %applied.result,
                    anchor_ref = ?anchor_ref.map(|d| d.to_string()),
                    "operation committed"
                );
                Ok(Outcome {
                    data: applied.data,
                    anchor_ref,
                })
            }
            Err(err) => {
                let kind = err.kind();
                metrics::operation(operation, kind.as_str());
                match kind {
                    crate::ErrorKind::Unauthorized => {
                        tracing::warn!(error = %err, "operation refused")
                    }
                    crate::ErrorKind::Internal => tracing::error!(error = %err, "operation failed"),
                    _ => tracing::debug!(error = %err, kind = %kind, "operation rejected"),
                }
                Err(err)
            }
        }
    }

    fn check_actor(&self, tx: &mut Tx<'_>, actor: &Actor) -> Result<(), EngineError> {
        if actor.has_role(Role::Regulator) {
            return Ok(());
        }
        if actor.roles.is_empty() {
            return Err(EngineError::Unauthorized(format!(
                "{} holds no roles",
                actor.org_id
            )));
        }
        let org: Organization = tx.get(&actor.org_id).ok_or_else(|| {
            EngineError::Unauthorized(format!("organization {} is not onboarded", actor.org_id))
        })?;
        if !org.is_active() {
            return Err(EngineError::Unauthorized(format!(
                "organization {} is {}",
                org.id, org.status
            )));
        }
        let expected = org.org_type.default_role();
        if let Some(role) = actor.roles.iter().find(|r| **r != expected) {
            return Err(EngineError::Unauthorized(format!(
                "role {} does not match {} organization {}",
                role, org.org_type, org.id
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("ledger", &self.inner.ledger)
            .field("anchors", &self.inner.anchors.len())
            .field("resolver", &self.inner.resolver.kind())
            .field("audit", &self.inner.audit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;
    use crate::testing::{bid, Fixture};
    use crate::ErrorKind;

    #[derive(Default)]
    struct Collect(Mutex<Vec<String>>);

    impl AuditSink for Collect {
        fn record(&self, event: &AuditEvent) {
            self.0.lock().push(event.action.clone());
        }
    }

    #[test]
    fn clones_share_state() {
        let f = Fixture::new();
        f.product("P1");
        let other = f.engine.clone();
        other
            .registry()
            .create_batch(&f.mfr, crate::testing::batch_spec("B1", "P1", 10))
            .unwrap();
        assert_eq!(f.engine.registry().batch(&bid("B1")).unwrap().quantity, 10);
    }

    #[test]
    fn retry_stops_on_success_or_non_conflict() {
        let f = Fixture::new();
        let calls = AtomicUsize::new(0);
        let out = f.engine.retry_on_conflict(5, |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(EngineError::Conflict {
                    entity: "batch",
                    id: "B1".into(),
                })
            } else {
                Ok(n)
            }
        });
        assert_eq!(out.unwrap(), 2);

        calls.store(0, Ordering::SeqCst);
        let err = f
            .engine
            .retry_on_conflict(5, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(EngineError::Unauthorized("no".into()))
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn retry_gives_up_after_budget() {
        let f = Fixture::new();
        let calls = AtomicUsize::new(0);
        let err = f
            .engine
            .retry_on_conflict(3, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(EngineError::Conflict {
                    entity: "shipment",
                    id: "S1".into(),
                })
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn reset_drops_everything() {
        let f = Fixture::new();
        f.product("P1");
        f.batch("B1", "P1", 10);
        assert!(!f.engine.anchors().is_empty());
        f.engine.reset();
        assert!(f.engine.anchors().is_empty());
        assert!(f.engine.audit_log().is_empty());
        assert!(f.engine.registry().batch(&bid("B1")).is_err());
        assert!(f.engine.directory().organizations().is_empty());
    }

    #[test]
    fn extra_sinks_see_committed_operations_only() {
        let sink = Arc::new(Collect::default());
        let engine = Engine::builder(EngineConfig {
            identity: IdentityBackend::Ed25519,
            ..Default::default()
        })
        .audit_sink(sink.clone())
        .build()
        .unwrap();
        let fda = Actor::new(crate::testing::org("fda"), Role::Regulator);
        let spec = crate::directory::OrganizationSpec {
            org_id: crate::testing::org("mfr-1"),
            org_type: prov_core::OrgType::Manufacturer,
            name: "Maker".into(),
        };
        engine.directory().onboard_organization(&fda, spec.clone()).unwrap();
        assert!(engine.directory().onboard_organization(&fda, spec).is_err());
        assert_eq!(*sink.0.lock(), ["onboard_organization"]);
    }

    #[test]
    fn unknown_actor_is_refused_before_anything_else() {
        let f = Fixture::new();
        let stranger = Actor::new(crate::testing::org("nobody"), Role::Manufacturer);
        let err = f
            .engine
            .registry()
            .split_batch(&stranger, &bid("missing"), &bid("child"), 1)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }
}
