//! # Capability Check
//!
//! Who may perform which operation, as a pure function of the actor's
//! roles and organization and the relevant fields of the target entity.
//! Nothing here reads the ledger; the caller extracts the owner, sender,
//! transporter or receiver from the snapshot and passes it in.
//!
//! | Operation | Allowed |
//! |---|---|
//! | onboard / suspend / reinstate organization, recall | Regulator |
//! | register product, create batch | Manufacturer of the product |
//! | split batch | current owner |
//! | sell to consumer | Retailer that owns the batch |
//! | expire batch | current owner or Regulator |
//! | create shipment | sender, holding a shipping role |
//! | pickup / transit log / delivery | assigned Transporter |
//! | accept / reject delivery | receiver |
//! | request transporter | Transporter, for its own identity |
//! | approve / reject / add transporter | Manufacturer owning the pool |

use prov_core::{Actor, Identity, OrgId, Role};

use crate::error::EngineError;

/// An operation together with the target fields that decide access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation<'a> {
    /// Onboard a new organization.
    OnboardOrganization,
    /// Suspend or reinstate an organization.
    SetOrganizationStatus,
    /// Register a product for `manufacturer`.
    RegisterProduct {
        /// The product's manufacturer.
        manufacturer: &'a OrgId,
    },
    /// Create a batch of a product.
    CreateBatch {
        /// The product's manufacturer.
        manufacturer: &'a OrgId,
    },
    /// Split a batch.
    SplitBatch {
        /// Current owner of the batch.
        owner: &'a OrgId,
    },
    /// Sell units to consumers.
    SellToConsumer {
        /// Current owner of the batch.
        owner: &'a OrgId,
    },
    /// Recall a batch.
    RecallBatch,
    /// Mark a batch expired.
    ExpireBatch {
        /// Current owner of the batch.
        owner: &'a OrgId,
    },
    /// Create a shipment.
    CreateShipment {
        /// The named sender.
        sender: &'a OrgId,
    },
    /// Confirm pickup.
    ConfirmPickup {
        /// The assigned transporter.
        transporter: Option<&'a OrgId>,
    },
    /// Append a transit reading.
    LogTransit {
        /// The assigned transporter.
        transporter: Option<&'a OrgId>,
    },
    /// Complete delivery.
    CompleteDelivery {
        /// The assigned transporter.
        transporter: Option<&'a OrgId>,
    },
    /// Accept a delivered shipment.
    AcceptDelivery {
        /// The shipment's receiver.
        receiver: &'a OrgId,
    },
    /// Reject a delivered shipment.
    RejectDelivery {
        /// The shipment's receiver.
        receiver: &'a OrgId,
    },
    /// Ask to join a manufacturer's pool.
    RequestTransporter {
        /// Identity of the acting organization.
        own_identity: &'a Identity,
        /// Identity named in the request.
        requested: &'a Identity,
    },
    /// Approve a pool request.
    ApproveTransporter {
        /// Manufacturer owning the pool.
        manufacturer: &'a OrgId,
    },
    /// Reject or revoke a pool entry.
    RejectTransporter {
        /// Manufacturer owning the pool.
        manufacturer: &'a OrgId,
    },
    /// Add a transporter directly.
    AddTransporterToPool {
        /// Manufacturer owning the pool.
        manufacturer: &'a OrgId,
    },
}

impl Operation<'_> {
    /// Operation name used in logs, metrics and audit events.
    pub fn name(&self) -> &'static str {
        match self {
            Self::OnboardOrganization => "onboard_organization",
            Self::SetOrganizationStatus => "set_organization_status",
            Self::RegisterProduct { .. } => "register_product",
            Self::CreateBatch { .. } => "create_batch",
            Self::SplitBatch { .. } => "split_batch",
            Self::SellToConsumer { .. } => "sell_to_consumer",
            Self::RecallBatch => "recall_batch",
            Self::ExpireBatch { .. } => "expire_batch",
            Self::CreateShipment { .. } => "create_shipment",
            Self::ConfirmPickup { .. } => "confirm_pickup",
            Self::LogTransit { .. } => "log_transit",
            Self::CompleteDelivery { .. } => "complete_delivery",
            Self::AcceptDelivery { .. } => "accept_delivery",
            Self::RejectDelivery { .. } => "reject_delivery",
            Self::RequestTransporter { .. } => "request_transporter",
            Self::ApproveTransporter { .. } => "approve_transporter",
            Self::RejectTransporter { .. } => "reject_transporter",
            Self::AddTransporterToPool { .. } => "add_transporter_to_pool",
        }
    }
}

/// A refused capability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    /// Operation that was refused.
    pub operation: &'static str,
    /// Actor that was refused.
    pub actor: OrgId,
    /// Why.
    pub reason: &'static str,
}

impl std::fmt::Display for Denial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} may not {}: {}", self.actor, self.operation, self.reason)
    }
}

impl From<Denial> for EngineError {
    fn from(denial: Denial) -> Self {
        EngineError::Unauthorized(denial.to_string())
    }
}

/// Allow or deny `op` for `actor`.
pub fn authorize(actor: &Actor, op: &Operation<'_>) -> Result<(), Denial> {
    let deny = |reason: &'static str| {
        Err(Denial {
            operation: op.name(),
            actor: actor.org_id.clone(),
            reason,
        })
    };
    let is_manufacturer_of = |org: &OrgId| actor.has_role(Role::Manufacturer) && actor.is_org(org);

    match *op {
        Operation::OnboardOrganization
        | Operation::SetOrganizationStatus
        | Operation::RecallBatch => {
            if actor.has_role(Role::Regulator) {
                Ok(())
            } else {
                deny("requires the regulator role")
            }
        }
        Operation::RegisterProduct { manufacturer }
        | Operation::CreateBatch { manufacturer } => {
            if is_manufacturer_of(manufacturer) {
                Ok(())
            } else {
                deny("only the product's manufacturer")
            }
        }
        Operation::SplitBatch { owner } => {
            if actor.is_org(owner) {
                Ok(())
            } else {
                deny("only the current owner")
            }
        }
        Operation::SellToConsumer { owner } => {
            if !actor.has_role(Role::Retailer) {
                deny("requires the retailer role")
            } else if !actor.is_org(owner) {
                deny("only the current owner")
            } else {
                Ok(())
            }
        }
        Operation::ExpireBatch { owner } => {
            if actor.is_org(owner) || actor.has_role(Role::Regulator) {
                Ok(())
            } else {
                deny("only the current owner or a regulator")
            }
        }
        Operation::CreateShipment { sender } => {
            let ships = [Role::Manufacturer, Role::Distributor, Role::Retailer]
                .into_iter()
                .any(|r| actor.has_role(r));
            if !actor.is_org(sender) {
                deny("the actor must be the sender")
            } else if !ships {
                deny("requires a manufacturer, distributor or retailer role")
            } else {
                Ok(())
            }
        }
        Operation::ConfirmPickup { transporter }
        | Operation::LogTransit { transporter }
        | Operation::CompleteDelivery { transporter } => {
            match transporter {
                Some(t) if actor.is_org(t) && actor.has_role(Role::Transporter) => Ok(()),
                _ => deny("only the assigned transporter"),
            }
        }
        Operation::AcceptDelivery { receiver } | Operation::RejectDelivery { receiver } => {
            if actor.is_org(receiver) {
                Ok(())
            } else {
                deny("only the receiver")
            }
        }
        Operation::RequestTransporter {
            own_identity,
            requested,
        } => {
            if !actor.has_role(Role::Transporter) {
                deny("requires the transporter role")
            } else if own_identity != requested {
                deny("a transporter may only request for its own identity")
            } else {
                Ok(())
            }
        }
        Operation::ApproveTransporter { manufacturer }
        | Operation::RejectTransporter { manufacturer }
        | Operation::AddTransporterToPool { manufacturer } => {
            if is_manufacturer_of(manufacturer) {
                Ok(())
            } else {
                deny("only the manufacturer owning the pool")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn org(s: &str) -> OrgId {
        OrgId::new(s).unwrap()
    }

    fn actor(o: &str, role: Role) -> Actor {
        Actor::new(org(o), role)
    }

    #[test]
    fn regulator_only_operations() {
        for op in [
            Operation::OnboardOrganization,
            Operation::SetOrganizationStatus,
            Operation::RecallBatch,
        ] {
            assert!(authorize(&actor("reg", Role::Regulator), &op).is_ok());
            assert!(authorize(&actor("mfr-1", Role::Manufacturer), &op).is_err());
        }
    }

    #[test]
    fn batch_creation_requires_product_manufacturer() {
        let m = org("mfr-1");
        let op = Operation::CreateBatch { manufacturer: &m };
        assert!(authorize(&actor("mfr-1", Role::Manufacturer), &op).is_ok());
        assert!(authorize(&actor("mfr-2", Role::Manufacturer), &op).is_err());
        assert!(authorize(&actor("mfr-1", Role::Distributor), &op).is_err());
    }

    #[test]
    fn sale_requires_retailer_owner() {
        let owner = org("shop");
        let op = Operation::SellToConsumer { owner: &owner };
        assert!(authorize(&actor("shop", Role::Retailer), &op).is_ok());
        let denial = authorize(&actor("shop", Role::Distributor), &op).unwrap_err();
        assert_eq!(denial.operation, "sell_to_consumer");
        assert!(authorize(&actor("other", Role::Retailer), &op).is_err());
    }

    #[test]
    fn expiry_by_owner_or_regulator() {
        let owner = org("dist");
        let op = Operation::ExpireBatch { owner: &owner };
        assert!(authorize(&actor("dist", Role::Distributor), &op).is_ok());
        assert!(authorize(&actor("reg", Role::Regulator), &op).is_ok());
        assert!(authorize(&actor("shop", Role::Retailer), &op).is_err());
    }

    #[test]
    fn carrier_steps_require_assigned_transporter() {
        let t = org("trans-1");
        let op = Operation::ConfirmPickup {
            transporter: Some(&t),
        };
        assert!(authorize(&actor("trans-1", Role::Transporter), &op).is_ok());
        assert!(authorize(&actor("trans-2", Role::Transporter), &op).is_err());
        assert!(authorize(&actor("trans-1", Role::Distributor), &op).is_err());
        assert!(authorize(
            &actor("trans-1", Role::Transporter),
            &Operation::LogTransit { transporter: None }
        )
        .is_err());
    }

    #[test]
    fn receiver_decides_delivery() {
        let r = org("dist");
        assert!(authorize(
            &actor("dist", Role::Distributor),
            &Operation::RejectDelivery { receiver: &r }
        )
        .is_ok());
        assert!(authorize(
            &actor("mfr-1", Role::Manufacturer),
            &Operation::AcceptDelivery { receiver: &r }
        )
        .is_err());
    }

    #[test]
    fn shipment_sender_must_be_actor() {
        let s = org("mfr-1");
        let op = Operation::CreateShipment { sender: &s };
        assert!(authorize(&actor("mfr-1", Role::Manufacturer), &op).is_ok());
        assert!(authorize(&actor("dist", Role::Distributor), &op).is_err());
        assert!(authorize(&actor("mfr-1", Role::Transporter), &op).is_err());
    }

    #[test]
    fn transporter_requests_only_for_itself() {
        let own = Identity::new("0xaaaa").unwrap();
        let other = Identity::new("0xbbbb").unwrap();
        let t = actor("trans-1", Role::Transporter);
        assert!(authorize(
            &t,
            &Operation::RequestTransporter {
                own_identity: &own,
                requested: &own
            }
        )
        .is_ok());
        assert!(authorize(
            &t,
            &Operation::RequestTransporter {
                own_identity: &own,
                requested: &other
            }
        )
        .is_err());
    }

    #[test]
    fn pool_management_by_owning_manufacturer() {
        let m = org("mfr-1");
        let op = Operation::ApproveTransporter { manufacturer: &m };
        assert!(authorize(&actor("mfr-1", Role::Manufacturer), &op).is_ok());
        assert!(authorize(&actor("mfr-2", Role::Manufacturer), &op).is_err());
    }

    #[test]
    fn denial_converts_to_unauthorized() {
        let err: EngineError = authorize(
            &actor("mfr-1", Role::Manufacturer),
            &Operation::RecallBatch,
        )
        .unwrap_err()
        .into();
        assert_eq!(err.kind(), crate::ErrorKind::Unauthorized);
        assert!(err.to_string().contains("recall_batch"));
    }
}
