//! # Roles, Organization Types and Actors
//!
//! Roles are a closed enum. Capability decisions are made by matching on
//! roles in `prov-engine::capability`, never by dispatching on an actor
//! subtype.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::identity::{OrgId, UserId};

/// The kind of organization participating in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrgType {
    /// Produces goods; owns products and transporter pools.
    Manufacturer,
    /// Receives goods from manufacturers and ships onward.
    Distributor,
    /// Carries shipments between parties.
    Transporter,
    /// Sells goods to consumers.
    Retailer,
}

impl OrgType {
    /// Return the string representation of this organization type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manufacturer => "manufacturer",
            Self::Distributor => "distributor",
            Self::Transporter => "transporter",
            Self::Retailer => "retailer",
        }
    }

    /// The role a member of this organization acts with by default.
    pub fn default_role(&self) -> Role {
        match self {
            Self::Manufacturer => Role::Manufacturer,
            Self::Distributor => Role::Distributor,
            Self::Transporter => Role::Transporter,
            Self::Retailer => Role::Retailer,
        }
    }
}

impl std::fmt::Display for OrgType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrgType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manufacturer" => Ok(Self::Manufacturer),
            "distributor" => Ok(Self::Distributor),
            "transporter" => Ok(Self::Transporter),
            "retailer" => Ok(Self::Retailer),
            other => Err(ValidationError::UnknownOrgType(other.to_string())),
        }
    }
}

/// A role an actor may hold.
///
/// `Regulator` is a capability held by users of oversight bodies; it is not
/// an organization type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Manufacturer,
    Distributor,
    Transporter,
    Retailer,
    Regulator,
}

impl Role {
    /// Return the string representation of this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manufacturer => "manufacturer",
            Self::Distributor => "distributor",
            Self::Transporter => "transporter",
            Self::Retailer => "retailer",
            Self::Regulator => "regulator",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manufacturer" => Ok(Self::Manufacturer),
            "distributor" => Ok(Self::Distributor),
            "transporter" => Ok(Self::Transporter),
            "retailer" => Ok(Self::Retailer),
            "regulator" => Ok(Self::Regulator),
            other => Err(ValidationError::UnknownRole(other.to_string())),
        }
    }
}

/// The authenticated caller of an engine operation.
///
/// Supplied by the identity/directory collaborator. The engine trusts the
/// roles but still checks that `org_id` is an onboarded organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// The organization the caller acts for.
    pub org_id: OrgId,
    /// The individual user, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    /// Roles held by the caller.
    pub roles: Vec<Role>,
}

impl Actor {
    /// An actor with a single role and no user binding.
    pub fn new(org_id: OrgId, role: Role) -> Self {
        Self {
            org_id,
            user_id: None,
            roles: vec![role],
        }
    }

    /// Attach a user identifier.
    pub fn with_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Whether the actor holds `role`.
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Whether the actor acts for `org`.
    pub fn is_org(&self, org: &OrgId) -> bool {
        &self.org_id == org
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.user_id {
            Some(user) => write!(f, "{}@{}", user, self.org_id),
            None => write!(f, "{}", self.org_id),
        }
    }
}
