//! # Products
//!
//! A product is registered once by its manufacturer and never changes.

use serde::{Deserialize, Serialize};

use prov_core::{require_text, OrgId, ProductId, Timestamp, ValidationError};

/// A registered product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Unique product identifier.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Product category (vaccine, insulin, ...).
    pub category: String,
    /// The manufacturer that registered it.
    pub manufacturer: OrgId,
    /// Optional long description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// When it was registered.
    pub created_at: Timestamp,
}

impl Product {
    /// Validate and build a product record.
    pub fn new(
        id: ProductId,
        name: &str,
        category: &str,
        manufacturer: OrgId,
        description: Option<String>,
        at: Timestamp,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            id,
            name: require_text("name", name)?,
            category: require_text("category", category)?,
            manufacturer,
            description: description.filter(|d| !d.trim().is_empty()),
            created_at: at,
        })
    }
}
