//! # Domain Identifier Newtypes
//!
//! Business identifiers are supplied by callers (a manufacturer names its
//! own batches), so they are validated strings rather than generated UUIDs.
//! Each namespace is a distinct type.
//!
//! Accepted form: 1 to 128 characters from `[A-Za-z0-9._:-]`, surrounding
//! whitespace trimmed. Deserialization runs the same validation.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Maximum identifier length in characters.
pub const MAX_ID_LEN: usize = 128;

fn validate(kind: &'static str, raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyIdentifier { kind });
    }
    if trimmed.chars().count() > MAX_ID_LEN {
        return Err(ValidationError::IdentifierTooLong {
            kind,
            max: MAX_ID_LEN,
        });
    }
    if let Some(ch) = trimmed
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ':' | '-')))
    {
        return Err(ValidationError::InvalidCharacter { kind, ch });
    }
    Ok(trimmed.to_string())
}

/// Trim a free-text field (a name, a reason) and reject it when empty.
pub fn require_text(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField { field });
    }
    Ok(trimmed.to_string())
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validate and wrap an identifier.
            pub fn new(raw: impl AsRef<str>) -> Result<Self, ValidationError> {
                validate($kind, raw.as_ref()).map(Self)
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of a participating organization.
    OrgId,
    "org_id"
);

string_id!(
    /// Identifier of a user inside an organization.
    UserId,
    "user_id"
);

string_id!(
    /// Identifier of a registered product.
    ProductId,
    "product_id"
);

string_id!(
    /// Identifier of a batch (including batches produced by a split).
    BatchId,
    "batch_id"
);

string_id!(
    /// Identifier of a shipment.
    ShipmentId,
    "shipment_id"
);

string_id!(
    /// Address-like identity assigned to an organization at onboarding.
    ///
    /// Produced by an identity resolver: `0x`-prefixed pool addresses or
    /// `ed25519:`-prefixed public keys. Callers must not assume it is
    /// verifiable key material unless the resolver issues real keys.
    Identity,
    "identity"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_typical_identifiers() {
        assert_eq!(BatchId::new("B1-SUB1").unwrap().as_str(), "B1-SUB1");
        assert_eq!(OrgId::new("  mfr.acme  ").unwrap().as_str(), "mfr.acme");
        assert!(Identity::new("0x8ba1f109551bd432803012645ac136ddd64dba72").is_ok());
        assert!(Identity::new("ed25519:abcdef").is_ok());
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(
            ShipmentId::new("   ").unwrap_err(),
            ValidationError::EmptyIdentifier { kind: "shipment_id" }
        );
    }

    #[test]
    fn rejects_too_long() {
        let long = "x".repeat(MAX_ID_LEN + 1);
        assert!(matches!(
            ProductId::new(long).unwrap_err(),
            ValidationError::IdentifierTooLong { .. }
        ));
    }

    #[test]
    fn rejects_invalid_characters() {
        assert_eq!(
            OrgId::new("acme/ltd").unwrap_err(),
            ValidationError::InvalidCharacter { kind: "org_id", ch: '/' }
        );
        assert!(BatchId::new("B 1").is_err());
    }

    #[test]
    fn deserialization_validates() {
        let ok: BatchId = serde_json::from_str("\"B1\"").unwrap();
        assert_eq!(ok.to_string(), "B1");
        assert!(serde_json::from_str::<BatchId>("\"\"").is_err());
        assert!(serde_json::from_str::<BatchId>("\"a b\"").is_err());
    }

    #[test]
    fn require_text_trims_and_rejects_blank() {
        assert_eq!(require_text("name", "  Vaccine X ").unwrap(), "Vaccine X");
        assert_eq!(
            require_text("reason", " \t").unwrap_err(),
            ValidationError::EmptyField { field: "reason" }
        );
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = ShipmentId::new("S1").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"S1\"");
    }
}
