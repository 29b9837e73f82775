//! Uniform response shape for engine results.

use serde::{Deserialize, Serialize};

use prov_core::ContentDigest;

use crate::engine::Outcome;
use crate::error::{EngineError, ErrorKind};

/// `{ok, data | error_kind, anchor_ref}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Whether the operation succeeded.
    pub ok: bool,
    /// The result on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// The error kind on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Human-readable error message on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Digest anchored by the operation, if any.
    #[serde(default)]
    pub anchor_ref: Option<ContentDigest>,
}

impl<T> Envelope<T> {
    /// A successful result.
    pub fn ok(data: T, anchor_ref: Option<ContentDigest>) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error_kind: None,
            message: None,
            anchor_ref,
        }
    }

    /// A failed result. Internal failures carry no message.
    pub fn error(err: &EngineError) -> Self {
        let kind = err.kind();
        let message = match kind {
            ErrorKind::Internal => None,
            _ => Some(err.to_string()),
        };
        Self {
            ok: false,
            data: None,
            error_kind: Some(kind),
            message,
            anchor_ref: None,
        }
    }

    /// Wrap a query result, which never anchors.
    pub fn query(result: Result<T, EngineError>) -> Self {
        match result {
            Ok(data) => Self::ok(data, None),
            Err(e) => Self::error(&e),
        }
    }
}

impl<T> From<Result<Outcome<T>, EngineError>> for Envelope<T> {
    fn from(result: Result<Outcome<T>, EngineError>) -> Self {
        match result {
            Ok(out) => Self::ok(out.data, out.anchor_ref),
            Err(e) => Self::error(&e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn failure_serializes_kind_without_data() {
        let env: Envelope<u32> = Err(EngineError::Recalled {
            batch_id: prov_core::BatchId::new("B1").unwrap(),
        })
        .into();
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value["ok"], json!(false));
        assert_eq!(value["error_kind"], json!("Recalled"));
        assert!(value.get("data").is_none());
        assert_eq!(value["anchor_ref"], json!(null));
    }

    #[test]
    fn internal_message_is_withheld() {
        let env: Envelope<u32> = Envelope::error(&EngineError::Internal("lock poisoned".into()));
        assert_eq!(env.error_kind, Some(ErrorKind::Internal));
        assert!(env.message.is_none());
    }

    #[test]
    fn success_carries_anchor() {
        let digest = ContentDigest::parse(&format!("sha256:{}", "ab".repeat(32))).unwrap();
        let env: Envelope<&str> = Ok(Outcome {
            data: "x",
            anchor_ref: Some(digest),
        })
        .into();
        assert!(env.ok);
        assert_eq!(env.data, Some("x"));
        assert_eq!(env.anchor_ref, Some(digest));
    }
}
