//! # API Error Types
//!
//! [`AppError`] implements `axum::response::IntoResponse`.
//!
//! Engine failures keep the engine's response shape: an
//! [`Envelope`] with `ok: false` and the error kind, under an HTTP status
//! chosen from that kind. Transport-level failures (missing credentials,
//! unparseable bodies) use [`ErrorBody`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use prov_engine::{EngineError, Envelope, ErrorKind};

/// Structured JSON error body for transport-level failures.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code, e.g. `BAD_REQUEST`.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details, present only for client errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// An engine operation failed.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Request input failed validation (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Request body could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid credentials (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Internal server error (500). Logged, never returned to clients.
    #[error("internal error: {0}")]
    Internal(String),
}

/// HTTP status for an engine error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
        ErrorKind::InvalidTransition
        | ErrorKind::DuplicateId
        | ErrorKind::DuplicateRequest
        | ErrorKind::DuplicateHash
        | ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::InvalidQuantity | ErrorKind::InsufficientQuantity | ErrorKind::Validation => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ErrorKind::Recalled => StatusCode::GONE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Engine(e) => (status_for(e.kind()), e.kind().as_str()),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if let Self::Engine(err) = &self {
            if err.kind() == ErrorKind::Internal {
                tracing::error!(error = %err, "internal engine error");
            }
            return (status, Json(Envelope::<()>::error(err))).into_response();
        }

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };
        if matches!(&self, Self::Internal(_)) {
            tracing::error!(error = %self, "internal server error");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<prov_core::ValidationError> for AppError {
    fn from(err: prov_core::ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}
