//! # Authentication Middleware
//!
//! Bearer tokens carry the caller's role and organization:
//!
//! ```text
//! Bearer {role}:{org_id}:{secret}
//! ```
//!
//! The role is one of `manufacturer`, `distributor`, `transporter`,
//! `retailer` or `regulator`. An optional `X-User-Id` header names the
//! individual user. The middleware only establishes who is calling; the
//! engine decides what they may do.
//!
//! When no secret is configured the secret segment is not checked
//! (development mode). Requests without a token are still let through so
//! read-only queries work, but every mutating route requires a [`Caller`].

use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::{header, HeaderName, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use subtle::ConstantTimeEq;

use prov_core::{Actor, OrgId, Role, UserId};

use crate::error::{AppError, ErrorBody, ErrorDetail};

/// Header naming the individual user behind a request.
pub const USER_ID_HEADER: HeaderName = HeaderName::from_static("x-user-id");

// ── Caller ──────────────────────────────────────────────────────────────────

/// The authenticated caller, available to handlers as an extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub Actor);

impl Caller {
    /// The engine actor.
    pub fn actor(&self) -> &Actor {
        &self.0
    }

    /// The caller's organization.
    pub fn org_id(&self) -> &OrgId {
        &self.0.org_id
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Caller>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("a bearer token is required".into()))
    }
}

// ── Auth Configuration ──────────────────────────────────────────────────────

/// Auth configuration injected into request extensions.
///
/// `Debug` redacts the secret.
#[derive(Clone, Default)]
pub struct AuthConfig {
    pub token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

// ── Token Validation ────────────────────────────────────────────────────────

fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Parse `{role}:{org_id}:{secret}`.
///
/// Organization identifiers may themselves contain `:`, so the role is
/// taken up to the first separator and the secret after the last one.
pub fn parse_bearer_token(provided: &str, expected_secret: Option<&str>) -> Result<Actor, String> {
    let (role, rest) = provided
        .split_once(':')
        .ok_or("invalid token format, expected {role}:{org_id}:{secret}")?;
    let (org, secret) = rest
        .rsplit_once(':')
        .ok_or("invalid token format, expected {role}:{org_id}:{secret}")?;

    if let Some(expected) = expected_secret {
        if !constant_time_token_eq(secret, expected) {
            return Err("invalid bearer token".into());
        }
    }
    let role: Role = role.parse().map_err(|e| format!("{e}"))?;
    let org_id = OrgId::new(org).map_err(|e| format!("{e}"))?;
    Ok(Actor::new(org_id, role))
}

// ── Middleware ──────────────────────────────────────────────────────────────

/// Resolve the caller from the `Authorization` header and insert a
/// [`Caller`] into the request extensions.
///
/// With a configured secret a valid token is mandatory.
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let expected = request
        .extensions()
        .get::<AuthConfig>()
        .and_then(|c| c.token.clone());
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let provided = match auth_header {
        Some(value) => match value.strip_prefix("Bearer ") {
            Some(token) => token.to_owned(),
            None => {
                tracing::warn!("authentication failed: non-Bearer authorization scheme");
                return unauthorized_response("authorization header must use Bearer scheme");
            }
        },
        None if expected.is_some() => {
            tracing::warn!("authentication failed: missing authorization header");
            return unauthorized_response("missing authorization header");
        }
        None => return next.run(request).await,
    };

    let mut actor = match parse_bearer_token(&provided, expected.as_deref()) {
        Ok(actor) => actor,
        Err(msg) => {
            tracing::warn!(reason = %msg, "authentication failed: invalid bearer token");
            return unauthorized_response(&msg);
        }
    };

    if let Some(user) = request
        .headers()
        .get(&USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        match UserId::new(user) {
            Ok(user) => actor = actor.with_user(user),
            Err(e) => return unauthorized_response(&e.to_string()),
        }
    }

    request.extensions_mut().insert(Caller(actor));
    next.run(request).await
}

fn unauthorized_response(message: &str) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
            details: None,
        },
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}
