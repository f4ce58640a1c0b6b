// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authentication middleware and request identity extractors.
//!
//! Two bearer tokens guard the API: the operator token for consoles and
//! channel webhooks, and the scheduler token for sweep triggers. With no
//! token configured every request is rejected (fail-closed).
//!
//! Tenant and operator identity travel in `X-Tenant-Id` and `X-Operator-Id`.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, StatusCode, request::Parts},
    middleware::Next,
    response::Response,
};
use tether_core::model::Actor;

use crate::error::ApiError;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const OPERATOR_HEADER: &str = "x-operator-id";

#[derive(Clone)]
pub struct AuthConfig {
    pub bearer_token: Option<String>,
    /// Token for sweep triggers.
    pub scheduler_token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "[redacted]"),
            )
            .field(
                "scheduler_token",
                &self.scheduler_token.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

fn bearer_matches(headers: &HeaderMap, expected: Option<&str>) -> bool {
    let Some(expected) = expected else {
        tracing::error!("gateway has no token configured -- rejecting request");
        return false;
    };
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token == expected)
}

pub async fn operator_auth(
    State(auth): State<AuthConfig>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if bearer_matches(request.headers(), auth.bearer_token.as_deref()) {
        return Ok(next.run(request).await);
    }
    Err(StatusCode::UNAUTHORIZED)
}

pub async fn scheduler_auth(
    State(auth): State<AuthConfig>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if bearer_matches(request.headers(), auth.scheduler_token.as_deref()) {
        return Ok(next.run(request).await);
    }
    Err(StatusCode::UNAUTHORIZED)
}

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// The tenant a request acts on. Required on every tenant-scoped route.
#[derive(Debug, Clone)]
pub struct Tenant(pub String);

impl<S: Send + Sync> FromRequestParts<S> for Tenant {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        header_value(parts, TENANT_HEADER)
            .map(Tenant)
            .ok_or_else(|| ApiError::bad_request("missing X-Tenant-Id header"))
    }
}

/// The operator behind the request, when the console sent one.
#[derive(Debug, Clone)]
pub struct Operator(pub Option<String>);

impl Operator {
    /// Operator actions fall back to `system` without a header.
    pub fn actor(&self) -> Actor {
        self.0
            .clone()
            .map_or(Actor::System, Actor::Operator)
    }

    pub fn require(&self) -> Result<&str, ApiError> {
        self.0
            .as_deref()
            .ok_or_else(|| ApiError::bad_request("missing X-Operator-Id header"))
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Operator {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Operator(header_value(parts, OPERATOR_HEADER)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn auth_config_debug_redacts_tokens() {
        let config = AuthConfig {
            bearer_token: Some("secret-token".to_string()),
            scheduler_token: Some("cron-token".to_string()),
        };
        let debug_output = format!("{config:?}");
        assert!(!debug_output.contains("secret-token"));
        assert!(!debug_output.contains("cron-token"));
        assert!(debug_output.contains("[redacted]"));
    }

    #[test]
    fn bearer_requires_exact_token() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc"));
        assert!(bearer_matches(&headers, Some("abc")));
        assert!(!bearer_matches(&headers, Some("abcd")));
        assert!(!bearer_matches(&headers, None));
        assert!(!bearer_matches(&HeaderMap::new(), Some("abc")));
    }

    #[test]
    fn operator_without_header_acts_as_system() {
        assert_eq!(Operator(None).actor(), Actor::System);
        assert_eq!(
            Operator(Some("op-1".into())).actor(),
            Actor::Operator("op-1".into())
        );
        assert!(Operator(None).require().is_err());
    }
}
