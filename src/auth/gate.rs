// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication gate.
//!
//! Runs before a request is forwarded on routes that require it:
//!
//! 1. Read `Authorization` (absent -> 401 "Token is required")
//! 2. Split `Bearer <token>` (malformed -> 401 "Token not valid")
//! 3. Verify the token (invalid -> 401 "Token not valid")
//! 4. Resolve the identity by email via the user directory
//! 5. Check the route's role policy (no match -> 401 "Not have permission")
//! 6. Attach `X-UserId` to the outgoing request
//!
//! Steps 1-3 never make a downstream call.

use std::sync::Arc;

use axum::http::{header::AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use tracing::debug;

use super::identity::IdentityResolver;
use super::roles::RolePolicy;
use super::token::{TokenCodec, TokenStatus};
use super::AuthError;
use crate::error::GatewayError;
use crate::pipeline::GatewayRequest;
use crate::telemetry::TraceHeader;

/// Identity header read by backends.
pub const USER_ID_HEADER: HeaderName = HeaderName::from_static("x-userid");

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingCredential)?
        .to_str()
        .map_err(|_| AuthError::MalformedCredential)?;

    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or(AuthError::MalformedCredential)?;

    if !scheme.eq_ignore_ascii_case("Bearer") {
        return Err(AuthError::MalformedCredential);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MalformedCredential);
    }
    Ok(token)
}

/// Authenticates requests and applies role policies.
#[derive(Clone)]
pub struct AuthenticationGate {
    codec: Arc<TokenCodec>,
    resolver: Arc<dyn IdentityResolver>,
}

impl AuthenticationGate {
    pub fn new(codec: Arc<TokenCodec>, resolver: Arc<dyn IdentityResolver>) -> Self {
        Self { codec, resolver }
    }

    /// Authorize `request` under `policy`.
    ///
    /// Returns the request to forward, carrying `X-UserId`.
    pub async fn authorize(
        &self,
        request: GatewayRequest,
        policy: &RolePolicy,
        trace: &TraceHeader,
    ) -> Result<GatewayRequest, GatewayError> {
        let token = bearer_token(request.headers()).inspect_err(|e| {
            debug!(reason = e.error_code(), "Rejected credential");
        })?;

        let claims = match self.codec.inspect(token) {
            TokenStatus::Valid(claims) => claims,
            status => {
                debug!(?status, "Rejected token");
                return Err(AuthError::InvalidCredential.into());
            }
        };

        let identity = self.resolver.find_by_email(&claims.email, trace).await?;

        if !policy.permits(&identity) {
            debug!(
                user_id = %identity.id,
                policy = %policy,
                "Identity lacks a permitted role"
            );
            return Err(AuthError::InsufficientRole.into());
        }

        let user_id = HeaderValue::from_str(&identity.id.to_string())
            .map_err(|e| GatewayError::Internal(e.to_string()))?;

        debug!(user_id = %identity.id, "Request authorized");
        Ok(request.with_header(USER_ID_HEADER, user_id))
    }
}
