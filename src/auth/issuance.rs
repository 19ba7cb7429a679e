// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token issuance on login responses.
//!
//! The user service answers a successful login with `200` and an `email`
//! response header naming the authenticated account. The gateway turns
//! that hint into `Authorization: Bearer <token>` and removes the hint
//! before the response leaves.

use std::sync::Arc;

use axum::http::{header::AUTHORIZATION, HeaderName, HeaderValue, StatusCode};
use tracing::{debug, warn};

use super::token::TokenCodec;
use super::AuthError;
use crate::error::GatewayError;
use crate::pipeline::GatewayResponse;

/// Response header the user service sets on a successful login.
pub const EMAIL_HINT_HEADER: HeaderName = HeaderName::from_static("email");

/// Mints tokens for login responses.
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    codec: Arc<TokenCodec>,
}

impl TokenIssuer {
    pub fn new(codec: Arc<TokenCodec>) -> Self {
        Self { codec }
    }

    /// Rewrite a backend response.
    ///
    /// - `200` with an `email` hint: `Authorization` is set to a fresh token
    /// - anything else: the response passes through without `Authorization`
    ///
    /// The hint header is removed in every case.
    pub fn apply(&self, response: GatewayResponse) -> Result<GatewayResponse, GatewayError> {
        let hint = response
            .headers()
            .get(&EMAIL_HINT_HEADER)
            .map(|v| v.to_str().map(str::trim).map(str::to_string));
        let response = response.without_header(&EMAIL_HINT_HEADER);

        if response.status() != StatusCode::OK {
            return Ok(response.without_header(&AUTHORIZATION));
        }

        let email = match hint {
            Some(Ok(email)) if !email.is_empty() => email,
            Some(_) => {
                warn!("Login response carried an unreadable email hint");
                return Ok(response.without_header(&AUTHORIZATION));
            }
            None => {
                debug!("Login response without email hint, no token issued");
                return Ok(response.without_header(&AUTHORIZATION));
            }
        };

        let token = self.codec.issue(&email)?;
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| AuthError::InternalError(e.to_string()))?;

        debug!("Issued token for login response");
        Ok(response.with_header(AUTHORIZATION, value))
    }
}
