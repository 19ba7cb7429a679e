// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::http::StatusCode;

/// Authentication error type.
///
/// Every variant except `InternalError` is a local rejection decided
/// before or right after the identity lookup. The wire representation is
/// produced by [`crate::error::GatewayError`], never by this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No authorization header present
    MissingCredential,
    /// Authorization header is not `Bearer <token>`
    MalformedCredential,
    /// Token failed signature or structure verification
    InvalidCredential,
    /// Identity holds none of the roles the route allows
    InsufficientRole,
    /// Token could not be signed
    InternalError(String),
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingCredential => "missing_credential",
            AuthError::MalformedCredential => "malformed_credential",
            AuthError::InvalidCredential => "invalid_credential",
            AuthError::InsufficientRole => "insufficient_role",
            AuthError::InternalError(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingCredential
            | AuthError::MalformedCredential
            | AuthError::InvalidCredential
            | AuthError::InsufficientRole => StatusCode::UNAUTHORIZED,
            AuthError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingCredential => write!(f, "Token is required"),
            AuthError::MalformedCredential | AuthError::InvalidCredential => {
                write!(f, "Token not valid")
            }
            AuthError::InsufficientRole => write!(f, "Not have permission"),
            AuthError::InternalError(msg) => write!(f, "Token signing failed: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}
