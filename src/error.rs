// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Gateway failures and their wire representation.
//!
//! `GatewayError::into_response` is the only place a failure becomes an
//! HTTP response. Every response it writes carries the same envelope:
//!
//! ```json
//! {"message": "Token is required", "status": 401}
//! ```

use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::AuthError;

/// Message returned for every server-side failure. Causes stay in the logs.
pub const GENERIC_MESSAGE: &str = "Internal server error";

/// Message returned when a downstream 4xx body carries no `message`.
pub const DOWNSTREAM_FALLBACK_MESSAGE: &str = "Request failed";

/// Normalized error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorEnvelope {
    pub message: String,
    pub status: u16,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// A downstream call completed with a non-success status.
    #[error("downstream responded with {status}")]
    Downstream {
        status: StatusCode,
        message: Option<String>,
    },

    #[error("downstream transport failure: {0}")]
    Transport(String),

    #[error("no route for {method} {path}")]
    RouteNotFound { method: Method, path: String },

    #[error("invalid request body: {0}")]
    InvalidBody(String),

    /// Path with dot-segments or separators a URL parser would rewrite.
    #[error("invalid request path: {0}")]
    InvalidPath(String),

    #[error("internal gateway failure: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn error_code(&self) -> &'static str {
        match self {
            GatewayError::Auth(e) => e.error_code(),
            GatewayError::Downstream { status, .. } if status.is_client_error() => {
                "downstream_client_error"
            }
            GatewayError::Downstream { .. } => "downstream_server_error",
            GatewayError::Transport(_) => "transport_error",
            GatewayError::RouteNotFound { .. } => "route_not_found",
            GatewayError::InvalidBody(_) => "invalid_body",
            GatewayError::InvalidPath(_) => "invalid_path",
            GatewayError::Internal(_) => "internal_error",
        }
    }

    /// HTTP status the caller receives.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Auth(e) => e.status_code(),
            GatewayError::Downstream { status, .. } if status.is_client_error() => *status,
            GatewayError::Downstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Transport(_) | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            GatewayError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::InvalidBody(_) | GatewayError::InvalidPath(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Message the caller receives. Never exposes internal causes.
    pub fn client_message(&self) -> String {
        if self.status().is_server_error() {
            return GENERIC_MESSAGE.to_string();
        }
        match self {
            GatewayError::Auth(e) => e.to_string(),
            GatewayError::Downstream { message, .. } => message
                .clone()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DOWNSTREAM_FALLBACK_MESSAGE.to_string()),
            GatewayError::RouteNotFound { .. } => "Route not found".to_string(),
            GatewayError::InvalidBody(_) => "Invalid request body".to_string(),
            GatewayError::InvalidPath(_) => "Invalid request path".to_string(),
            GatewayError::Transport(_) | GatewayError::Internal(_) => GENERIC_MESSAGE.to_string(),
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            message: self.client_message(),
            status: self.status().as_u16(),
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        GatewayError::Transport(e.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(self.envelope())).into_response()
    }
}
