// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Resolved user identities and the resolver seam.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GatewayError;
use crate::telemetry::TraceHeader;

/// Role assignment as returned by the user directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRole {
    /// Role name (e.g. `CUSTOMER`, `OWNER`)
    pub role: String,
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
}

/// User identity resolved for a single request.
///
/// The directory also returns a password hash; it is never deserialized
/// into this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque user identifier, forwarded to backends as `X-UserId`
    pub id: Uuid,
    pub email: String,
    #[serde(default)]
    pub roles: Option<Vec<UserRole>>,
}

impl Identity {
    /// Names of every role the identity holds.
    pub fn role_names(&self) -> impl Iterator<Item = &str> {
        self.roles.iter().flatten().map(|r| r.role.as_str())
    }
}

/// Looks up identities by email.
///
/// This is the only suspension point inside the authentication gate. The
/// trace header must be attached to whatever outbound call the
/// implementation makes.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn find_by_email(
        &self,
        email: &str,
        trace: &TraceHeader,
    ) -> Result<Identity, GatewayError>;
}
