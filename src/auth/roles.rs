// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-route role policies.

use serde::{Deserialize, Serialize};

use super::identity::Identity;

/// Role names permitted on a route.
///
/// ## Semantics
///
/// - empty policy - any authenticated identity is authorized
/// - non-empty policy - the identity must hold at least one listed role
///
/// Role names are compared exactly (`"OWNER"` and `"owner"` differ), the
/// same way the user directory stores them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RolePolicy(Vec<String>);

impl RolePolicy {
    /// Policy that admits any authenticated identity.
    pub fn any_authenticated() -> Self {
        Self(Vec::new())
    }

    /// Policy admitting holders of any of `roles`, in declaration order.
    pub fn allow<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(roles.into_iter().map(Into::into).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn roles(&self) -> &[String] {
        &self.0
    }

    /// Check whether `identity` is authorized under this policy.
    pub fn permits(&self, identity: &Identity) -> bool {
        if self.0.is_empty() {
            return true;
        }
        identity
            .role_names()
            .any(|role| self.0.iter().any(|allowed| allowed == role))
    }
}

impl std::fmt::Display for RolePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            write!(f, "<any>")
        } else {
            write!(f, "{}", self.0.join("|"))
        }
    }
}
