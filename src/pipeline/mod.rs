// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Filter Pipeline
//!
//! Each route owns an ordered list of stages, built once at startup.
//!
//! | Stage | Phase | Effect |
//! |-------|-------|--------|
//! | `Authenticate(policy)` | request | verify token, resolve identity, set `X-UserId` |
//! | `IssueToken` | response | mint a token for a successful login |
//!
//! Request-phase stages run in order before the backend call; response
//! phase stages run in order after it. A failing stage ends the exchange.

pub mod exchange;
pub mod gateway;

pub use exchange::{GatewayRequest, GatewayResponse};
pub use gateway::Gateway;

use crate::auth::RolePolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Authenticate(RolePolicy),
    IssueToken,
}

impl Stage {
    pub fn is_request_phase(&self) -> bool {
        matches!(self, Stage::Authenticate(_))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn request_stages(&self) -> impl Iterator<Item = &Stage> {
        self.stages.iter().filter(|s| s.is_request_phase())
    }

    pub fn response_stages(&self) -> impl Iterator<Item = &Stage> {
        self.stages.iter().filter(|s| !s.is_request_phase())
    }
}
