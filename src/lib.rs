// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Edge Gateway - Authentication, Authorization and Trace Propagation
//!
//! Sits in front of the booking platform services. Every request gets an
//! X-Ray segment; protected routes require a gateway-issued bearer token
//! whose identity holds one of the route's roles.
//!
//! ## Modules
//!
//! - `api` - Local endpoints and the router (Axum)
//! - `auth` - Token codec, authentication gate, token issuance
//! - `pipeline` - Per-route stages and request orchestration
//! - `providers` - User directory and backend HTTP clients
//! - `routes` - Route table and path matching
//! - `telemetry` - X-Ray segments and trace header propagation

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod providers;
pub mod routes;
pub mod state;
pub mod telemetry;
