// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Gateway-issued HS256 tokens and the per-route authorization that
//! consumes them.
//!
//! ## Auth Flow
//!
//! 1. `POST /api/auth/login` is forwarded to the user service
//! 2. On `200` the user service names the account in an `email` header;
//!    [`TokenIssuer`] replaces it with `Authorization: Bearer <token>`
//! 3. Later requests present that token; [`AuthenticationGate`]:
//!    - Verifies the signature with the shared secret
//!    - Resolves the identity by email through the user directory
//!    - Checks the route's [`RolePolicy`]
//!    - Forwards the user id as `X-UserId`
//!
//! ## Security
//!
//! - Tokens carry `email` and `iat` only and never expire
//! - The signing secret is held in a `SecretString`
//! - A client-supplied `X-UserId` is never forwarded

pub mod error;
pub mod gate;
pub mod identity;
pub mod issuance;
pub mod roles;
pub mod token;

pub use error::AuthError;
pub use gate::{AuthenticationGate, USER_ID_HEADER};
pub use identity::{Identity, IdentityResolver, UserRole};
pub use issuance::{TokenIssuer, EMAIL_HINT_HEADER};
pub use roles::RolePolicy;
pub use token::{TokenClaims, TokenCodec, TokenStatus};
