// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Outbound HTTP clients: the user directory and route backends.

pub mod backend;
pub mod users;

pub use backend::BackendClient;
pub use users::UserDirectoryClient;
