// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Route Table
//!
//! Maps an inbound method and path to a backend and a filter pipeline.
//! Routes are checked in declaration order; the first match wins.
//!
//! ## Path Patterns
//!
//! | Segment | Matches |
//! |---------|---------|
//! | `rooms` | exactly `rooms` |
//! | `*` | any single segment |
//! | `**` (last only) | zero or more remaining segments |
//!
//! ## Route File
//!
//! `ROUTES_FILE` replaces the built-in table with a JSON array:
//!
//! ```json
//! [
//!   {
//!     "id": "rooms-create",
//!     "uri": "http://rooms:8083",
//!     "path": "/api/rooms",
//!     "methods": ["POST"],
//!     "filters": [{ "name": "authenticate", "allowed_roles": ["OWNER"] }]
//!   }
//! ]
//! ```

use std::{collections::HashSet, fs, path::Path};

use axum::http::Method;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::auth::RolePolicy;
use crate::config::{ConfigError, ServiceUris};
use crate::pipeline::{Pipeline, Stage};

#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternSegment {
    Literal(String),
    One,
    Rest,
}

/// Whether a URL parser would rewrite `path` before it reaches a backend.
///
/// True for `.` and `..` segments (also percent-encoded, any case) and for
/// backslashes, which special schemes treat as separators.
pub fn is_ambiguous_path(path: &str) -> bool {
    if path.contains('\\') {
        return true;
    }
    path.split('/').any(|segment| {
        let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
        decoded == "." || decoded == ".."
    })
}

/// Compiled path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<PatternSegment>,
}

fn path_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

impl PathPattern {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        if !raw.starts_with('/') {
            return Err(ConfigError::RoutesFile(format!(
                "path pattern {raw:?} must start with '/'"
            )));
        }

        let parts: Vec<&str> = path_segments(raw).collect();
        let mut segments = Vec::with_capacity(parts.len());
        for (i, part) in parts.iter().enumerate() {
            let segment = match *part {
                "**" if i + 1 == parts.len() => PatternSegment::Rest,
                "**" => {
                    return Err(ConfigError::RoutesFile(format!(
                        "path pattern {raw:?}: '**' is only allowed as the last segment"
                    )))
                }
                "*" => PatternSegment::One,
                literal => PatternSegment::Literal(literal.to_string()),
            };
            segments.push(segment);
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, path: &str) -> bool {
        let mut parts = path_segments(path);
        for segment in &self.segments {
            match segment {
                PatternSegment::Rest => return true,
                PatternSegment::One => {
                    if parts.next().is_none() {
                        return false;
                    }
                }
                PatternSegment::Literal(literal) => {
                    if parts.next() != Some(literal.as_str()) {
                        return false;
                    }
                }
            }
        }
        parts.next().is_none()
    }
}

/// Filter declaration as written in a route file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum FilterDefinition {
    Authenticate {
        #[serde(default)]
        allowed_roles: RolePolicy,
    },
    IssueToken,
}

impl From<FilterDefinition> for Stage {
    fn from(filter: FilterDefinition) -> Self {
        match filter {
            FilterDefinition::Authenticate { allowed_roles } => Stage::Authenticate(allowed_roles),
            FilterDefinition::IssueToken => Stage::IssueToken,
        }
    }
}

/// Route declaration as written in a route file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDefinition {
    pub id: String,
    pub uri: String,
    pub path: String,
    /// Empty means any method.
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default)]
    pub filters: Vec<FilterDefinition>,
}

impl RouteDefinition {
    fn new(id: &str, uri: &Url, path: &str, methods: &[&str], filters: Vec<FilterDefinition>) -> Self {
        Self {
            id: id.to_string(),
            uri: uri.to_string(),
            path: path.to_string(),
            methods: methods.iter().map(|m| m.to_string()).collect(),
            filters,
        }
    }
}

/// A compiled route.
#[derive(Debug, Clone)]
pub struct Route {
    pub id: String,
    pub uri: Url,
    pub pattern: PathPattern,
    pub methods: Vec<Method>,
    pub pipeline: Pipeline,
}

impl Route {
    fn compile(definition: RouteDefinition) -> Result<Self, ConfigError> {
        let id = definition.id;
        let invalid = |reason: String| ConfigError::RoutesFile(format!("route {id:?}: {reason}"));

        let uri = Url::parse(&definition.uri).map_err(|e| invalid(format!("uri: {e}")))?;
        if !matches!(uri.scheme(), "http" | "https") {
            return Err(invalid(format!("uri {uri} is not http(s)")));
        }

        let pattern = PathPattern::parse(&definition.path).map_err(|e| invalid(e.to_string()))?;

        let methods = definition
            .methods
            .iter()
            .map(|m| {
                Method::from_bytes(m.trim().to_ascii_uppercase().as_bytes())
                    .map_err(|_| invalid(format!("method {m:?}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let pipeline = Pipeline::new(definition.filters.into_iter().map(Stage::from).collect());

        Ok(Self {
            id,
            uri,
            pattern,
            methods,
            pipeline,
        })
    }

    pub fn matches(&self, method: &Method, path: &str) -> bool {
        (self.methods.is_empty() || self.methods.contains(method)) && self.pattern.matches(path)
    }
}

/// Ordered route list.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn from_definitions(definitions: Vec<RouteDefinition>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        let mut routes = Vec::with_capacity(definitions.len());
        for definition in definitions {
            if !seen.insert(definition.id.clone()) {
                return Err(ConfigError::RoutesFile(format!(
                    "duplicate route id {:?}",
                    definition.id
                )));
            }
            routes.push(Route::compile(definition)?);
        }
        Ok(Self { routes })
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| ConfigError::RoutesFile(format!("{}: {e}", path.display())))?;
        let definitions: Vec<RouteDefinition> = serde_json::from_str(&raw)
            .map_err(|e| ConfigError::RoutesFile(format!("{}: {e}", path.display())))?;
        if definitions.is_empty() {
            return Err(ConfigError::RoutesFile(format!(
                "{} declares no routes",
                path.display()
            )));
        }
        Self::from_definitions(definitions)
    }

    /// Built-in routes for the users, bookings, rooms and asks services.
    pub fn defaults(services: &ServiceUris) -> Result<Self, ConfigError> {
        use FilterDefinition::{Authenticate, IssueToken};

        let any = || Authenticate {
            allowed_roles: RolePolicy::any_authenticated(),
        };
        let only = |role: &str| Authenticate {
            allowed_roles: RolePolicy::allow([role]),
        };
        let (users, bookings, rooms, asks) = (
            &services.users,
            &services.bookings,
            &services.rooms,
            &services.asks,
        );

        Self::from_definitions(vec![
            RouteDefinition::new("auth", users, "/api/auth/**", &[], vec![IssueToken]),
            RouteDefinition::new("users-create", users, "/api/users", &["POST"], vec![]),
            RouteDefinition::new("users", users, "/api/users/**", &[], vec![any()]),
            RouteDefinition::new("bookings-create", bookings, "/api/bookings", &["POST"], vec![only("CUSTOMER")]),
            RouteDefinition::new("bookings-update", bookings, "/api/bookings/*", &["PATCH"], vec![only("OWNER")]),
            RouteDefinition::new("bookings", bookings, "/api/bookings/**", &[], vec![any()]),
            RouteDefinition::new("rooms-create", rooms, "/api/rooms", &["POST"], vec![only("OWNER")]),
            RouteDefinition::new("rooms-modify", rooms, "/api/rooms/*", &["PATCH", "DELETE"], vec![only("OWNER")]),
            RouteDefinition::new("rooms", rooms, "/api/rooms/**", &[], vec![any()]),
            RouteDefinition::new("asks-create", asks, "/api/asks", &["POST"], vec![only("CUSTOMER")]),
            RouteDefinition::new("asks-answer", asks, "/api/asks/*/answer", &["POST", "DELETE"], vec![only("OWNER")]),
            RouteDefinition::new("asks-delete", asks, "/api/asks/*", &["DELETE"], vec![only("OWNER")]),
            RouteDefinition::new("asks", asks, "/api/asks/**", &[], vec![any()]),
        ])
    }

    /// First route matching `method` and `path`.
    pub fn find(&self, method: &Method, path: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.matches(method, path))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }
}
