// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read from the environment once at startup into an
//! immutable [`GatewayConfig`]. Nothing reads the environment afterwards.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `JWT_SECRET` | HMAC secret for gateway tokens (>= 32 bytes) | Required |
//! | `USERS_SERVICE_URI` | User directory and auth backend | `http://localhost:8081` |
//! | `BOOKINGS_SERVICE_URI` | Bookings backend | `http://localhost:8082` |
//! | `ROOMS_SERVICE_URI` | Rooms backend | `http://localhost:8083` |
//! | `ASKS_SERVICE_URI` | Asks backend | `http://localhost:8084` |
//! | `ROUTES_FILE` | JSON route table replacing the built-in routes | Optional |
//! | `IDENTITY_TIMEOUT_SECS` | Identity lookup timeout | `10` |
//! | `BACKEND_TIMEOUT_SECS` | Backend forwarding timeout | `30` |
//! | `MAX_BODY_BYTES` | Largest buffered request body | `10485760` |
//! | `AWS_XRAY_DAEMON_ADDRESS` | X-Ray daemon `host:port` (UDP) | Optional, segments are logged |
//! | `AWS_XRAY_TRACING_NAME` | Segment name | `Gateway` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM certificate chain and key | Optional, plain HTTP |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::{
    net::{IpAddr, SocketAddr, ToSocketAddrs},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::routes::RouteTable;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Environment variable name for the token signing secret.
///
/// HS256 keys shorter than 256 bits are rejected at startup.
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";

pub const USERS_SERVICE_URI_ENV: &str = "USERS_SERVICE_URI";
pub const BOOKINGS_SERVICE_URI_ENV: &str = "BOOKINGS_SERVICE_URI";
pub const ROOMS_SERVICE_URI_ENV: &str = "ROOMS_SERVICE_URI";
pub const ASKS_SERVICE_URI_ENV: &str = "ASKS_SERVICE_URI";
pub const ROUTES_FILE_ENV: &str = "ROUTES_FILE";
pub const IDENTITY_TIMEOUT_ENV: &str = "IDENTITY_TIMEOUT_SECS";
pub const BACKEND_TIMEOUT_ENV: &str = "BACKEND_TIMEOUT_SECS";
pub const MAX_BODY_BYTES_ENV: &str = "MAX_BODY_BYTES";

/// Environment variable name for the X-Ray daemon address.
///
/// Uses the name the AWS SDKs read, so the daemon sidecar configuration
/// carries over unchanged.
pub const XRAY_DAEMON_ENV: &str = "AWS_XRAY_DAEMON_ADDRESS";
pub const XRAY_TRACING_NAME_ENV: &str = "AWS_XRAY_TRACING_NAME";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_IDENTITY_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_TRACING_NAME: &str = "Gateway";

/// Minimum signing secret length in bytes.
pub const MIN_SECRET_BYTES: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    MissingVar(&'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("JWT_SECRET must be at least 32 bytes, got {len}")]
    WeakSecret { len: usize },

    #[error("route table: {0}")]
    RoutesFile(String),

    #[error("failed to initialize {component}: {reason}")]
    Startup {
        component: &'static str,
        reason: String,
    },
}

/// Base URIs of the services behind the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceUris {
    pub users: Url,
    pub bookings: Url,
    pub rooms: Url,
    pub asks: Url,
}

/// PEM files for HTTPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFiles {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: SecretString,
    pub services: ServiceUris,
    pub routes_file: Option<PathBuf>,
    pub identity_timeout: Duration,
    pub backend_timeout: Duration,
    pub max_body_bytes: usize,
    pub xray_daemon: Option<SocketAddr>,
    pub tracing_name: String,
    pub tls: Option<TlsFiles>,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let host: IpAddr = parse_or(&get, HOST_ENV, DEFAULT_HOST.parse().ok())?;
        let port: u16 = parse_or(&get, PORT_ENV, Some(DEFAULT_PORT))?;

        let jwt_secret = get(JWT_SECRET_ENV).ok_or(ConfigError::MissingVar(JWT_SECRET_ENV))?;
        let jwt_secret = SecretString::from(jwt_secret);
        let len = jwt_secret.expose_secret().len();
        if len < MIN_SECRET_BYTES {
            return Err(ConfigError::WeakSecret { len });
        }

        let services = ServiceUris {
            users: service_uri(&get, USERS_SERVICE_URI_ENV, "http://localhost:8081")?,
            bookings: service_uri(&get, BOOKINGS_SERVICE_URI_ENV, "http://localhost:8082")?,
            rooms: service_uri(&get, ROOMS_SERVICE_URI_ENV, "http://localhost:8083")?,
            asks: service_uri(&get, ASKS_SERVICE_URI_ENV, "http://localhost:8084")?,
        };

        let identity_timeout: u64 =
            parse_or(&get, IDENTITY_TIMEOUT_ENV, Some(DEFAULT_IDENTITY_TIMEOUT_SECS))?;
        let backend_timeout: u64 =
            parse_or(&get, BACKEND_TIMEOUT_ENV, Some(DEFAULT_BACKEND_TIMEOUT_SECS))?;
        for (var, secs) in [
            (IDENTITY_TIMEOUT_ENV, identity_timeout),
            (BACKEND_TIMEOUT_ENV, backend_timeout),
        ] {
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    var,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }

        let xray_daemon = match get(XRAY_DAEMON_ENV) {
            Some(addr) => Some(resolve_daemon(&addr)?),
            None => None,
        };

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsFiles {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::MissingVar(TLS_KEY_PATH_ENV)),
            (None, Some(_)) => return Err(ConfigError::MissingVar(TLS_CERT_PATH_ENV)),
        };

        Ok(Self {
            bind_addr: SocketAddr::new(host, port),
            jwt_secret,
            services,
            routes_file: get(ROUTES_FILE_ENV).map(PathBuf::from),
            identity_timeout: Duration::from_secs(identity_timeout),
            backend_timeout: Duration::from_secs(backend_timeout),
            max_body_bytes: parse_or(&get, MAX_BODY_BYTES_ENV, Some(DEFAULT_MAX_BODY_BYTES))?,
            xray_daemon,
            tracing_name: get(XRAY_TRACING_NAME_ENV)
                .unwrap_or_else(|| DEFAULT_TRACING_NAME.to_string()),
            tls,
        })
    }

    /// Route table from `ROUTES_FILE`, or the built-in routes.
    pub fn route_table(&self) -> Result<RouteTable, ConfigError> {
        match &self.routes_file {
            Some(path) => RouteTable::from_json_file(path),
            None => RouteTable::defaults(&self.services),
        }
    }
}

fn parse_or<T, G>(get: &G, var: &'static str, default: Option<T>) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
        None => default.ok_or(ConfigError::MissingVar(var)),
    }
}

fn service_uri<G>(get: &G, var: &'static str, default: &str) -> Result<Url, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let raw = get(var).unwrap_or_else(|| default.to_string());
    let url = Url::parse(raw.trim()).map_err(|e| ConfigError::Invalid {
        var,
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(ConfigError::Invalid {
            var,
            reason: format!("{url} is not an http(s) base URI"),
        });
    }
    Ok(url)
}

fn resolve_daemon(raw: &str) -> Result<SocketAddr, ConfigError> {
    raw.trim()
        .to_socket_addrs()
        .map_err(|e| ConfigError::Invalid {
            var: XRAY_DAEMON_ENV,
            reason: e.to_string(),
        })?
        .next()
        .ok_or_else(|| ConfigError::Invalid {
            var: XRAY_DAEMON_ENV,
            reason: format!("{raw} did not resolve"),
        })
}
