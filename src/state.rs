// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tracing::info;

use crate::auth::{AuthenticationGate, TokenCodec, TokenIssuer};
use crate::config::{ConfigError, GatewayConfig};
use crate::pipeline::Gateway;
use crate::providers::{BackendClient, UserDirectoryClient};
use crate::telemetry::{DaemonSink, LogSink, SegmentSink};

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub directory: Arc<UserDirectoryClient>,
}

impl AppState {
    pub fn new(gateway: Gateway, directory: Arc<UserDirectoryClient>) -> Self {
        Self {
            gateway: Arc::new(gateway),
            directory,
        }
    }

    /// Wire every component from the loaded configuration.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, ConfigError> {
        let routes = config.route_table()?;
        let codec = Arc::new(TokenCodec::new(&config.jwt_secret));

        let directory = Arc::new(
            UserDirectoryClient::new(config.services.users.clone(), config.identity_timeout)
                .map_err(|e| ConfigError::Startup {
                    component: "user directory client",
                    reason: e.to_string(),
                })?,
        );
        let backend = BackendClient::new(config.backend_timeout).map_err(|e| ConfigError::Startup {
            component: "backend client",
            reason: e.to_string(),
        })?;

        let sink: Arc<dyn SegmentSink> = match config.xray_daemon {
            Some(daemon) => {
                let sink = DaemonSink::new(daemon).map_err(|e| ConfigError::Startup {
                    component: "X-Ray daemon sink",
                    reason: e.to_string(),
                })?;
                info!(%daemon, "Sending trace segments to X-Ray daemon");
                Arc::new(sink)
            }
            None => {
                info!("No X-Ray daemon configured, trace segments go to the log");
                Arc::new(LogSink)
            }
        };

        info!(routes = routes.len(), "Route table loaded");

        let gateway = Gateway::new(
            routes,
            AuthenticationGate::new(codec.clone(), directory.clone()),
            TokenIssuer::new(codec),
            backend,
            sink,
        )
        .with_segment_name(config.tracing_name.clone())
        .with_max_body_bytes(config.max_body_bytes)
        .with_scheme(if config.tls.is_some() { "https" } else { "http" });

        Ok(Self::new(gateway, directory))
    }
}
