// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Backend forwarding.
//!
//! The inbound path and query are appended to the route's base URI.
//! Responses of every status are returned as they are; only transport
//! failures become errors.

use std::time::Duration;

use axum::http::{header, HeaderMap, HeaderName};
use reqwest::{redirect, Client};
use tracing::{debug, warn};
use url::Url;

use crate::error::GatewayError;
use crate::pipeline::{GatewayRequest, GatewayResponse};

/// Connection-scoped headers that must not cross the gateway.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in &HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Target URL for `request` on the backend at `base`.
///
/// Fails when the URL parser would rewrite the path, so the backend always
/// sees the path the route was matched against.
pub fn target_url(base: &Url, request: &GatewayRequest) -> Result<Url, GatewayError> {
    let mut url = base.clone();
    let path = format!("{}{}", base.path().trim_end_matches('/'), request.uri().path());
    url.set_path(&path);
    if url.path() != path {
        return Err(GatewayError::InvalidPath(request.uri().path().to_string()));
    }
    url.set_query(request.uri().query());
    Ok(url)
}

#[derive(Debug, Clone)]
pub struct BackendClient {
    http: Client,
}

impl BackendClient {
    pub fn new(timeout: Duration) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| GatewayError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }

    /// Forward `request` to the backend at `base`.
    pub async fn forward(
        &self,
        base: &Url,
        request: GatewayRequest,
    ) -> Result<GatewayResponse, GatewayError> {
        let url = target_url(base, &request)?;
        let (method, _, mut headers, body) = request.into_parts();
        strip_hop_by_hop(&mut headers);
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);

        debug!(%method, %url, "Forwarding to backend");

        let response = self
            .http
            .request(method, url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Backend request failed");
                GatewayError::Transport(format!("backend request failed: {e}"))
            })?;

        let status = response.status();
        let mut headers = response.headers().clone();
        strip_hop_by_hop(&mut headers);
        headers.remove(header::CONTENT_LENGTH);

        let body = response.bytes().await.map_err(|e| {
            warn!(error = %e, "Backend response body failed");
            GatewayError::Transport(format!("backend response body failed: {e}"))
        })?;

        Ok(GatewayResponse::new(status, headers, body))
    }
}
