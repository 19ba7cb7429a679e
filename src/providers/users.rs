// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User directory client.
//!
//! Resolves identities with `GET {base}/api/users/email/{email}`. The
//! current trace header is sent with every lookup.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::auth::{Identity, IdentityResolver};
use crate::error::GatewayError;
use crate::telemetry::{TraceHeader, TRACE_HEADER};

#[derive(Debug, Clone)]
pub struct UserDirectoryClient {
    base_url: Url,
    http: Client,
}

impl UserDirectoryClient {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Lookup URL for `email`, with the email encoded as one path segment.
    pub fn lookup_url(&self, email: &str) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                GatewayError::Internal(format!("user directory URI {} cannot be a base", self.base_url))
            })?
            .pop_if_empty()
            .extend(["api", "users", "email", email]);
        Ok(url)
    }

    /// Check that the directory answers HTTP at all.
    ///
    /// Any response counts as reachable; only transport failures do not.
    pub async fn probe(&self) -> Result<(), GatewayError> {
        self.http.get(self.base_url.clone()).send().await?;
        Ok(())
    }
}

/// Pull `message` out of a JSON error body.
fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body)
        .ok()?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

#[async_trait]
impl IdentityResolver for UserDirectoryClient {
    async fn find_by_email(
        &self,
        email: &str,
        trace: &TraceHeader,
    ) -> Result<Identity, GatewayError> {
        let url = self.lookup_url(email)?;

        let mut request = self.http.get(url);
        if let Some(value) = trace.header_value() {
            request = request.header(TRACE_HEADER, value);
        }

        let response = request.send().await.map_err(|e| {
            warn!(error = %e, "Identity lookup failed");
            GatewayError::Transport(format!("identity lookup failed: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|e| {
                debug!(%status, error = %e, "Identity lookup error body unreadable");
                String::new()
            });
            debug!(%status, "Identity lookup rejected");
            return Err(GatewayError::Downstream {
                status,
                message: error_message(&body),
            });
        }

        response.json::<Identity>().await.map_err(|e| {
            warn!(error = %e, "Identity lookup returned an invalid body");
            GatewayError::Transport(format!("invalid identity response: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use std::net::TcpListener;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn can_bind_localhost() -> bool {
        TcpListener::bind("127.0.0.1:0").is_ok()
    }

    fn trace() -> TraceHeader {
        TraceHeader::downstream("1-5759e988-bd862e3fe1be46a994272793", "53995c3f42cd8ad8")
    }

    fn client(uri: &str) -> UserDirectoryClient {
        UserDirectoryClient::new(Url::parse(uri).unwrap(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn lookup_url_encodes_email_segment() {
        let client = client("http://users:8081/");
        let url = client.lookup_url("a/b?c@d.com").unwrap();
        assert_eq!(url.as_str(), "http://users:8081/api/users/email/a%2Fb%3Fc@d.com");
    }

    #[test]
    fn lookup_url_keeps_base_path() {
        let client = client("http://users:8081/directory");
        let url = client.lookup_url("a@b.com").unwrap();
        assert_eq!(url.path(), "/directory/api/users/email/a@b.com");
    }

    #[test]
    fn error_message_reads_json_bodies_only() {
        assert_eq!(
            error_message(r#"{"message":"not found","status":404}"#).as_deref(),
            Some("not found")
        );
        assert_eq!(error_message("plain text"), None);
        assert_eq!(error_message(r#"{"status":404}"#), None);
    }

    #[tokio::test]
    async fn resolves_identity_with_trace_header() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/users/email/a@b.com"))
            .and(header(
                "x-amzn-trace-id",
                "Root=1-5759e988-bd862e3fe1be46a994272793;Parent=53995c3f42cd8ad8;Sampled=1",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "3f4d6542-b8ce-4226-93d3-80d6f14d6db2",
                "email": "a@b.com",
                "password": "$2a$10$hash",
                "roles": [{"role": "OWNER"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let identity = client(&server.uri())
            .find_by_email("a@b.com", &trace())
            .await
            .unwrap();
        assert_eq!(identity.id.to_string(), "3f4d6542-b8ce-4226-93d3-80d6f14d6db2");
        assert_eq!(identity.role_names().collect::<Vec<_>>(), ["OWNER"]);
    }

    #[tokio::test]
    async fn unknown_user_is_a_client_error_with_message() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/users/email/ghost@b.com"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({"message": "not found", "status": 404})),
            )
            .mount(&server)
            .await;

        let err = client(&server.uri())
            .find_by_email("ghost@b.com", &trace())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.client_message(), "not found");
    }

    #[tokio::test]
    async fn client_error_without_message_has_no_message() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(409).set_body_string("conflict"))
            .mount(&server)
            .await;

        let err = client(&server.uri())
            .find_by_email("a@b.com", &trace())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Downstream { message: None, .. }));
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn directory_server_error_is_normalized() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("db down"))
            .mount(&server)
            .await;

        let err = client(&server.uri())
            .find_by_email("a@b.com", &trace())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error_code(), "downstream_server_error");
    }

    #[tokio::test]
    async fn undecodable_body_is_transport_failure() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = client(&server.uri())
            .find_by_email("a@b.com", &trace())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
    }

    #[tokio::test]
    async fn unreachable_directory_is_transport_failure() {
        let port = match TcpListener::bind("127.0.0.1:0") {
            Ok(listener) => listener.local_addr().unwrap().port(),
            Err(_) => {
                eprintln!("Skipping test: cannot bind localhost");
                return;
            }
        };
        let client = client(&format!("http://127.0.0.1:{port}"));

        let err = client.find_by_email("a@b.com", &trace()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
        assert!(client.probe().await.is_err());
    }
}
