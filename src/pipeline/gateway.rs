// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request orchestration.
//!
//! For every inbound request:
//!
//! 1. Open the trace segment (continuing an inbound trace if present)
//! 2. Buffer the body, refuse paths a URL parser would rewrite, match a route
//! 3. Drop any client-supplied `X-UserId`, stamp the trace header
//! 4. Run request stages, forward, run response stages
//! 5. Record the outcome; failures become error envelopes
//!
//! The segment closes when the guard leaves scope, including when the
//! request future is dropped mid-flight.

use std::sync::Arc;

use axum::{
    extract::Request,
    http::header::HOST,
    response::{IntoResponse, Response},
};
use tracing::{debug, error, info_span, warn, Instrument};

use super::{GatewayRequest, GatewayResponse, Stage};
use crate::auth::{AuthenticationGate, TokenIssuer, USER_ID_HEADER};
use crate::config::{DEFAULT_MAX_BODY_BYTES, DEFAULT_TRACING_NAME};
use crate::error::GatewayError;
use crate::providers::BackendClient;
use crate::routes::{is_ambiguous_path, RouteTable};
use crate::telemetry::{SegmentGuard, SegmentSink, TraceHeader, TRACE_HEADER};

pub struct Gateway {
    routes: RouteTable,
    gate: AuthenticationGate,
    issuer: TokenIssuer,
    backend: BackendClient,
    sink: Arc<dyn SegmentSink>,
    segment_name: String,
    max_body_bytes: usize,
    scheme: &'static str,
}

impl Gateway {
    pub fn new(
        routes: RouteTable,
        gate: AuthenticationGate,
        issuer: TokenIssuer,
        backend: BackendClient,
        sink: Arc<dyn SegmentSink>,
    ) -> Self {
        Self {
            routes,
            gate,
            issuer,
            backend,
            sink,
            segment_name: DEFAULT_TRACING_NAME.to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            scheme: "http",
        }
    }

    pub fn with_segment_name(mut self, name: impl Into<String>) -> Self {
        self.segment_name = name.into();
        self
    }

    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Scheme recorded in segment URLs for origin-form request targets.
    pub fn with_scheme(mut self, scheme: &'static str) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Handle one inbound request end to end.
    pub async fn handle(&self, request: Request) -> Response {
        let inbound = request
            .headers()
            .get(TRACE_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(TraceHeader::parse);

        let mut guard = SegmentGuard::open(
            &self.segment_name,
            inbound.as_ref(),
            request.method(),
            &self.request_url(&request),
            self.sink.clone(),
        );
        let trace = guard.downstream_header().clone();

        let span = info_span!(
            "gateway",
            method = %request.method(),
            path = %request.uri().path(),
            trace_id = %guard.trace_id(),
            segment_id = %guard.segment_id(),
        );

        async move {
            match self.execute(request, &trace).await {
                Ok(response) => {
                    debug!(status = %response.status(), "Exchange completed");
                    guard.observe_response(response.status());
                    response.into_response()
                }
                Err(err) => {
                    let status = err.status();
                    if status.is_server_error() {
                        error!(%status, code = err.error_code(), error = %err, "Exchange failed");
                    } else {
                        warn!(%status, code = err.error_code(), error = %err, "Exchange rejected");
                    }
                    guard.observe_failure(&err);
                    err.into_response()
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Full URL of the inbound request, rebuilt from `Host` when the
    /// request target is only a path.
    fn request_url(&self, request: &Request) -> String {
        let uri = request.uri();
        if uri.authority().is_some() {
            return uri.to_string();
        }
        let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        match request.headers().get(HOST).and_then(|v| v.to_str().ok()) {
            Some(host) => format!("{}://{host}{path}", self.scheme),
            None => path.to_string(),
        }
    }

    async fn execute(
        &self,
        request: Request,
        trace: &TraceHeader,
    ) -> Result<GatewayResponse, GatewayError> {
        let request = GatewayRequest::from_request(request, self.max_body_bytes).await?;

        if is_ambiguous_path(request.uri().path()) {
            return Err(GatewayError::InvalidPath(request.uri().path().to_string()));
        }

        let route = self
            .routes
            .find(request.method(), request.uri().path())
            .ok_or_else(|| GatewayError::RouteNotFound {
                method: request.method().clone(),
                path: request.uri().path().to_string(),
            })?;
        debug!(route = %route.id, backend = %route.uri, "Route matched");

        let mut request = request.without_header(&USER_ID_HEADER);
        if let Some(value) = trace.header_value() {
            request = request.with_header(TRACE_HEADER, value);
        }

        for stage in route.pipeline.request_stages() {
            if let Stage::Authenticate(policy) = stage {
                request = self.gate.authorize(request, policy, trace).await?;
            }
        }

        let mut response = self.backend.forward(&route.uri, request).await?;

        for stage in route.pipeline.response_stages() {
            if let Stage::IssueToken = stage {
                response = self.issuer.apply(response)?;
            }
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::gate::tests::{codec, StubResolver};
    use crate::auth::{Identity, IdentityResolver, RolePolicy, EMAIL_HINT_HEADER};
    use crate::config::ServiceUris;
    use crate::providers::UserDirectoryClient;
    use crate::routes::{FilterDefinition, RouteDefinition};
    use crate::telemetry::segment::tests::RecordingSink;
    use axum::body::{to_bytes, Body};
    use axum::http::{header::AUTHORIZATION, StatusCode};
    use serde_json::{json, Value};
    use async_trait::async_trait;
    use std::net::TcpListener;
    use std::time::Duration;
    use url::Url;
    use uuid::Uuid;
    use wiremock::matchers::{header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const USER_ID: &str = "3f4d6542-b8ce-4226-93d3-80d6f14d6db2";

    /// Directory that never answers.
    struct StalledResolver;

    #[async_trait]
    impl IdentityResolver for StalledResolver {
        async fn find_by_email(
            &self,
            _email: &str,
            _trace: &TraceHeader,
        ) -> Result<Identity, GatewayError> {
            std::future::pending().await
        }
    }

    fn can_bind_localhost() -> bool {
        TcpListener::bind("127.0.0.1:0").is_ok()
    }

    fn routes(backend: &str) -> RouteTable {
        let route = |id: &str, path: &str, methods: &[&str], filters: Vec<FilterDefinition>| {
            RouteDefinition {
                id: id.to_string(),
                uri: backend.to_string(),
                path: path.to_string(),
                methods: methods.iter().map(|m| m.to_string()).collect(),
                filters,
            }
        };
        RouteTable::from_definitions(vec![
            route("auth", "/api/auth/**", &[], vec![FilterDefinition::IssueToken]),
            route(
                "rooms-create",
                "/api/rooms",
                &["POST"],
                vec![FilterDefinition::Authenticate {
                    allowed_roles: RolePolicy::allow(["OWNER"]),
                }],
            ),
            route(
                "rooms",
                "/api/rooms/**",
                &[],
                vec![FilterDefinition::Authenticate {
                    allowed_roles: RolePolicy::any_authenticated(),
                }],
            ),
        ])
        .unwrap()
    }

    fn gateway(
        backend: &str,
        resolver: Arc<dyn IdentityResolver>,
        sink: Arc<RecordingSink>,
    ) -> Gateway {
        Gateway::new(
            routes(backend),
            AuthenticationGate::new(codec(), resolver),
            TokenIssuer::new(codec()),
            BackendClient::new(Duration::from_secs(5)).unwrap(),
            sink,
        )
    }

    fn bearer(email: &str) -> String {
        format!("Bearer {}", codec().issue(email).unwrap())
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn authorized_request_is_forwarded_with_user_id() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let backend = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/rooms/7"))
            .and(query_param("page", "2"))
            .and(header("x-userid", USER_ID))
            .and(header_exists("x-amzn-trace-id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7})))
            .expect(1)
            .mount(&backend)
            .await;

        let resolver = Arc::new(StubResolver::default().with_user(
            "a@b.com",
            Uuid::parse_str(USER_ID).unwrap(),
            &[],
        ));
        let sink = Arc::new(RecordingSink::default());
        let gateway = gateway(&backend.uri(), resolver, sink.clone());

        let request = Request::builder()
            .uri("/api/rooms/7?page=2")
            .header(HOST, "gateway.local:8080")
            .header(AUTHORIZATION, bearer("a@b.com"))
            .header(USER_ID_HEADER, "spoofed")
            .body(Body::empty())
            .unwrap();
        let response = gateway.handle(request).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({"id": 7}));

        let segment = sink.single();
        assert!(!segment.error && !segment.fault);
        assert_eq!(
            segment.http.request.url,
            "http://gateway.local:8080/api/rooms/7?page=2"
        );
    }

    #[tokio::test]
    async fn segment_url_uses_configured_scheme_or_path() {
        let sink = Arc::new(RecordingSink::default());
        let gateway = gateway("http://127.0.0.1:9", Arc::new(StubResolver::default()), sink.clone())
            .with_scheme("https");

        let with_host = Request::builder()
            .uri("/api/payments")
            .header(HOST, "edge.example.com")
            .body(Body::empty())
            .unwrap();
        let _ = gateway.handle(with_host).await;
        let without_host = Request::builder()
            .uri("/api/payments?x=1")
            .body(Body::empty())
            .unwrap();
        let _ = gateway.handle(without_host).await;

        let segments = sink.segments();
        assert_eq!(segments[0].http.request.url, "https://edge.example.com/api/payments");
        assert_eq!(segments[1].http.request.url, "/api/payments?x=1");
    }

    #[tokio::test]
    async fn dot_segments_cannot_escape_role_policy() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let backend = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&backend)
            .await;

        let base = Url::parse(&backend.uri()).unwrap();
        let services = ServiceUris {
            users: base.clone(),
            bookings: base.clone(),
            rooms: base.clone(),
            asks: base,
        };
        let resolver = Arc::new(StubResolver::default().with_user(
            "a@b.com",
            Uuid::new_v4(),
            &["CUSTOMER"],
        ));
        let sink = Arc::new(RecordingSink::default());
        let gateway = Gateway::new(
            RouteTable::defaults(&services).unwrap(),
            AuthenticationGate::new(codec(), resolver.clone()),
            TokenIssuer::new(codec()),
            BackendClient::new(Duration::from_secs(5)).unwrap(),
            sink.clone(),
        );
        let delete = |uri: &str| {
            Request::builder()
                .method("DELETE")
                .uri(uri)
                .header(AUTHORIZATION, bearer("a@b.com"))
                .body(Body::empty())
                .unwrap()
        };

        let direct = gateway.handle(delete("/api/rooms/3")).await;
        assert_eq!(direct.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(resolver.call_count(), 1);

        for uri in [
            "/api/rooms/x/../3",
            "/api/rooms/x/%2e%2e/3",
            "/api/rooms/x/%2E%2E/3",
            "/api/rooms/./3",
        ] {
            let response = gateway.handle(delete(uri)).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(
                json_body(response).await,
                json!({"message": "Invalid request path", "status": 400})
            );
        }
        // Rejected before the gate runs.
        assert_eq!(resolver.call_count(), 1);

        let segments = sink.segments();
        assert_eq!(segments.len(), 5);
        assert!(segments.iter().all(|s| s.error && !s.fault));
    }

    #[tokio::test]
    async fn cancelled_identity_lookup_closes_segment_as_fault() {
        let sink = Arc::new(RecordingSink::default());
        let gateway = gateway("http://127.0.0.1:9", Arc::new(StalledResolver), sink.clone());

        let request = Request::builder()
            .uri("/api/rooms")
            .header(AUTHORIZATION, bearer("a@b.com"))
            .body(Body::empty())
            .unwrap();
        let outcome = tokio::time::timeout(Duration::from_millis(50), gateway.handle(request)).await;
        assert!(outcome.is_err());

        let segment = sink.single();
        assert!(segment.fault);
        assert!(!segment.error);
        assert_eq!(segment.metadata["cancelled"], json!(true));
        assert!(segment.is_closed());
    }

    #[tokio::test]
    async fn local_rejections_never_reach_backends() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let backend = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&backend)
            .await;

        let resolver = Arc::new(StubResolver::default().with_user(
            "a@b.com",
            Uuid::new_v4(),
            &["CUSTOMER"],
        ));
        let cases = [
            (None, "Token is required"),
            (Some("Bearer invalid".to_string()), "Token not valid"),
            (Some(bearer("a@b.com")), "Not have permission"),
        ];

        for (authorization, message) in cases {
            let sink = Arc::new(RecordingSink::default());
            let gateway = gateway(&backend.uri(), resolver.clone(), sink.clone());

            let mut request = Request::builder().method("POST").uri("/api/rooms");
            if let Some(value) = authorization {
                request = request.header(AUTHORIZATION, value);
            }
            let response = gateway.handle(request.body(Body::empty()).unwrap()).await;

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(
                json_body(response).await,
                json!({"message": message, "status": 401})
            );

            let segment = sink.single();
            assert!(segment.error);
            assert!(!segment.fault);
            assert_eq!(segment.metadata["exception"]["message"], message);
        }

        // Only the insufficient-role case reaches the directory.
        assert_eq!(resolver.call_count(), 1);
    }

    #[tokio::test]
    async fn login_response_receives_token() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let backend = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("email", "a@b.com")
                    .set_body_json(json!({"ok": true})),
            )
            .mount(&backend)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/auth/bad"))
            .respond_with(ResponseTemplate::new(400).insert_header("email", "a@b.com"))
            .mount(&backend)
            .await;

        let sink = Arc::new(RecordingSink::default());
        let gateway = gateway(&backend.uri(), Arc::new(StubResolver::default()), sink.clone());

        let login = Request::builder()
            .method("POST")
            .uri("/api/auth/login")
            .body(Body::from(r#"{"email":"a@b.com","password":"pw"}"#))
            .unwrap();
        let response = gateway.handle(login).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(&EMAIL_HINT_HEADER).is_none());
        let token = response.headers()[AUTHORIZATION]
            .to_str()
            .unwrap()
            .strip_prefix("Bearer ")
            .unwrap()
            .to_string();
        assert_eq!(codec().extract_email(&token).as_deref(), Some("a@b.com"));

        let failed = Request::builder()
            .method("POST")
            .uri("/api/auth/bad")
            .body(Body::empty())
            .unwrap();
        let response = gateway.handle(failed).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get(AUTHORIZATION).is_none());
        assert!(response.headers().get(&EMAIL_HINT_HEADER).is_none());

        let segments = sink.segments();
        assert_eq!(segments.len(), 2);
        assert!(!segments[0].error);
        assert!(segments[1].error);
    }

    #[tokio::test]
    async fn unknown_identity_propagates_directory_404() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let directory = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/users/email/ghost@b.com"))
            .and(header_exists("x-amzn-trace-id"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({"message": "not found", "status": 404})),
            )
            .expect(1)
            .mount(&directory)
            .await;

        let resolver = Arc::new(
            UserDirectoryClient::new(Url::parse(&directory.uri()).unwrap(), Duration::from_secs(5))
                .unwrap(),
        );
        let sink = Arc::new(RecordingSink::default());
        let gateway = gateway(&directory.uri(), resolver, sink.clone());

        let request = Request::builder()
            .uri("/api/rooms")
            .header(AUTHORIZATION, bearer("ghost@b.com"))
            .body(Body::empty())
            .unwrap();
        let response = gateway.handle(request).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            json_body(response).await,
            json!({"message": "not found", "status": 404})
        );
        assert!(sink.single().error);
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_fault() {
        let port = match TcpListener::bind("127.0.0.1:0") {
            Ok(listener) => listener.local_addr().unwrap().port(),
            Err(_) => {
                eprintln!("Skipping test: cannot bind localhost");
                return;
            }
        };
        let sink = Arc::new(RecordingSink::default());
        let gateway = gateway(
            &format!("http://127.0.0.1:{port}"),
            Arc::new(StubResolver::default()),
            sink.clone(),
        );

        let request = Request::builder()
            .method("POST")
            .uri("/api/auth/login")
            .body(Body::empty())
            .unwrap();
        let response = gateway.handle(request).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_body(response).await,
            json!({"message": "Internal server error", "status": 500})
        );
        let segment = sink.single();
        assert!(segment.fault);
        assert!(!segment.error);
        assert_eq!(segment.cause.unwrap().exceptions[0].kind, "transport_error");
    }

    #[tokio::test]
    async fn unmatched_route_is_404_envelope() {
        let sink = Arc::new(RecordingSink::default());
        let gateway = gateway("http://127.0.0.1:9", Arc::new(StubResolver::default()), sink.clone());

        let request = Request::builder()
            .uri("/api/payments")
            .body(Body::empty())
            .unwrap();
        let response = gateway.handle(request).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            json_body(response).await,
            json!({"message": "Route not found", "status": 404})
        );
        assert!(sink.single().error);
    }

    #[tokio::test]
    async fn inbound_trace_is_continued() {
        let sink = Arc::new(RecordingSink::default());
        let gateway = gateway("http://127.0.0.1:9", Arc::new(StubResolver::default()), sink.clone());

        let request = Request::builder()
            .uri("/api/rooms")
            .header(
                TRACE_HEADER,
                "Root=1-5759e988-bd862e3fe1be46a994272793;Parent=53995c3f42cd8ad8;Sampled=1",
            )
            .body(Body::empty())
            .unwrap();
        let _ = gateway.handle(request).await;

        let segment = sink.single();
        assert_eq!(segment.trace_id, "1-5759e988-bd862e3fe1be46a994272793");
        assert_eq!(segment.parent_id.as_deref(), Some("53995c3f42cd8ad8"));
    }

    #[tokio::test]
    async fn oversized_body_is_rejected_with_400() {
        let sink = Arc::new(RecordingSink::default());
        let gateway = gateway("http://127.0.0.1:9", Arc::new(StubResolver::default()), sink.clone())
            .with_max_body_bytes(8)
            .with_segment_name("Edge");

        let request = Request::builder()
            .method("POST")
            .uri("/api/auth/login")
            .body(Body::from(vec![b'x'; 64]))
            .unwrap();
        let response = gateway.handle(request).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let segment = sink.single();
        assert_eq!(segment.name, "Edge");
        assert!(segment.error);
    }
}
