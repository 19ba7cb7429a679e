// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-request trace segments.
//!
//! ## Lifecycle
//!
//! 1. [`SegmentGuard::open`] creates the segment and records request
//!    metadata before any pipeline stage runs.
//! 2. The pipeline records exactly one outcome: a response status or a
//!    failure.
//! 3. Dropping the guard classifies the outcome, stamps the end time and
//!    hands the segment to the sink. This happens on every exit path,
//!    including a cancelled request future.
//!
//! ## Classification
//!
//! | Outcome | Flags |
//! |---------|-------|
//! | response 4xx | `error` |
//! | response 5xx | `fault` |
//! | failure with status < 500 | `error`, message under `metadata.exception` |
//! | failure with status >= 500 | `fault`, failure recorded as `cause` |
//! | nothing recorded | `fault`, `metadata.cancelled = true` |

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use serde::Serialize;
use serde_json::{json, Map, Value};

use super::emitter::SegmentSink;
use super::header::{new_segment_id, new_trace_id, TraceHeader};
use crate::error::GatewayError;

/// Request metadata recorded when the segment opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestInfo {
    pub method: String,
    pub url: String,
}

/// Response metadata recorded when the outcome is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseInfo {
    pub status: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HttpInfo {
    pub request: RequestInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseInfo>,
}

/// Failure detail attached to faulted segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExceptionInfo {
    pub id: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cause {
    pub exceptions: Vec<ExceptionInfo>,
}

/// One X-Ray segment document.
#[derive(Debug, Clone, Serialize)]
pub struct TraceSegment {
    pub name: String,
    pub id: String,
    pub trace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub start_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
    pub http: HttpInfo,
    pub error: bool,
    pub fault: bool,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<Cause>,
}

impl TraceSegment {
    fn open(name: &str, inbound: Option<&TraceHeader>, method: &Method, url: &str) -> Self {
        Self {
            name: name.to_string(),
            id: new_segment_id(),
            trace_id: inbound
                .map(|h| h.root.clone())
                .unwrap_or_else(new_trace_id),
            parent_id: inbound.and_then(|h| h.parent.clone()),
            start_time: epoch_seconds(),
            end_time: None,
            http: HttpInfo {
                request: RequestInfo {
                    method: method.as_str().to_string(),
                    url: url.to_string(),
                },
                response: None,
            },
            error: false,
            fault: false,
            metadata: Map::new(),
            cause: None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.end_time.is_some()
    }
}

fn epoch_seconds() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

#[derive(Debug)]
enum Outcome {
    Response(StatusCode),
    Failure {
        status: StatusCode,
        kind: &'static str,
        message: String,
        detail: String,
    },
}

fn classify(segment: &mut TraceSegment, outcome: Option<Outcome>) {
    match outcome {
        Some(Outcome::Response(status)) => {
            segment.http.response = Some(ResponseInfo {
                status: status.as_u16(),
            });
            if status.is_client_error() {
                segment.error = true;
            } else if status.is_server_error() {
                segment.fault = true;
            }
        }
        Some(Outcome::Failure {
            status,
            kind,
            message,
            detail,
        }) => {
            segment.http.response = Some(ResponseInfo {
                status: status.as_u16(),
            });
            if status.as_u16() < 500 {
                segment.error = true;
                segment.fault = false;
                segment
                    .metadata
                    .insert("exception".to_string(), json!({ "message": message }));
            } else {
                segment.fault = true;
                segment.cause = Some(Cause {
                    exceptions: vec![ExceptionInfo {
                        id: new_segment_id(),
                        message: detail,
                        kind: kind.to_string(),
                    }],
                });
            }
        }
        None => {
            segment.fault = true;
            segment
                .metadata
                .insert("cancelled".to_string(), Value::Bool(true));
        }
    }
}

/// Scoped owner of the request's segment.
///
/// The segment is emitted from `Drop`, so it is closed exactly once no
/// matter how the request future ends.
pub struct SegmentGuard {
    segment: Option<TraceSegment>,
    outcome: Option<Outcome>,
    downstream: TraceHeader,
    sink: Arc<dyn SegmentSink>,
}

impl SegmentGuard {
    /// Open a segment for an inbound request.
    ///
    /// `inbound` is the caller's trace header, if it carried a valid one.
    pub fn open(
        name: &str,
        inbound: Option<&TraceHeader>,
        method: &Method,
        url: &str,
        sink: Arc<dyn SegmentSink>,
    ) -> Self {
        let segment = TraceSegment::open(name, inbound, method, url);
        let downstream = TraceHeader::downstream(&segment.trace_id, &segment.id);
        Self {
            segment: Some(segment),
            outcome: None,
            downstream,
            sink,
        }
    }

    /// Header to attach to every downstream call made for this request.
    pub fn downstream_header(&self) -> &TraceHeader {
        &self.downstream
    }

    pub fn trace_id(&self) -> &str {
        &self.downstream.root
    }

    pub fn segment_id(&self) -> &str {
        self.downstream.parent.as_deref().unwrap_or_default()
    }

    /// Record a completed response. Ignored if an outcome is already set.
    pub fn observe_response(&mut self, status: StatusCode) {
        if self.outcome.is_none() {
            self.outcome = Some(Outcome::Response(status));
        }
    }

    /// Record a pipeline failure. Ignored if an outcome is already set.
    pub fn observe_failure(&mut self, err: &GatewayError) {
        if self.outcome.is_none() {
            self.outcome = Some(Outcome::Failure {
                status: err.status(),
                kind: err.error_code(),
                message: err.client_message(),
                detail: err.to_string(),
            });
        }
    }
}

impl Drop for SegmentGuard {
    fn drop(&mut self) {
        if let Some(mut segment) = self.segment.take() {
            classify(&mut segment, self.outcome.take());
            segment.end_time = Some(epoch_seconds());
            self.sink.emit(&segment);
        }
    }
}
