// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! `X-Amzn-Trace-Id` propagation header.
//!
//! Format: `Root=<trace id>;Parent=<segment id>;Sampled=<0|1>`
//!
//! - trace id: `1-<8 hex digits of epoch seconds>-<24 random hex digits>`
//! - segment id: 16 random hex digits

use axum::http::{HeaderName, HeaderValue};
use uuid::Uuid;

/// Header carrying the trace context to every downstream call.
pub const TRACE_HEADER: HeaderName = HeaderName::from_static("x-amzn-trace-id");

/// Generate a fresh X-Ray trace id.
pub fn new_trace_id() -> String {
    let epoch = chrono::Utc::now().timestamp();
    let random = Uuid::new_v4().simple().to_string();
    format!("1-{:08x}-{}", epoch, &random[..24])
}

/// Generate a fresh X-Ray segment id.
pub fn new_segment_id() -> String {
    let random = Uuid::new_v4().simple().to_string();
    random[..16].to_string()
}

fn is_hex(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| b.is_ascii_hexdigit())
}

fn is_trace_id(s: &str) -> bool {
    let mut parts = s.splitn(3, '-');
    matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some("1"), Some(epoch), Some(random)) if is_hex(epoch, 8) && is_hex(random, 24)
    )
}

/// Parsed or generated trace context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceHeader {
    pub root: String,
    pub parent: Option<String>,
    pub sampled: Option<bool>,
}

impl TraceHeader {
    /// Header sent downstream on behalf of segment `segment_id`.
    pub fn downstream(trace_id: &str, segment_id: &str) -> Self {
        Self {
            root: trace_id.to_string(),
            parent: Some(segment_id.to_string()),
            sampled: Some(true),
        }
    }

    /// Parse an inbound header value.
    ///
    /// Returns `None` unless a well-formed `Root` is present. A malformed
    /// `Parent` is dropped rather than rejecting the whole header.
    pub fn parse(value: &str) -> Option<Self> {
        let mut root = None;
        let mut parent = None;
        let mut sampled = None;

        for field in value.split(';') {
            let Some((key, val)) = field.split_once('=') else {
                continue;
            };
            match key.trim() {
                "Root" => root = Some(val.trim().to_string()),
                "Parent" => parent = Some(val.trim().to_string()),
                "Sampled" => {
                    sampled = match val.trim() {
                        "1" => Some(true),
                        "0" => Some(false),
                        _ => None,
                    }
                }
                _ => {}
            }
        }

        let root = root.filter(|r| is_trace_id(r))?;
        Some(Self {
            root,
            parent: parent.filter(|p| is_hex(p, 16)),
            sampled,
        })
    }

    pub fn header_value(&self) -> Option<HeaderValue> {
        HeaderValue::from_str(&self.to_string()).ok()
    }
}

impl std::fmt::Display for TraceHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Root={}", self.root)?;
        if let Some(parent) = &self.parent {
            write!(f, ";Parent={parent}")?;
        }
        match self.sampled {
            Some(true) => write!(f, ";Sampled=1"),
            Some(false) => write!(f, ";Sampled=0"),
            None => Ok(()),
        }
    }
}
