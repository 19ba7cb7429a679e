// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Distributed Tracing
//!
//! Every request handled by the gateway gets one X-Ray segment.
//!
//! ## Flow
//!
//! 1. An inbound `X-Amzn-Trace-Id` with a valid `Root` is continued;
//!    otherwise a new trace is started
//! 2. The segment opens before authentication runs
//! 3. `Root=<trace>;Parent=<segment>;Sampled=1` is sent with every
//!    downstream call (identity lookup and backend forwarding)
//! 4. The segment is classified and emitted when its guard is dropped
//!
//! Segments go to the log by default, or to an X-Ray daemon when
//! `AWS_XRAY_DAEMON_ADDRESS` is configured.

pub mod emitter;
pub mod header;
pub mod segment;

pub use emitter::{DaemonSink, LogSink, SegmentSink};
pub use header::{TraceHeader, TRACE_HEADER};
pub use segment::{SegmentGuard, TraceSegment};
