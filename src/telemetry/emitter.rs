// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Destinations for closed segments.
//!
//! Emission is best-effort: a sink never fails the request it traces.

use std::net::{SocketAddr, UdpSocket};

use tracing::{debug, info, warn};

use super::segment::TraceSegment;

/// Header line the X-Ray daemon expects before every segment document.
const DAEMON_PREAMBLE: &str = "{\"format\":\"json\",\"version\":1}\n";

/// Receives every closed segment.
pub trait SegmentSink: Send + Sync {
    fn emit(&self, segment: &TraceSegment);
}

/// Writes segments to the log as structured events.
#[derive(Debug, Clone, Default)]
pub struct LogSink;

impl SegmentSink for LogSink {
    fn emit(&self, segment: &TraceSegment) {
        match serde_json::to_string(segment) {
            Ok(document) => info!(
                target: "xray",
                trace_id = %segment.trace_id,
                segment_id = %segment.id,
                error = segment.error,
                fault = segment.fault,
                segment = %document,
                "Segment closed"
            ),
            Err(e) => warn!(target: "xray", error = %e, "Failed to serialize segment"),
        }
    }
}

/// Sends segments to an X-Ray daemon over UDP.
#[derive(Debug)]
pub struct DaemonSink {
    socket: UdpSocket,
    daemon: SocketAddr,
}

impl DaemonSink {
    /// Bind an ephemeral local socket for sending to `daemon`.
    pub fn new(daemon: SocketAddr) -> std::io::Result<Self> {
        let bind: SocketAddr = if daemon.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(bind)?;
        socket.set_nonblocking(true)?;
        Ok(Self { socket, daemon })
    }

    pub fn daemon_addr(&self) -> SocketAddr {
        self.daemon
    }

    fn datagram(segment: &TraceSegment) -> serde_json::Result<Vec<u8>> {
        let document = serde_json::to_vec(segment)?;
        let mut datagram = Vec::with_capacity(DAEMON_PREAMBLE.len() + document.len());
        datagram.extend_from_slice(DAEMON_PREAMBLE.as_bytes());
        datagram.extend_from_slice(&document);
        Ok(datagram)
    }
}

impl SegmentSink for DaemonSink {
    fn emit(&self, segment: &TraceSegment) {
        let datagram = match Self::datagram(segment) {
            Ok(d) => d,
            Err(e) => {
                warn!(target: "xray", error = %e, "Failed to serialize segment");
                return;
            }
        };

        match self.socket.send_to(&datagram, self.daemon) {
            Ok(_) => debug!(
                target: "xray",
                trace_id = %segment.trace_id,
                segment_id = %segment.id,
                "Segment sent to daemon"
            ),
            Err(e) => warn!(
                target: "xray",
                daemon = %self.daemon,
                error = %e,
                "Failed to send segment to daemon"
            ),
        }
    }
}
