//! Diagnostic events emitted by the streaming core.
//!
//! The core never logs directly about session outcomes; it hands a
//! [`StreamEvent`] to whatever [`DiagnosticSink`] it was constructed with.
//! [`TracingSink`] forwards events to `tracing`, and [`EventLog`] keeps a
//! bounded ring of recent events on top of that for later inspection.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::range::ByteRange;

/// Maximum number of events retained by [`EventLog::default`].
const MAX_RECENT_EVENTS: usize = 100;

/// How a session produces its bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamMode {
    /// Byte window served straight from a file.
    Direct,
    /// Output of a live transcoder.
    Transcode,
}

impl std::fmt::Display for StreamMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamMode::Direct => write!(f, "direct"),
            StreamMode::Transcode => write!(f, "transcode"),
        }
    }
}

/// Why a session stopped before its source was exhausted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum AbortReason {
    /// The peer went away (body dropped or write failed).
    ClientDisconnected,
    /// The session was cancelled from the server side (e.g. shutdown).
    Cancelled,
    /// Reading from the source failed mid-stream.
    SourceError(String),
    /// The transcoder exited unsuccessfully.
    UpstreamFailure(String),
}

/// Something that happened to a streaming session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    SessionStarted {
        session_id: String,
        mode: StreamMode,
        resource: String,
        range: Option<ByteRange>,
        pid: Option<u32>,
    },
    SessionCompleted {
        session_id: String,
        bytes_sent: u64,
        elapsed_ms: u64,
    },
    SessionAborted {
        session_id: String,
        reason: AbortReason,
        bytes_sent: u64,
        elapsed_ms: u64,
    },
    /// A request was refused before any response body was produced.
    Rejected {
        resource: String,
        status: u16,
        reason: String,
    },
}

/// The "emit diagnostic event" capability the core depends on.
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, event: StreamEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, event: StreamEvent) {
        match event {
            StreamEvent::SessionStarted {
                session_id,
                mode,
                resource,
                range,
                pid,
            } => tracing::info!(
                session_id = %session_id,
                mode = %mode,
                resource = %resource,
                range = ?range,
                pid = ?pid,
                "Stream session started"
            ),
            StreamEvent::SessionCompleted {
                session_id,
                bytes_sent,
                elapsed_ms,
            } => tracing::info!(
                session_id = %session_id,
                bytes_sent,
                elapsed_ms,
                "Stream session completed"
            ),
            StreamEvent::SessionAborted {
                session_id,
                reason: AbortReason::ClientDisconnected,
                bytes_sent,
                elapsed_ms,
            } => tracing::debug!(
                session_id = %session_id,
                bytes_sent,
                elapsed_ms,
                "Stream session ended by client"
            ),
            StreamEvent::SessionAborted {
                session_id,
                reason,
                bytes_sent,
                elapsed_ms,
            } => tracing::warn!(
                session_id = %session_id,
                reason = ?reason,
                bytes_sent,
                elapsed_ms,
                "Stream session aborted"
            ),
            StreamEvent::Rejected {
                resource,
                status,
                reason,
            } => tracing::debug!(
                resource = %resource,
                status,
                reason = %reason,
                "Stream request rejected"
            ),
        }
    }
}

/// A recorded event with its timestamp.
#[derive(Debug, Clone, Serialize)]
pub struct RecordedEvent {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: StreamEvent,
}

/// Bounded ring of recent events that also forwards to an inner sink.
pub struct EventLog {
    recent: RwLock<VecDeque<RecordedEvent>>,
    capacity: usize,
    inner: Arc<dyn DiagnosticSink>,
}

impl EventLog {
    /// Create a log retaining at most `capacity` events.
    pub fn new(capacity: usize, inner: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            recent: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
            inner,
        }
    }

    /// Most recent events, newest first.
    pub fn recent(&self, limit: usize) -> Vec<RecordedEvent> {
        self.recent.read().iter().rev().take(limit).cloned().collect()
    }

    /// Number of retained events.
    pub fn len(&self) -> usize {
        self.recent.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.read().is_empty()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(MAX_RECENT_EVENTS, Arc::new(TracingSink))
    }
}

impl DiagnosticSink for EventLog {
    fn emit(&self, event: StreamEvent) {
        {
            let mut recent = self.recent.write();
            if self.capacity > 0 && recent.len() == self.capacity {
                recent.pop_front();
            }
            if self.capacity > 0 {
                recent.push_back(RecordedEvent {
                    at: Utc::now(),
                    event: event.clone(),
                });
            }
        }
        self.inner.emit(event);
    }
}
