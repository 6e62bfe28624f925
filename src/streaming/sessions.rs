//! Registry of in-flight streaming sessions.
//!
//! Every accepted streaming request registers here and receives a
//! [`SessionTicket`]. The ticket keeps the entry's state and byte count
//! current while the response is being written, and removes the entry when
//! it is dropped, so the registry only ever lists live sessions.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use reelstream_common::{ByteRange, StreamMode};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Lifecycle of a single streaming response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Accepted, no headers produced yet.
    Idle,
    /// Status line and headers committed.
    HeadersSent,
    /// Body bytes are flowing.
    Streaming,
    /// Source exhausted and every byte handed to the transport.
    Completed,
    /// Stopped early (disconnect, source error, upstream failure).
    Aborted,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Aborted)
    }
}

/// A registered streaming session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    /// Unique session identifier (UUID).
    pub id: String,
    pub mode: StreamMode,
    /// Requested resource path.
    pub resource: String,
    /// Client IP address, if known.
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    /// Served window (direct sessions only).
    pub range: Option<ByteRange>,
    /// Transcoder pid (transcode sessions only).
    pub pid: Option<u32>,
    pub state: SessionState,
    pub bytes_sent: u64,
    pub started_at: DateTime<Utc>,
}

/// What a handler knows about a session before it is registered.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub mode: StreamMode,
    pub resource: String,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub range: Option<ByteRange>,
}

/// Thread-safe session registry.
#[derive(Clone, Default)]
pub struct SessionManager {
    sessions: Arc<DashMap<String, SessionInfo>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new streaming session.
    ///
    /// The session stays listed until the returned ticket is dropped.
    pub fn register_session(&self, new: NewSession) -> SessionTicket {
        let session_id = Uuid::new_v4().to_string();

        let info = SessionInfo {
            id: session_id.clone(),
            mode: new.mode,
            resource: new.resource,
            client_ip: new.client_ip,
            user_agent: new.user_agent,
            range: new.range,
            pid: None,
            state: SessionState::Idle,
            bytes_sent: 0,
            started_at: Utc::now(),
        };

        tracing::debug!(
            session_id = %session_id,
            mode = %info.mode,
            resource = %info.resource,
            client_ip = ?info.client_ip,
            user_agent = ?info.user_agent,
            "Registered stream session"
        );

        let ticket = SessionTicket {
            id: session_id.clone(),
            mode: info.mode,
            resource: info.resource.clone(),
            range: info.range,
            sessions: self.sessions.clone(),
        };
        self.sessions.insert(session_id, info);
        ticket
    }

    /// List all active sessions, oldest first.
    pub fn list_active_sessions(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<SessionInfo> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        sessions.sort_by_key(|s| s.started_at);
        sessions
    }

    /// Get a specific session by ID.
    pub fn get_session(&self, session_id: &str) -> Option<SessionInfo> {
        self.sessions
            .get(session_id)
            .map(|entry| entry.value().clone())
    }

    /// Number of active sessions in the given mode.
    pub fn count_by_mode(&self, mode: StreamMode) -> usize {
        self.sessions.iter().filter(|s| s.mode == mode).count()
    }

    /// Get the number of active sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Check if there are any active sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Proof of registration. Dropping it removes the session from the
/// registry.
pub struct SessionTicket {
    id: String,
    mode: StreamMode,
    resource: String,
    range: Option<ByteRange>,
    sessions: Arc<DashMap<String, SessionInfo>>,
}

impl SessionTicket {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn mode(&self) -> StreamMode {
        self.mode
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn range(&self) -> Option<ByteRange> {
        self.range
    }

    pub fn set_state(&self, state: SessionState) {
        if let Some(mut session) = self.sessions.get_mut(&self.id) {
            session.state = state;
        }
    }

    pub fn set_pid(&self, pid: Option<u32>) {
        if let Some(mut session) = self.sessions.get_mut(&self.id) {
            session.pid = pid;
        }
    }

    pub fn add_bytes(&self, bytes: u64) {
        if let Some(mut session) = self.sessions.get_mut(&self.id) {
            session.bytes_sent += bytes;
        }
    }
}

impl Drop for SessionTicket {
    fn drop(&mut self) {
        if let Some((_, session)) = self.sessions.remove(&self.id) {
            tracing::debug!(
                session_id = %self.id,
                resource = %session.resource,
                bytes_sent = session.bytes_sent,
                duration_secs = (Utc::now() - session.started_at).num_seconds(),
                "Ended stream session"
            );
        }
    }
}

impl std::fmt::Debug for SessionTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTicket")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("resource", &self.resource)
            .finish()
    }
}
