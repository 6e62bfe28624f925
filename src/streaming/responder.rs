//! Turns a byte source into an HTTP response.
//!
//! Both streaming paths end here. A [`StreamSession`] pairs a source (a
//! bounded file reader or a running transcoder) with its registry ticket and
//! cancellation token; [`StreamResponder::respond`] commits the headers
//! for that source and returns a body that pulls the source one chunk at a
//! time, only when the transport asks for more.
//!
//! The body owns a session guard. However the body ends (exhausted,
//! errored, or dropped by hyper because the peer went away), the guard
//! records the outcome exactly once and cancels the session token, which in
//! turn stops the transcoder if there is one.

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::Response,
};
use futures::StreamExt;
use reelstream_av::ProcessHandle;
use reelstream_common::paths::TRANSCODE_CONTENT_TYPE;
use reelstream_common::{AbortReason, DiagnosticSink, Error, Result, StreamEvent};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OwnedSemaphorePermit;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

use super::direct::BoundedReader;
use super::sessions::{SessionState, SessionTicket};

/// Default body chunk size.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Where a session's bytes come from.
pub enum SessionSource {
    /// A window of a file on disk.
    File {
        reader: BoundedReader,
        total_size: u64,
        content_type: &'static str,
    },
    /// The stdout of a running transcoder.
    Process {
        handle: ProcessHandle,
        /// Admission slot, released when the session ends.
        permit: Option<OwnedSemaphorePermit>,
    },
}

/// One accepted streaming request, ready to be answered.
pub struct StreamSession {
    ticket: SessionTicket,
    cancel: CancellationToken,
    source: SessionSource,
}

impl StreamSession {
    pub fn new(ticket: SessionTicket, cancel: CancellationToken, source: SessionSource) -> Self {
        Self {
            ticket,
            cancel,
            source,
        }
    }

    pub fn id(&self) -> &str {
        self.ticket.id()
    }
}

/// Builds responses for streaming sessions.
pub struct StreamResponder {
    chunk_size: usize,
    exit_grace: Duration,
    sink: Arc<dyn DiagnosticSink>,
}

impl StreamResponder {
    /// `exit_grace` bounds how long a finished transcoder may take to exit
    /// after closing its stdout before it is terminated.
    pub fn new(chunk_size: usize, exit_grace: Duration, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            exit_grace,
            sink,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Commit headers for `session` and return the streaming response.
    ///
    /// Errors are only possible before any header is produced.
    pub fn respond(&self, session: StreamSession) -> Result<Response> {
        let StreamSession {
            ticket,
            cancel,
            source,
        } = session;

        match source {
            SessionSource::File {
                reader,
                total_size,
                content_type,
            } => {
                let range = reader.range();
                let builder = Response::builder()
                    .status(StatusCode::PARTIAL_CONTENT)
                    .header(header::CONTENT_TYPE, content_type)
                    .header(header::CONTENT_LENGTH, range.length().to_string())
                    .header(header::CONTENT_RANGE, range.content_range(total_size))
                    .header(header::ACCEPT_RANGES, "bytes");

                let guard = self.start(ticket, cancel, None, None, Some(range.length()));
                let body = file_body(guard, reader, self.chunk_size);
                builder
                    .body(body)
                    .map_err(|e| Error::Internal(format!("failed to build response: {e}")))
            }
            SessionSource::Process { mut handle, permit } => {
                let Some(stdout) = handle.take_stdout() else {
                    return Err(Error::Internal("transcoder stdout unavailable".into()));
                };
                let builder = Response::builder()
                    .status(StatusCode::OK)
                    .header(header::CONTENT_TYPE, TRANSCODE_CONTENT_TYPE)
                    .header(header::CACHE_CONTROL, "no-store");

                let guard = self.start(ticket, cancel, handle.pid(), permit, None);
                let chunks = ReaderStream::with_capacity(stdout, self.chunk_size);
                let body = process_body(guard, handle, chunks, self.exit_grace);
                builder
                    .body(body)
                    .map_err(|e| Error::Internal(format!("failed to build response: {e}")))
            }
        }
    }

    fn start(
        &self,
        ticket: SessionTicket,
        cancel: CancellationToken,
        pid: Option<u32>,
        permit: Option<OwnedSemaphorePermit>,
        expected_bytes: Option<u64>,
    ) -> SessionGuard {
        let mut guard = SessionGuard {
            ticket,
            cancel,
            started: Instant::now(),
            bytes_sent: 0,
            expected_bytes,
            state: SessionState::Idle,
            sink: self.sink.clone(),
            _permit: permit,
        };
        guard.advance(SessionState::HeadersSent);
        guard.sink.emit(StreamEvent::SessionStarted {
            session_id: guard.ticket.id().to_string(),
            mode: guard.ticket.mode(),
            resource: guard.ticket.resource().to_string(),
            range: guard.ticket.range(),
            pid,
        });
        guard
    }
}

/// Per-session bookkeeping owned by the response body.
struct SessionGuard {
    ticket: SessionTicket,
    cancel: CancellationToken,
    started: Instant,
    bytes_sent: u64,
    /// Declared body length, when there is one.
    expected_bytes: Option<u64>,
    state: SessionState,
    sink: Arc<dyn DiagnosticSink>,
    _permit: Option<OwnedSemaphorePermit>,
}

impl SessionGuard {
    fn advance(&mut self, next: SessionState) {
        self.state = next;
        self.ticket.set_state(next);
    }

    fn record(&mut self, bytes: usize) {
        self.bytes_sent += bytes as u64;
        self.ticket.add_bytes(bytes as u64);
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn complete(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.advance(SessionState::Completed);
        self.sink.emit(StreamEvent::SessionCompleted {
            session_id: self.ticket.id().to_string(),
            bytes_sent: self.bytes_sent,
            elapsed_ms: self.elapsed_ms(),
        });
    }

    fn abort(&mut self, reason: AbortReason) {
        if self.state.is_terminal() {
            return;
        }
        self.advance(SessionState::Aborted);
        self.sink.emit(StreamEvent::SessionAborted {
            session_id: self.ticket.id().to_string(),
            reason,
            bytes_sent: self.bytes_sent,
            elapsed_ms: self.elapsed_ms(),
        });
        self.cancel.cancel();
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.cancel.is_cancelled() {
            self.abort(AbortReason::Cancelled);
        } else if self.expected_bytes == Some(self.bytes_sent) {
            // The transport stops polling once a declared length is written.
            self.complete();
        } else {
            self.abort(AbortReason::ClientDisconnected);
        }
        self.cancel.cancel();
    }
}

fn cancelled_error() -> io::Error {
    io::Error::new(io::ErrorKind::Interrupted, "stream cancelled")
}

fn file_body(mut guard: SessionGuard, reader: BoundedReader, chunk_size: usize) -> Body {
    let stream = async_stream::stream! {
        let mut chunks = ReaderStream::with_capacity(reader, chunk_size);
        guard.advance(SessionState::Streaming);

        loop {
            let next = tokio::select! {
                biased;
                _ = guard.cancel.cancelled() => None,
                chunk = chunks.next() => Some(chunk),
            };

            match next {
                None => {
                    guard.abort(AbortReason::Cancelled);
                    yield Err(cancelled_error());
                    break;
                }
                Some(Some(Ok(bytes))) => {
                    guard.record(bytes.len());
                    yield Ok(bytes);
                    if guard.expected_bytes == Some(guard.bytes_sent) {
                        guard.complete();
                        break;
                    }
                }
                Some(Some(Err(e))) => {
                    tracing::warn!(
                        session_id = %guard.ticket.id(),
                        resource = %guard.ticket.resource(),
                        range = ?guard.ticket.range(),
                        elapsed_ms = guard.elapsed_ms(),
                        "File read failed mid-stream: {e}"
                    );
                    guard.abort(AbortReason::SourceError(e.to_string()));
                    yield Err(e);
                    break;
                }
                Some(None) => {
                    guard.complete();
                    break;
                }
            }
        }
    };
    Body::from_stream(stream)
}

fn process_body(
    mut guard: SessionGuard,
    handle: ProcessHandle,
    mut chunks: ReaderStream<tokio::process::ChildStdout>,
    exit_grace: Duration,
) -> Body {
    let stream = async_stream::stream! {
        guard.advance(SessionState::Streaming);

        loop {
            let next = tokio::select! {
                biased;
                _ = guard.cancel.cancelled() => None,
                chunk = chunks.next() => Some(chunk),
            };

            match next {
                None => {
                    guard.abort(AbortReason::Cancelled);
                    yield Err(cancelled_error());
                    break;
                }
                Some(Some(Ok(bytes))) => {
                    guard.record(bytes.len());
                    yield Ok(bytes);
                }
                Some(Some(Err(e))) => {
                    tracing::warn!(
                        session_id = %guard.ticket.id(),
                        pid = ?handle.pid(),
                        elapsed_ms = guard.elapsed_ms(),
                        "Transcoder stdout read failed: {e}"
                    );
                    guard.abort(AbortReason::SourceError(e.to_string()));
                    yield Err(e);
                    break;
                }
                Some(None) => {
                    // stdout closed; the exit status decides the outcome.
                    let exit = match tokio::time::timeout(exit_grace, handle.wait()).await {
                        Ok(exit) => exit,
                        Err(_) => handle.terminate().await,
                    };

                    if exit.success() {
                        guard.complete();
                    } else {
                        let detail = match handle.stderr_log().last() {
                            Some(line) => format!("{exit}: {line}"),
                            None => exit.to_string(),
                        };
                        tracing::warn!(
                            session_id = %guard.ticket.id(),
                            pid = ?handle.pid(),
                            input = %handle.input().display(),
                            elapsed_ms = guard.elapsed_ms(),
                            "Transcoder failed after streaming began: {detail}"
                        );
                        let err = Error::upstream(handle.tool(), detail.clone());
                        guard.abort(AbortReason::UpstreamFailure(detail));
                        yield Err(io::Error::other(err));
                    }
                    break;
                }
            }
        }
    };
    Body::from_stream(stream)
}
