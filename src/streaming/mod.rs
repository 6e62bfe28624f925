//! Media streaming module.
//!
//! # Routes
//!
//! - `GET /api/stream/direct?path=...` - Byte range of a file (Range required, 206)
//! - `GET /api/stream/transcode?path=...` - Live fragmented-MP4 transcode (200, chunked)

mod direct;
mod responder;
mod sessions;
mod transcode;

pub use direct::{stream_direct, BoundedReader, FileRangeServer, ResolvedFile, StreamQuery};
pub use responder::{SessionSource, StreamResponder, StreamSession, DEFAULT_CHUNK_SIZE};
pub use sessions::{NewSession, SessionInfo, SessionManager, SessionState, SessionTicket};
pub use transcode::{stream_transcode, TranscodeAdmission};

use axum::{routing::get, Router};

use crate::server::AppContext;

/// Create streaming router.
pub fn stream_router() -> Router<AppContext> {
    Router::new()
        .route("/direct", get(stream_direct))
        .route("/transcode", get(stream_transcode))
}
