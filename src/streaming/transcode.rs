//! Live transcoding endpoint.
//!
//! Pipes the output of an ffmpeg process straight into the response. The
//! output length is unknown, so the response is 200 with a chunked body and
//! no range headers. A semaphore caps concurrent transcoders; requests
//! beyond the cap are rejected with 503 rather than queued.

use axum::{
    extract::{Query, State},
    response::Response,
};
use reelstream_av::{process, transcode_source};
use reelstream_common::paths::is_video_file;
use reelstream_common::{Error, Result, StreamMode};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::direct::StreamQuery;
use super::responder::{SessionSource, StreamSession};
use super::sessions::NewSession;
use crate::server::{AppContext, AppError, ClientInfo};

/// Admission control for transcode sessions.
#[derive(Debug, Clone)]
pub struct TranscodeAdmission {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

impl TranscodeAdmission {
    pub fn new(limit: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    /// Claim a transcode slot without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Overloaded`] when every slot is taken.
    pub fn try_admit(&self) -> Result<OwnedSemaphorePermit> {
        self.semaphore.clone().try_acquire_owned().map_err(|_| {
            Error::Overloaded(format!("{} transcodes already running", self.limit))
        })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

/// Stream a live transcode of a media file.
///
/// `GET /api/stream/transcode?path=...`. Only video files are accepted; any
/// `Range` header is ignored.
pub async fn stream_transcode(
    State(ctx): State<AppContext>,
    Query(query): Query<StreamQuery>,
    client: ClientInfo,
) -> std::result::Result<Response, AppError> {
    let result: Result<Response> = async {
        let file = ctx.files.resolve(Path::new(&query.path)).await?;
        if !is_video_file(&file.path) {
            return Err(Error::invalid_input(format!(
                "{} is not a video file",
                query.path
            )));
        }
        let permit = ctx.admission.try_admit()?;

        let source = transcode_source(&ctx.transcode, &file.path);
        let ticket = ctx.sessions.register_session(NewSession {
            mode: StreamMode::Transcode,
            resource: query.path.clone(),
            client_ip: client.ip,
            user_agent: client.user_agent,
            range: None,
        });

        let cancel = ctx.shutdown.child_token();
        let handle = process::spawn_with_cancel(&source, &ctx.process_options, cancel.clone())?;
        ticket.set_pid(handle.pid());

        let session = StreamSession::new(
            ticket,
            cancel,
            SessionSource::Process {
                handle,
                permit: Some(permit),
            },
        );
        ctx.responder.respond(session)
    }
    .await;

    result.map_err(|e| ctx.reject(&query.path, e))
}
