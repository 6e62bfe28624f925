//! Direct streaming with HTTP range requests.
//!
//! Serves an exact byte window of a file on disk. A `Range` header is
//! mandatory; the response is always 206 Partial Content.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap},
    response::Response,
};
use reelstream_common::paths::{content_type_for, AllowedRoots};
use reelstream_common::range::{self, RangeError};
use reelstream_common::{ByteRange, Error, MediaSource, Result, StreamMode};
use serde::Deserialize;
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, ReadBuf, Take};

use super::responder::{SessionSource, StreamSession};
use super::sessions::NewSession;
use crate::server::{AppContext, AppError, ClientInfo};

/// Query string accepted by the streaming endpoints.
#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    /// Path of the media file, inside one of the configured roots.
    pub path: String,
}

/// A file that passed the root check and was stat'd.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    /// Canonical path.
    pub path: PathBuf,
    /// Size in bytes at stat time.
    pub size: u64,
}

impl ResolvedFile {
    pub fn content_type(&self) -> &'static str {
        content_type_for(&self.path)
    }

    pub fn source(&self) -> MediaSource {
        MediaSource::File {
            path: self.path.clone(),
            size: self.size,
        }
    }
}

/// Resolves requested paths against the allowed roots and opens bounded
/// readers over them.
#[derive(Debug, Clone)]
pub struct FileRangeServer {
    roots: Arc<AllowedRoots>,
}

impl FileRangeServer {
    pub fn new(roots: AllowedRoots) -> Self {
        Self {
            roots: Arc::new(roots),
        }
    }

    pub fn roots(&self) -> &AllowedRoots {
        &self.roots
    }

    /// Canonicalize `requested`, check it against the roots and stat it.
    ///
    /// Anything that is not a readable regular file under a root is
    /// [`Error::NotFound`].
    pub async fn resolve(&self, requested: &Path) -> Result<ResolvedFile> {
        let roots = self.roots.clone();
        let requested_owned = requested.to_path_buf();
        let path = tokio::task::spawn_blocking(move || roots.resolve(&requested_owned))
            .await
            .map_err(|e| Error::Internal(format!("path resolution task failed: {e}")))??;

        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|_| Error::not_found("file", requested.display()))?;
        if !metadata.is_file() {
            return Err(Error::not_found("file", requested.display()));
        }

        Ok(ResolvedFile {
            path,
            size: metadata.len(),
        })
    }

    /// Open `file` positioned at `range.start`, yielding exactly
    /// `range.length()` bytes.
    pub async fn open(&self, file: &ResolvedFile, range: ByteRange) -> Result<BoundedReader> {
        if range.end() >= file.size {
            return Err(RangeError::InvalidRange(format!(
                "end {} is beyond resource size {}",
                range.end(),
                file.size
            ))
            .into());
        }

        let mut handle = File::open(&file.path)
            .await
            .map_err(|_| Error::not_found("file", file.path.display()))?;
        handle.seek(SeekFrom::Start(range.start())).await?;

        Ok(BoundedReader {
            inner: handle.take(range.length()),
            range,
        })
    }
}

/// Read cursor over one byte window of a file.
///
/// Yields exactly the window's bytes, then EOF. If the file ends early
/// (truncated while being served) the read fails with `UnexpectedEof`
/// instead of silently short-changing the declared `Content-Length`. The
/// descriptor is closed when the reader is dropped.
#[derive(Debug)]
pub struct BoundedReader {
    inner: Take<File>,
    range: ByteRange,
}

impl BoundedReader {
    pub fn range(&self) -> ByteRange {
        self.range
    }

    /// Bytes not yet read.
    pub fn remaining(&self) -> u64 {
        self.inner.limit()
    }
}

impl AsyncRead for BoundedReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;

        let remaining = this.inner.limit();
        if buf.filled().len() == before && buf.remaining() > 0 && remaining > 0 {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("file ended {remaining} bytes before the end of the range"),
            )));
        }
        Poll::Ready(Ok(()))
    }
}

fn range_header(headers: &HeaderMap) -> Result<Option<&str>> {
    match headers.get(header::RANGE) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map(Some)
            .map_err(|_| RangeError::MalformedRange("non-ASCII Range header".into()).into()),
    }
}

/// Serve a byte window of a media file.
///
/// `GET /api/stream/direct?path=...` with a mandatory `Range` header.
pub async fn stream_direct(
    State(ctx): State<AppContext>,
    Query(query): Query<StreamQuery>,
    client: ClientInfo,
    headers: HeaderMap,
) -> std::result::Result<Response, AppError> {
    let result: Result<Response> = async {
        let file = ctx.files.resolve(Path::new(&query.path)).await?;
        let range = range::parse(range_header(&headers)?, file.size)?;
        let reader = ctx.files.open(&file, range).await?;

        let ticket = ctx.sessions.register_session(NewSession {
            mode: StreamMode::Direct,
            resource: query.path.clone(),
            client_ip: client.ip,
            user_agent: client.user_agent,
            range: Some(range),
        });
        let session = StreamSession::new(
            ticket,
            ctx.shutdown.child_token(),
            SessionSource::File {
                reader,
                total_size: file.size,
                content_type: file.content_type(),
            },
        );
        ctx.responder.respond(session)
    }
    .await;

    result.map_err(|e| ctx.reject(&query.path, e))
}
