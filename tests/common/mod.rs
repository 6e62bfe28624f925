//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which creates a temporary media root, a config
//! pointing at it, and a full [`AppContext`]. The [`TestHarness::with_server`]
//! constructor starts Axum on a random port for HTTP-level testing.
//! Transcode tests swap ffmpeg for a small shell script so they run without
//! ffmpeg installed.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reelstream::config::Config;
use reelstream::server::{create_router, AppContext};
use tempfile::TempDir;

/// Test harness wrapping a fully-constructed [`AppContext`].
pub struct TestHarness {
    pub ctx: AppContext,
    pub media: TempDir,
    tools: TempDir,
}

/// Knobs for the transcoder side of the harness.
pub struct TranscodeSetup {
    /// Body of the fake ffmpeg shell script; `None` leaves ffmpeg missing.
    pub script: Option<String>,
    pub max_concurrent: usize,
}

impl Default for TranscodeSetup {
    fn default() -> Self {
        Self {
            script: None,
            max_concurrent: 2,
        }
    }
}

impl TestHarness {
    /// Create a new harness with default configuration and no ffmpeg.
    pub fn new() -> Self {
        Self::with_transcode(TranscodeSetup::default())
    }

    /// Create a harness whose ffmpeg is the given shell script.
    pub fn with_fake_ffmpeg(script: &str) -> Self {
        Self::with_transcode(TranscodeSetup {
            script: Some(script.to_string()),
            ..TranscodeSetup::default()
        })
    }

    pub fn with_transcode(setup: TranscodeSetup) -> Self {
        let media = tempfile::tempdir().expect("failed to create media dir");
        let tools = tempfile::tempdir().expect("failed to create tools dir");

        let mut config = Config::default();
        config.library.roots = vec![media.path().to_path_buf()];
        config.transcode.max_concurrent = setup.max_concurrent;
        config.transcode.terminate_grace_secs = 2;
        config.transcode.ffmpeg_path = match setup.script {
            Some(script) => write_script(tools.path(), "ffmpeg", &script),
            None => tools.path().join("no-such-ffmpeg"),
        };

        let ctx = AppContext::new(config);
        Self { ctx, media, tools }
    }

    /// Start an Axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn with_server() -> (Self, SocketAddr) {
        let harness = Self::new();
        let addr = harness.spawn_server().await;
        (harness, addr)
    }

    /// Serve this harness's context on a random port.
    pub async fn spawn_server(&self) -> SocketAddr {
        let app = create_router(self.ctx.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .ok();
        });

        addr
    }

    /// Write a file into the media root and return its path.
    pub fn write_media(&self, name: &str, data: &[u8]) -> PathBuf {
        let path = self.media.path().join(name);
        std::fs::write(&path, data).expect("failed to write media file");
        path
    }
}

/// Deterministic, non-repeating-looking test payload.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31 + i / 7) % 256) as u8).collect()
}

/// `GET {endpoint}?path=...` on the server at `addr`.
pub fn stream_request(
    client: &reqwest::Client,
    addr: SocketAddr,
    endpoint: &str,
    path: &Path,
) -> reqwest::RequestBuilder {
    client
        .get(format!("http://{addr}/api/stream/{endpoint}"))
        .query(&[("path", path.to_string_lossy().to_string())])
}

/// Poll `check` until it returns true or `timeout` elapses.
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("failed to write script");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("failed to chmod script");
    }
    path
}
