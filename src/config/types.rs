use reelstream_av::{ProcessOptions, TranscodeSettings};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub library: LibraryConfig,

    #[serde(default)]
    pub streaming: StreamingConfig,

    #[serde(default)]
    pub transcode: TranscodeConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Directories media may be served from.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LibraryConfig {
    /// Allowed roots. Requests for paths outside every root are answered
    /// with 404. An empty list serves nothing.
    #[serde(default)]
    pub roots: Vec<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamingConfig {
    /// Body chunk size in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_chunk_size() -> usize {
    64 * 1024
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscodeConfig {
    /// ffmpeg binary, looked up on PATH when not absolute.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Concurrent transcodes allowed before new requests get 503.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Seconds a transcoder gets to exit after SIGTERM before SIGKILL.
    #[serde(default = "default_terminate_grace")]
    pub terminate_grace_secs: u64,

    /// x264 speed preset (default: veryfast)
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Trailing stderr lines kept per transcoder.
    #[serde(default = "default_stderr_lines")]
    pub stderr_lines: usize,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}
fn default_max_concurrent() -> usize {
    2
}
fn default_terminate_grace() -> u64 {
    4
}
fn default_preset() -> String {
    "veryfast".to_string()
}
fn default_stderr_lines() -> usize {
    64
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            max_concurrent: default_max_concurrent(),
            terminate_grace_secs: default_terminate_grace(),
            preset: default_preset(),
            stderr_lines: default_stderr_lines(),
        }
    }
}

impl TranscodeConfig {
    pub fn settings(&self) -> TranscodeSettings {
        TranscodeSettings {
            ffmpeg: self.ffmpeg_path.clone(),
            preset: self.preset.clone(),
        }
    }

    pub fn process_options(&self) -> ProcessOptions {
        ProcessOptions {
            terminate_grace: Duration::from_secs(self.terminate_grace_secs),
            stderr_lines: self.stderr_lines,
        }
    }
}
