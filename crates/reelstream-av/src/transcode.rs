//! The live transcode invocation.
//!
//! Output is H.264/AAC in fragmented MP4 written to stdout. `frag_keyframe`
//! together with `empty_moov` lets a player start decoding before the
//! transcoder finishes, which is what makes the output streamable over a
//! chunked response.

use std::path::{Path, PathBuf};

use reelstream_common::MediaSource;
use serde::{Deserialize, Serialize};

/// x264 speed presets accepted by `-preset`.
pub const X264_PRESETS: &[&str] = &[
    "ultrafast",
    "superfast",
    "veryfast",
    "faster",
    "fast",
    "medium",
    "slow",
    "slower",
    "veryslow",
    "placebo",
];

/// Which transcoder to run and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscodeSettings {
    /// Path or name of the ffmpeg binary.
    pub ffmpeg: PathBuf,
    /// x264 speed preset.
    pub preset: String,
}

impl Default for TranscodeSettings {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            preset: "veryfast".to_string(),
        }
    }
}

/// Whether `preset` names a known x264 preset.
pub fn is_valid_preset(preset: &str) -> bool {
    X264_PRESETS.contains(&preset)
}

/// Build the ffmpeg argument list for streaming `input` as fragmented MP4.
pub fn transcode_args(input: &Path, preset: &str) -> Vec<String> {
    let mut args: Vec<String> = Vec::with_capacity(16);
    args.extend(["-hide_banner".into(), "-nostdin".into(), "-nostats".into()]);
    args.extend(["-i".into(), input.to_string_lossy().to_string()]);
    args.extend(["-c:v".into(), "libx264".into()]);
    args.extend(["-c:a".into(), "aac".into()]);
    args.extend(["-movflags".into(), "frag_keyframe+empty_moov".into()]);
    args.extend(["-f".into(), "mp4".into()]);
    args.extend(["-preset".into(), preset.to_string()]);
    args.extend(["-max_muxing_queue_size".into(), "1024".into()]);
    args.push("pipe:1".into());
    args
}

/// Describe the transcoder process for `input` as a [`MediaSource`].
pub fn transcode_source(settings: &TranscodeSettings, input: &Path) -> MediaSource {
    MediaSource::Process {
        command: settings.ffmpeg.clone(),
        args: transcode_args(input, &settings.preset),
        input: input.to_path_buf(),
    }
}
