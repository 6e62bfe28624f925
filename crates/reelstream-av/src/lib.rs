//! # reelstream-av
//!
//! Transcoder plumbing for reelstream.
//!
//! This crate provides:
//! - Discovery of the external `ffmpeg` binary ([`tools`])
//! - The fragmented-MP4 transcode invocation ([`transcode`])
//! - Supervision of a running transcoder: stdout handed to the caller,
//!   stderr drained in the background, graceful-then-forced termination
//!   ([`process`])
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use reelstream_av::{process, transcode_source, ProcessOptions, TranscodeSettings};
//!
//! # async fn example() -> reelstream_common::Result<()> {
//! let source = transcode_source(&TranscodeSettings::default(), Path::new("/media/movie.mkv"));
//! let mut handle = process::spawn(&source, &ProcessOptions::default())?;
//! let stdout = handle.take_stdout();
//! // ... forward stdout to the client ...
//! let exit = handle.terminate().await;
//! println!("transcoder finished: {exit}");
//! # drop(stdout);
//! # Ok(())
//! # }
//! ```

pub mod process;
pub mod tools;
pub mod transcode;

pub use process::{ProcessExit, ProcessHandle, ProcessOptions, StderrLog};
pub use tools::{check_tool_with_arg, check_tools, require_tool, ToolInfo};
pub use transcode::{transcode_args, transcode_source, TranscodeSettings};
