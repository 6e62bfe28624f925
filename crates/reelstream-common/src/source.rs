//! Byte source descriptions.

use std::path::{Path, PathBuf};

/// Identifies the bytes a streaming session serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    /// A file on disk whose size was resolved by a stat call.
    File {
        /// Canonical path of the file.
        path: PathBuf,
        /// Size in bytes at the time of the stat.
        size: u64,
    },
    /// The standard output of an external process. Its length is unknown
    /// until the process exits.
    Process {
        /// Program to execute.
        command: PathBuf,
        /// Arguments passed to the program.
        args: Vec<String>,
        /// The media file the process reads from.
        input: PathBuf,
    },
}

impl MediaSource {
    /// Total length of the source, if it is known ahead of time.
    pub fn known_size(&self) -> Option<u64> {
        match self {
            MediaSource::File { size, .. } => Some(*size),
            MediaSource::Process { .. } => None,
        }
    }

    /// The media file backing this source.
    pub fn input_path(&self) -> &Path {
        match self {
            MediaSource::File { path, .. } => path,
            MediaSource::Process { input, .. } => input,
        }
    }
}
