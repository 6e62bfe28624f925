//! Path utilities: content-type mapping and the allowed-root guard.
//!
//! Resource paths arrive straight from a query parameter, so every path is
//! canonicalized and checked against [`AllowedRoots`] before it is stat'd or
//! opened. A path outside every root is reported as not found.

use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// List of supported video file extensions.
const VIDEO_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "m4v", "ts", "webm", "mov", "wmv", "flv",
];

/// Content type used for extensions with no explicit mapping.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Content type announced for transcoded output.
pub const TRANSCODE_CONTENT_TYPE: &str = "video/mp4";

/// Check if a path has a video file extension.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use reelstream_common::paths::is_video_file;
///
/// assert!(is_video_file(Path::new("movie.mkv")));
/// assert!(is_video_file(Path::new("/path/to/video.MP4")));
/// assert!(!is_video_file(Path::new("subtitle.srt")));
/// ```
pub fn is_video_file(path: &Path) -> bool {
    extension(path)
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Guess the MIME type of a file from its extension.
pub fn content_type_for(path: &Path) -> &'static str {
    match extension(path).as_deref() {
        Some("mp4" | "m4v") => "video/mp4",
        Some("mkv") => "video/x-matroska",
        Some("webm") => "video/webm",
        Some("avi") => "video/x-msvideo",
        Some("mov") => "video/quicktime",
        Some("ts" | "m2ts") => "video/mp2t",
        Some("wmv") => "video/x-ms-wmv",
        Some("flv") => "video/x-flv",
        Some("m4a") => "audio/mp4",
        Some("mp3") => "audio/mpeg",
        Some("flac") => "audio/flac",
        Some("wav") => "audio/wav",
        _ => DEFAULT_CONTENT_TYPE,
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// The set of directories resources may be served from.
#[derive(Debug, Clone, Default)]
pub struct AllowedRoots {
    roots: Vec<PathBuf>,
}

impl AllowedRoots {
    /// Canonicalize the given roots, dropping (and logging) any that do not
    /// exist. An empty set allows nothing.
    pub fn new(roots: impl IntoIterator<Item = PathBuf>) -> Self {
        let roots = roots
            .into_iter()
            .filter_map(|root| match std::fs::canonicalize(&root) {
                Ok(canonical) => Some(canonical),
                Err(e) => {
                    tracing::warn!(root = %root.display(), "Ignoring media root: {e}");
                    None
                }
            })
            .collect();
        Self { roots }
    }

    /// The canonicalized roots.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Whether an already-canonicalized path lies under one of the roots.
    pub fn contains(&self, canonical: &Path) -> bool {
        self.roots.iter().any(|root| canonical.starts_with(root))
    }

    /// Canonicalize `requested` and verify it lies under an allowed root.
    ///
    /// Missing files, unreadable paths, and paths outside the roots all
    /// produce the same [`Error::NotFound`] so callers learn nothing about
    /// the filesystem layout.
    pub fn resolve(&self, requested: &Path) -> Result<PathBuf> {
        let canonical = std::fs::canonicalize(requested)
            .map_err(|_| Error::not_found("file", requested.display()))?;
        if self.contains(&canonical) {
            Ok(canonical)
        } else {
            tracing::debug!(
                requested = %requested.display(),
                "Rejected path outside media roots"
            );
            Err(Error::not_found("file", requested.display()))
        }
    }
}
