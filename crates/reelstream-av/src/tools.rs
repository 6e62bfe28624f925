//! External tool detection.

use std::path::{Path, PathBuf};
use std::process::Command;

use reelstream_common::{Error, Result};
use serde::Serialize;

/// Information about an external tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    /// Name of the tool.
    pub name: String,
    /// Whether the tool is available.
    pub available: bool,
    /// Version string if available.
    pub version: Option<String>,
    /// Path to the tool executable.
    pub path: Option<PathBuf>,
}

/// Check if a tool is available using a custom version argument.
///
/// `program` may be a bare name looked up on `PATH` or an explicit path.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use reelstream_av::check_tool_with_arg;
///
/// let info = check_tool_with_arg(Path::new("ffmpeg"), "-version");
/// if info.available {
///     println!("ffmpeg version: {:?}", info.version);
/// }
/// ```
pub fn check_tool_with_arg(program: &Path, version_arg: &str) -> ToolInfo {
    let name = tool_name(program);
    let result = Command::new(program).arg(version_arg).output();

    match result {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .map(|s| s.to_string());

            ToolInfo {
                name,
                available: true,
                version,
                path: which::which(program).ok(),
            }
        }
        _ => ToolInfo {
            name,
            available: false,
            version: None,
            path: None,
        },
    }
}

/// Check every tool the streaming pipeline shells out to.
pub fn check_tools(ffmpeg: &Path) -> Vec<ToolInfo> {
    vec![check_tool_with_arg(ffmpeg, "-version")]
}

/// Require that a tool is available, returning its resolved path.
///
/// # Errors
///
/// Returns [`Error::Spawn`] if the tool cannot be found.
pub fn require_tool(program: &Path) -> Result<PathBuf> {
    which::which(program).map_err(|e| Error::spawn(tool_name(program), format!("not found: {e}")))
}

/// Short display name of a program path (`/usr/bin/ffmpeg` -> `ffmpeg`).
pub(crate) fn tool_name(program: &Path) -> String {
    program
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| program.to_string_lossy().to_string())
}
