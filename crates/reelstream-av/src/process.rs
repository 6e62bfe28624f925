//! Supervision of a running transcoder.
//!
//! [`spawn`] starts the process described by a [`MediaSource::Process`] and
//! returns a [`ProcessHandle`]. The handle owns the child's stdout until the
//! caller takes it; everything else about the child lives in background
//! tasks:
//!
//! - a drain task reads stderr line by line into a bounded [`StderrLog`], so
//!   a chatty transcoder can never block on a full stderr pipe;
//! - a supervisor task owns the [`Child`], reaps it when it exits, and on
//!   cancellation sends SIGTERM, waits out the grace period, then kills.
//!
//! The exit result is published once on a watch channel, so any number of
//! callers can [`ProcessHandle::wait`] for it. Dropping the handle cancels
//! the supervisor, which means an abandoned handle still terminates and
//! reaps its process.

use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reelstream_common::{Error, MediaSource, Result};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::tools::tool_name;

/// Default time a transcoder gets to exit after SIGTERM.
pub const DEFAULT_TERMINATE_GRACE: Duration = Duration::from_secs(4);

/// Default number of stderr lines retained per process.
pub const DEFAULT_STDERR_LINES: usize = 64;

/// Longest stderr line kept; the rest of an overlong line is dropped.
pub const MAX_STDERR_LINE_BYTES: usize = 1024;

/// Knobs for a supervised process.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    /// How long to wait after SIGTERM before killing.
    pub terminate_grace: Duration,
    /// How many trailing stderr lines to keep.
    pub stderr_lines: usize,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            terminate_grace: DEFAULT_TERMINATE_GRACE,
            stderr_lines: DEFAULT_STDERR_LINES,
        }
    }
}

/// How a supervised process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExit {
    /// The process exited on its own.
    Exited(ExitStatus),
    /// The process exited within the grace period after SIGTERM.
    Terminated,
    /// The process ignored SIGTERM and was killed.
    Killed,
    /// The exit status could not be collected.
    Lost,
}

impl ProcessExit {
    /// Whether the process ran to completion successfully.
    pub fn success(&self) -> bool {
        matches!(self, ProcessExit::Exited(status) if status.success())
    }
}

impl fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessExit::Exited(status) => write!(f, "{status}"),
            ProcessExit::Terminated => write!(f, "terminated"),
            ProcessExit::Killed => write!(f, "killed after grace period"),
            ProcessExit::Lost => write!(f, "exit status unavailable"),
        }
    }
}

/// The trailing lines a process wrote to stderr.
#[derive(Debug)]
pub struct StderrLog {
    lines: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl StderrLog {
    fn new(capacity: usize) -> Self {
        Self {
            lines: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    fn push(&self, line: String) {
        if self.capacity == 0 {
            return;
        }
        let mut lines = self.lines.lock();
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    /// Retained lines, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().iter().cloned().collect()
    }

    /// The most recent line, if any.
    pub fn last(&self) -> Option<String> {
        self.lines.lock().back().cloned()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }
}

/// A running (or finished) supervised process.
#[derive(Debug)]
pub struct ProcessHandle {
    pid: Option<u32>,
    tool: String,
    input: PathBuf,
    stdout: Option<ChildStdout>,
    stderr: Arc<StderrLog>,
    exit: watch::Receiver<Option<ProcessExit>>,
    cancel: CancellationToken,
}

impl ProcessHandle {
    /// OS process id, if the process was still running when spawned.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Display name of the program.
    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// The media file the process reads.
    pub fn input(&self) -> &Path {
        &self.input
    }

    /// Take ownership of the process's stdout. Returns `None` after the
    /// first call.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.stdout.take()
    }

    /// The process's retained stderr.
    pub fn stderr_log(&self) -> Arc<StderrLog> {
        self.stderr.clone()
    }

    /// The exit result, if the process has already been reaped.
    pub fn exit_status(&self) -> Option<ProcessExit> {
        *self.exit.borrow()
    }

    /// Wait until the process has been reaped.
    pub async fn wait(&self) -> ProcessExit {
        let mut rx = self.exit.clone();
        let exit = match rx.wait_for(|exit| exit.is_some()).await {
            Ok(exit) => (*exit).unwrap_or(ProcessExit::Lost),
            Err(_) => ProcessExit::Lost,
        };
        exit
    }

    /// Ask the process to stop and wait until it has been reaped.
    ///
    /// Sends SIGTERM, then kills after the grace period. Calling this on a
    /// process that already exited returns its recorded exit.
    pub async fn terminate(&self) -> ProcessExit {
        self.cancel.cancel();
        self.wait().await
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Spawn the process described by `source`.
///
/// # Errors
///
/// Returns [`Error::Spawn`] if `source` is not a process or the program
/// cannot be started.
pub fn spawn(source: &MediaSource, options: &ProcessOptions) -> Result<ProcessHandle> {
    spawn_with_cancel(source, options, CancellationToken::new())
}

/// Like [`spawn`], but the process is also terminated when `cancel` fires.
pub fn spawn_with_cancel(
    source: &MediaSource,
    options: &ProcessOptions,
    cancel: CancellationToken,
) -> Result<ProcessHandle> {
    let MediaSource::Process {
        command,
        args,
        input,
    } = source
    else {
        return Err(Error::spawn(
            "process",
            format!("{} is a file source", source.input_path().display()),
        ));
    };
    let tool = tool_name(command);

    let mut child = Command::new(command)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Error::spawn(&tool, format!("failed to spawn: {e}")))?;

    let pid = child.id();
    tracing::debug!(tool = %tool, pid = ?pid, input = %input.display(), "Spawned process");

    let stdout = child.stdout.take();
    let stderr = Arc::new(StderrLog::new(options.stderr_lines));
    if let Some(pipe) = child.stderr.take() {
        tokio::spawn(drain_stderr(pipe, stderr.clone(), tool.clone(), pid));
    }

    let (tx, rx) = watch::channel(None);
    tokio::spawn(supervise(
        child,
        cancel.clone(),
        options.terminate_grace,
        tx,
        tool.clone(),
    ));

    Ok(ProcessHandle {
        pid,
        tool,
        input: input.clone(),
        stdout,
        stderr,
        exit: rx,
        cancel,
    })
}

async fn drain_stderr(mut pipe: ChildStderr, log: Arc<StderrLog>, tool: String, pid: Option<u32>) {
    // ffmpeg ends progress updates with a bare '\r', so both count as line ends.
    let mut chunk = [0u8; 4096];
    let mut line = Vec::with_capacity(256);
    loop {
        let n = match pipe.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::debug!(tool = %tool, pid = ?pid, "stderr read failed: {e}");
                break;
            }
        };
        for &byte in &chunk[..n] {
            match byte {
                b'\n' | b'\r' => flush_line(&mut line, &log, &tool, pid),
                _ if line.len() < MAX_STDERR_LINE_BYTES => line.push(byte),
                _ => {}
            }
        }
    }
    flush_line(&mut line, &log, &tool, pid);
}

fn flush_line(line: &mut Vec<u8>, log: &StderrLog, tool: &str, pid: Option<u32>) {
    let text = String::from_utf8_lossy(line).trim_end().to_string();
    line.clear();
    if text.is_empty() {
        return;
    }
    tracing::debug!(tool = %tool, pid = ?pid, "{text}");
    log.push(text);
}

async fn supervise(
    mut child: Child,
    cancel: CancellationToken,
    grace: Duration,
    tx: watch::Sender<Option<ProcessExit>>,
    tool: String,
) {
    let pid = child.id();
    let exit = tokio::select! {
        status = child.wait() => match status {
            Ok(status) => ProcessExit::Exited(status),
            Err(e) => {
                tracing::warn!(tool = %tool, pid = ?pid, "Failed to wait for process: {e}");
                ProcessExit::Lost
            }
        },
        _ = cancel.cancelled() => terminate_child(&mut child, grace, &tool).await,
    };

    tracing::debug!(tool = %tool, pid = ?pid, exit = %exit, "Process reaped");
    tx.send_replace(Some(exit));
}

async fn terminate_child(child: &mut Child, grace: Duration, tool: &str) -> ProcessExit {
    if let Ok(Some(status)) = child.try_wait() {
        return ProcessExit::Exited(status);
    }
    let pid = child.id();

    send_terminate(child);
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(_)) => ProcessExit::Terminated,
        Ok(Err(e)) => {
            tracing::warn!(tool = %tool, pid = ?pid, "Failed to wait for process: {e}");
            ProcessExit::Lost
        }
        Err(_) => {
            tracing::warn!(
                tool = %tool,
                pid = ?pid,
                grace_ms = grace.as_millis() as u64,
                "Process ignored SIGTERM, killing"
            );
            match child.kill().await {
                Ok(()) => ProcessExit::Killed,
                Err(e) => {
                    tracing::warn!(tool = %tool, pid = ?pid, "Failed to kill process: {e}");
                    ProcessExit::Lost
                }
            }
        }
    }
}

#[cfg(unix)]
fn send_terminate(child: &mut Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return;
    };
    if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        tracing::debug!(pid, "SIGTERM failed ({e}), killing instead");
        let _ = child.start_kill();
    }
}

#[cfg(not(unix))]
fn send_terminate(child: &mut Child) {
    let _ = child.start_kill();
}
