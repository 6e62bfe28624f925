//! Unified error type for the streaming core.
//!
//! Every failure a streaming request can hit funnels into [`Error`], which
//! carries enough context for the HTTP layer to derive a status code via
//! [`Error::http_status`]. Errors raised after response headers are committed
//! can no longer change the status; the responder only logs them and closes
//! the transport.

use std::fmt;

use crate::range::RangeError;

/// Error type covering all failure modes of the streaming pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The `Range` header was missing, malformed, or unsatisfiable.
    #[error(transparent)]
    Range(#[from] RangeError),

    /// The requested resource could not be stat'd, opened, or lies outside
    /// the allowed roots.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of resource (e.g. "file").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// Request data failed validation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The transcoder could not be started.
    #[error("Failed to spawn {tool}: {message}")]
    Spawn {
        /// Name of the tool that failed to start.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// The transcoder exited unsuccessfully while its output was being served.
    #[error("Upstream failure [{tool}]: {message}")]
    UpstreamFailure {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// Admission control rejected the request.
    #[error("Overloaded: {0}")]
    Overloaded(String),

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::Range(_) => 400,
            Error::NotFound { .. } => 404,
            Error::InvalidInput(_) => 400,
            Error::Io { .. } => 500,
            Error::Spawn { .. } => 500,
            Error::UpstreamFailure { .. } => 502,
            Error::Overloaded(_) => 503,
            Error::Internal(_) => 500,
        }
    }

    /// Short machine-readable code for API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Range(RangeError::MissingRange) => "missing_range",
            Error::Range(RangeError::MalformedRange(_)) => "malformed_range",
            Error::Range(RangeError::InvalidRange(_)) => "invalid_range",
            Error::NotFound { .. } => "not_found",
            Error::InvalidInput(_) => "invalid_input",
            Error::Io { .. } => "io_error",
            Error::Spawn { .. } => "spawn_error",
            Error::UpstreamFailure { .. } => "upstream_failure",
            Error::Overloaded(_) => "overloaded",
            Error::Internal(_) => "internal_error",
        }
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::InvalidInput`].
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Convenience constructor for [`Error::Spawn`].
    pub fn spawn(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Spawn {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::UpstreamFailure`].
    pub fn upstream(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::UpstreamFailure {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
