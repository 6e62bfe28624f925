//! Reelstream-Common: Shared types, constants, and utilities.
//!
//! This crate provides the pieces of the streaming core that do no I/O of
//! their own:
//!
//! - **Byte ranges**: [`ByteRange`] and the `Range` header parser
//! - **Media sources**: [`MediaSource`] describing file or process byte sources
//! - **Path utilities**: content-type mapping and the allowed-root guard
//! - **Diagnostics**: [`StreamEvent`] and the injectable [`DiagnosticSink`]
//! - **Error handling**: the shared [`Error`] type and result alias
//!
//! # Examples
//!
//! ```
//! use reelstream_common::range;
//!
//! let window = range::parse(Some("bytes=0-99"), 1000).unwrap();
//! assert_eq!(window.start(), 0);
//! assert_eq!(window.end(), 99);
//! assert_eq!(window.length(), 100);
//! ```

pub mod diagnostics;
pub mod error;
pub mod paths;
pub mod range;
pub mod source;

pub use diagnostics::{
    AbortReason, DiagnosticSink, EventLog, RecordedEvent, StreamEvent, StreamMode, TracingSink,
};
pub use error::{Error, Result};
pub use range::{ByteRange, RangeError};
pub use source::MediaSource;
