//! HTTP `Range` header parsing.
//!
//! Only single byte ranges of the form `bytes=<start>-<end>?` are accepted.
//! Suffix ranges (`bytes=-500`) and multi-range requests are rejected, so a
//! parsed [`ByteRange`] always maps onto exactly one `Content-Range` window.

use serde::Serialize;

/// An inclusive `[start, end]` window of a resource's bytes.
///
/// Constructed only through [`parse`] or [`ByteRange::new`], both of which
/// guarantee `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ByteRange {
    start: u64,
    end: u64,
}

impl ByteRange {
    /// Create a range, returning `None` if `start > end`.
    pub fn new(start: u64, end: u64) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// First byte offset (inclusive).
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Last byte offset (inclusive).
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of bytes covered by the range.
    ///
    /// Saturates at `u64::MAX` for the full `0..=u64::MAX` window.
    pub fn length(&self) -> u64 {
        (self.end - self.start).saturating_add(1)
    }

    /// Render the `Content-Range` header value for a resource of `total_size`.
    pub fn content_range(&self, total_size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total_size)
    }
}

/// Why a `Range` header could not be turned into a [`ByteRange`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    /// No `Range` header was sent.
    #[error("Requires Range header")]
    MissingRange,

    /// The header is not of the form `bytes=<start>-<end>?`.
    #[error("Malformed Range header: {0}")]
    MalformedRange(String),

    /// The header is well-formed but cannot be satisfied.
    #[error("Invalid range: {0}")]
    InvalidRange(String),
}

/// Parse a `Range` header value against a resource of `total_size` bytes.
///
/// An `end` past the last byte is clamped to `total_size - 1`. An omitted
/// `end` means "to the end of the resource".
pub fn parse(header: Option<&str>, total_size: u64) -> Result<ByteRange, RangeError> {
    let header = header.ok_or(RangeError::MissingRange)?;
    let malformed = || RangeError::MalformedRange(header.to_string());

    let ranges = header.trim().strip_prefix("bytes=").ok_or_else(malformed)?;
    if ranges.contains(',') {
        return Err(malformed());
    }
    let (start_str, end_str) = ranges.split_once('-').ok_or_else(malformed)?;

    let start = parse_offset(start_str.trim(), "start")?;
    if start >= total_size {
        return Err(RangeError::InvalidRange(format!(
            "start {start} is beyond resource size {total_size}"
        )));
    }
    let last = total_size - 1;

    let end_str = end_str.trim();
    let end = if end_str.is_empty() {
        last
    } else {
        parse_offset(end_str, "end")?
    };
    if start > end {
        return Err(RangeError::InvalidRange(format!(
            "start {start} is after end {end}"
        )));
    }

    Ok(ByteRange {
        start,
        end: end.min(last),
    })
}

fn parse_offset(token: &str, which: &str) -> Result<u64, RangeError> {
    // `u64::from_str` accepts a leading '+', which is not valid in a range.
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RangeError::InvalidRange(format!(
            "{which} offset {token:?} is not a non-negative integer"
        )));
    }
    token
        .parse()
        .map_err(|_| RangeError::InvalidRange(format!("{which} offset {token} is out of range")))
}
