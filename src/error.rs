//! Error types for the framing layer.
//!
//! Each failure class surfaces through its own path:
//!
//! - [`ConfigError`] is returned synchronously from configuration calls.
//! - [`DecodeError`] is produced per malformed line and delivered to exactly
//!   one consumer (a pending read or the `on_decode_error` callback).
//! - [`EncodeError`] is returned synchronously from `write_message`.
//! - [`StreamError`] is what one-shot reads and flush handles resolve with.

use thiserror::Error;

/// Configuration was rejected; the previous configuration (if any) stays in effect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Reading is enabled but nothing would consume decoded lines.
    #[error("Missing handler: reading requires one-shot reads or both on_message and on_decode_error")]
    MissingHandler,

    /// The delimiter must contain at least one byte.
    #[error("Invalid delimiter: delimiter must not be empty")]
    EmptyDelimiter,
}

/// A line that could not be decoded.
///
/// Carries the decoder's reason and the offending line, verbatim, so both
/// callback and one-shot consumers can report what actually arrived.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Decode error: {reason} (line: {line:?})")]
pub struct DecodeError {
    reason: String,
    line: String,
}

impl DecodeError {
    pub fn new(reason: impl Into<String>, line: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            line: line.into(),
        }
    }

    /// Why decoding failed.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// The raw line, delimiter excluded. Invalid UTF-8 is replaced lossily.
    pub fn line(&self) -> &str {
        &self.line
    }

    /// Split into `(reason, line)`.
    pub fn into_parts(self) -> (String, String) {
        (self.reason, self.line)
    }
}

/// A value could not be turned into a frame. Nothing was written.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The serializer rejected the value (e.g. a map with non-string keys).
    #[error("Encode error: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The serialized payload contains the delimiter and would split on the wire.
    #[error("Encode error: serialized payload contains delimiter {delimiter:?}")]
    DelimiterInPayload {
        /// The configured delimiter.
        delimiter: String,
    },
}

impl From<serde_json::Error> for EncodeError {
    fn from(err: serde_json::Error) -> Self {
        EncodeError::Serialize(err)
    }
}

/// Failures surfaced through one-shot reads and flush handles.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The next line was malformed.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The transport failed; passed through uninterpreted.
    #[error("Transport error: {0}")]
    Transport(#[source] std::io::Error),

    /// A one-shot read is already outstanding on this stream.
    #[error("Read in progress: a one-shot read is already pending")]
    ReadInProgress,

    /// The stream was not configured for reading.
    #[error("Not readable: stream was configured without reading")]
    NotReadable,

    /// End of stream was reached before a complete line arrived,
    /// or the other side of a handle went away.
    #[error("Stream closed")]
    Closed,
}

impl StreamError {
    /// Fixed operation category, so callers can tell decode failures apart
    /// from other stream failures without matching on variants.
    pub fn category(&self) -> &'static str {
        match self {
            StreamError::Decode(_) => "decode",
            StreamError::Transport(_) => "transport",
            StreamError::ReadInProgress => "busy",
            StreamError::NotReadable => "config",
            StreamError::Closed => "closed",
        }
    }

    /// The decode payload, if this is a decode failure.
    pub fn as_decode(&self) -> Option<&DecodeError> {
        match self {
            StreamError::Decode(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StreamError {
    fn from(err: std::io::Error) -> Self {
        StreamError::Transport(err)
    }
}
