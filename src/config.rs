//! Stream configuration.
//!
//! A [`StreamConfig`] picks the delimiter and how decoded lines are consumed.
//! Reading requires a consumption strategy up front: either one-shot reads
//! (`read_message`) or both callbacks. Anything else fails with
//! [`ConfigError::MissingHandler`] before a single byte can arrive.
//!
//! ```ignore
//! use jsonline::StreamConfig;
//!
//! let config = StreamConfig::new()
//!     .on_message(|value: serde_json::Value| println!("got {}", value))
//!     .on_decode_error(|err| eprintln!("bad line {:?}: {}", err.line(), err.reason()));
//! ```

use std::fmt;

use serde_json::Value;

use crate::error::{ConfigError, DecodeError};

/// Default line delimiter.
pub const DEFAULT_DELIMITER: &str = "\n";

/// Environment variable overriding the delimiter in [`StreamConfig::from_env`].
pub const DELIMITER_ENV: &str = "JSONLINE_DELIMITER";

/// Invoked once per successfully decoded line.
pub type MessageCallback<T> = Box<dyn FnMut(T) + Send>;

/// Invoked once per line that failed to decode.
pub type DecodeErrorCallback = Box<dyn FnMut(DecodeError) + Send>;

/// Delimiter and consumption strategy for a [`JsonLineStream`](crate::JsonLineStream).
pub struct StreamConfig<T = Value> {
    delimiter: String,
    readable: bool,
    one_shot: bool,
    max_line_length: Option<usize>,
    pub(crate) on_message: Option<MessageCallback<T>>,
    pub(crate) on_decode_error: Option<DecodeErrorCallback>,
}

impl<T> Default for StreamConfig<T> {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER.to_string(),
            readable: true,
            one_shot: false,
            max_line_length: None,
            on_message: None,
            on_decode_error: None,
        }
    }
}

impl<T> StreamConfig<T> {
    /// Newline-delimited, readable, no consumer yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Like [`new`](Self::new), but the delimiter may be overridden through
    /// `JSONLINE_DELIMITER`. The escapes `\n`, `\r`, `\t`, `\0` and `\\` are
    /// understood so `"\r\n"` can be given on a shell command line.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var(DELIMITER_ENV) {
            config.delimiter = unescape_delimiter(&raw);
        }
        config
    }

    /// Set the line delimiter. Must not be empty.
    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    /// Only write through this stream; incoming bytes are ignored.
    pub fn write_only(mut self) -> Self {
        self.readable = false;
        self
    }

    /// Consume lines through `read_message`. Lines arriving while no read is
    /// outstanding (and no callback is set) stay buffered until one is made.
    pub fn one_shot_reads(mut self) -> Self {
        self.one_shot = true;
        self
    }

    /// Drop lines longer than `max` bytes, reporting them as decode errors.
    pub fn max_line_length(mut self, max: usize) -> Self {
        self.max_line_length = Some(max);
        self
    }

    /// Register the success callback.
    pub fn on_message<F>(mut self, callback: F) -> Self
    where
        F: FnMut(T) + Send + 'static,
    {
        self.on_message = Some(Box::new(callback));
        self
    }

    /// Register the decode failure callback.
    pub fn on_decode_error<F>(mut self, callback: F) -> Self
    where
        F: FnMut(DecodeError) + Send + 'static,
    {
        self.on_decode_error = Some(Box::new(callback));
        self
    }

    pub fn get_delimiter(&self) -> &str {
        &self.delimiter
    }

    pub fn is_readable(&self) -> bool {
        self.readable
    }

    pub fn has_one_shot_reads(&self) -> bool {
        self.one_shot
    }

    pub fn get_max_line_length(&self) -> Option<usize> {
        self.max_line_length
    }

    /// Whether both callbacks are registered.
    pub fn has_callbacks(&self) -> bool {
        self.on_message.is_some() && self.on_decode_error.is_some()
    }

    /// Check the configuration without applying it.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::EmptyDelimiter`] if the delimiter is empty
    /// - [`ConfigError::MissingHandler`] if reading is enabled without
    ///   one-shot reads or both callbacks
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.delimiter.is_empty() {
            return Err(ConfigError::EmptyDelimiter);
        }
        if self.readable && !self.one_shot && !self.has_callbacks() {
            return Err(ConfigError::MissingHandler);
        }
        Ok(())
    }
}

impl<T> fmt::Debug for StreamConfig<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamConfig")
            .field("delimiter", &self.delimiter)
            .field("readable", &self.readable)
            .field("one_shot", &self.one_shot)
            .field("max_line_length", &self.max_line_length)
            .field("on_message", &self.on_message.is_some())
            .field("on_decode_error", &self.on_decode_error.is_some())
            .finish()
    }
}

fn unescape_delimiter(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
