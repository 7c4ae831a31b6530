//! jsonline - line-delimited JSON message framing.
//!
//! This library turns a raw duplex byte stream into discrete JSON messages
//! and back:
//!
//! - `stream` - the framing engine ([`JsonLineStream`]) and one-shot reads
//! - `config` - delimiter and consumption strategy ([`StreamConfig`])
//! - `codec` - the JSON encode/decode boundary
//! - `transport` - sink abstraction plus tokio and in-memory transports
//! - `error` - error types
//!
//! # Usage
//!
//! ```ignore
//! use jsonline::{pump, JsonLineStream, StreamConfig, WriteOptions, WriterSink};
//! use serde_json::json;
//!
//! let (read_half, write_half) = socket.into_split();
//! let mut lines = JsonLineStream::new(
//!     WriterSink::spawn(write_half),
//!     StreamConfig::new().one_shot_reads(),
//! )?;
//!
//! lines.write_message(&json!({"method": "ping"}), WriteOptions::default())?.await?;
//! let reply = lines.read_message()?;
//! pump(read_half, &mut lines).await?;
//! println!("{}", reply.await?);
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod stream;
pub mod transport;

pub use config::{StreamConfig, DEFAULT_DELIMITER};
pub use error::{ConfigError, DecodeError, EncodeError, StreamError};
pub use stream::{JsonLineStream, ReadHandle};
pub use transport::{
    pump, read_next, ByteSink, FlushHandle, MemorySink, WriteOptions, WriterSink,
};
