//! Transport plumbing around the framing core.
//!
//! The core only needs two things from a transport: somewhere to submit
//! outbound bytes ([`ByteSink`]) and someone to call
//! [`JsonLineStream::on_bytes_available`](crate::JsonLineStream::on_bytes_available)
//! when bytes arrive. This module provides both for common cases:
//!
//! ```text
//! ┌──────────────┐  submit_write   ┌──────────────┐  write_all+flush  ┌───────────┐
//! │ JsonLine     │ ──────────────► │ WriterSink   │ ────────────────► │ AsyncWrite│
//! │ Stream       │                 └──────────────┘                   └───────────┘
//! │              │ on_bytes_available  ┌──────┐        read            ┌───────────┐
//! │              │ ◄────────────────── │ pump │ ◄───────────────────── │ AsyncRead │
//! └──────────────┘                     └──────┘                        └───────────┘
//! ```
//!
//! [`MemorySink`] keeps frames in memory and lets the caller decide when a
//! flush is confirmed.

mod memory;
mod reader;
mod sink;
mod writer;

pub use memory::MemorySink;
pub use reader::{pump, read_next};
pub use sink::{ByteSink, FlushHandle, FlushSignal, WriteOptions};
pub use writer::WriterSink;
