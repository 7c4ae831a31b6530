//! Line-delimited JSON stream.
//!
//! # Wire Format
//!
//! One compact JSON value per line, terminated by the configured delimiter
//! (default `\n`):
//!
//! ```text
//! {"data":"for","x":"event"}\n
//! ["the","data","here","café"]\n
//! ```
//!
//! # Consumption
//!
//! Each extracted line goes to exactly one consumer:
//!
//! 1. the outstanding one-shot read, if there is one
//! 2. otherwise `on_message` / `on_decode_error`
//! 3. otherwise (one-shot reads only) it stays buffered for the next read
//!
//! A malformed line is reported to its consumer and never stops later lines
//! from being processed.

mod buffer;
mod line_stream;
mod pending;

pub use line_stream::JsonLineStream;
pub use pending::ReadHandle;
