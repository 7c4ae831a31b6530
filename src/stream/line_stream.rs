//! The framing engine: read path, dispatch and write path.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::buffer::{Extracted, LineBuffer};
use super::pending::{Outcome, PendingSlot, ReadHandle};
use crate::codec;
use crate::config::StreamConfig;
use crate::error::{ConfigError, DecodeError, EncodeError, StreamError};
use crate::transport::{ByteSink, FlushHandle};

/// Who receives the outcome of the next extracted line.
enum Destination<T> {
    /// `on_message` / `on_decode_error`.
    Callback,
    /// The outstanding one-shot read, taken out of its slot.
    Pending(oneshot::Sender<Outcome<T>>),
    /// Nobody: the line stays buffered.
    Retain,
}

/// Line-delimited JSON messages over a byte sink and a stream of incoming chunks.
///
/// The stream is driven from outside: the transport calls
/// [`on_bytes_available`](Self::on_bytes_available) whenever bytes arrive,
/// and every complete line is decoded and dispatched before the call
/// returns. A one-shot read, if outstanding, takes the next line; otherwise
/// the callbacks do. With one-shot reads only, lines that arrive while no
/// read is outstanding stay buffered until the next
/// [`read_message`](Self::read_message).
///
/// # Example
///
/// ```ignore
/// use jsonline::{JsonLineStream, MemorySink, StreamConfig, WriteOptions};
///
/// let mut lines = JsonLineStream::new(MemorySink::auto_flush(), StreamConfig::new().one_shot_reads())?;
/// let mut next = lines.read_message()?;
/// lines.on_bytes_available(b"{\"data\":\"for\"}\n", false);
/// assert!(next.try_take().is_some());
///
/// lines.write_message(&["the", "data"], WriteOptions::default())?;
/// ```
pub struct JsonLineStream<S, T = Value> {
    sink: S,
    config: StreamConfig<T>,
    delimiter: Vec<u8>,
    buffer: LineBuffer,
    pending: PendingSlot<T>,
    ended: bool,
}

impl<S, T> JsonLineStream<S, T>
where
    S: ByteSink,
    T: DeserializeOwned,
{
    /// Create a stream writing to `sink`.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] from [`StreamConfig::validate`].
    pub fn new(sink: S, config: StreamConfig<T>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            sink,
            delimiter: config.get_delimiter().as_bytes().to_vec(),
            config,
            buffer: LineBuffer::new(),
            pending: PendingSlot::default(),
            ended: false,
        })
    }

    /// Replace the configuration.
    ///
    /// Buffered bytes are kept and rescanned with the new delimiter and
    /// consumers. On error the current configuration stays in effect.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] from [`StreamConfig::validate`].
    pub fn reconfigure(&mut self, config: StreamConfig<T>) -> Result<(), ConfigError> {
        config.validate()?;
        debug!("Reconfiguring stream: {:?}", config);

        self.delimiter = config.get_delimiter().as_bytes().to_vec();
        self.config = config;
        self.buffer.reset_scan();

        if !self.config.is_readable() {
            if let Some(sender) = self.pending.take() {
                let _ = sender.send(Err(StreamError::NotReadable));
            }
            return Ok(());
        }

        self.drain();
        Ok(())
    }

    pub fn delimiter(&self) -> &str {
        self.config.get_delimiter()
    }

    /// Bytes received but not yet consumed as lines.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether end of stream has been signalled.
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Whether a one-shot read is outstanding.
    pub fn has_pending_read(&mut self) -> bool {
        self.pending.is_live()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Feed bytes from the transport.
    ///
    /// Every complete line is decoded and dispatched before this returns.
    /// With `end_of_stream` set, `chunk` is processed first, then any
    /// trailing undelimited bytes are discarded (never decoded) and an
    /// outstanding one-shot read fails with [`StreamError::Closed`].
    ///
    /// Returns the number of bytes taken into the buffer: the whole chunk,
    /// or 0 if the stream is write-only or already ended.
    pub fn on_bytes_available(&mut self, chunk: &[u8], end_of_stream: bool) -> usize {
        if self.ended {
            if !chunk.is_empty() {
                warn!("Ignoring {} bytes after end of stream", chunk.len());
            }
            return 0;
        }
        if !self.config.is_readable() {
            if end_of_stream {
                self.ended = true;
            }
            return 0;
        }

        self.buffer.extend(chunk);
        let dispatched = self.drain();
        if dispatched > 0 {
            debug!("Dispatched {} line(s), {} bytes buffered", dispatched, self.buffer.len());
        }

        if end_of_stream {
            self.finish();
        }
        chunk.len()
    }

    /// Claim the outcome of the next line.
    ///
    /// If a complete line is already buffered the handle resolves before this
    /// returns. No bytes are read from the transport; the handle resolves as
    /// bytes are fed in through [`on_bytes_available`](Self::on_bytes_available).
    ///
    /// # Errors
    ///
    /// - [`StreamError::ReadInProgress`] if another read is outstanding
    /// - [`StreamError::NotReadable`] if the stream is write-only
    pub fn read_message(&mut self) -> Result<ReadHandle<T>, StreamError> {
        if !self.config.is_readable() {
            return Err(StreamError::NotReadable);
        }

        let handle = self.pending.claim()?;
        self.drain();

        if self.ended {
            if let Some(sender) = self.pending.take() {
                let _ = sender.send(Err(StreamError::Closed));
            }
        }
        Ok(handle)
    }

    /// Encode `value` as one line and submit it to the sink.
    ///
    /// `options` are passed to the sink untouched. The returned handle
    /// completes once the sink confirms the bytes were flushed.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError`] if `value` cannot be serialized or its encoding
    /// contains the delimiter. Nothing is written in that case.
    pub fn write_message<V>(&mut self, value: &V, options: S::Options) -> Result<FlushHandle, EncodeError>
    where
        V: Serialize + ?Sized,
    {
        let frame = codec::encode_line(value, &self.delimiter)?;
        debug!("Submitting {} byte frame", frame.len());
        Ok(self.sink.submit_write(Bytes::from(frame), options))
    }

    /// Extract and dispatch lines until none is left or nobody wants the next one.
    fn drain(&mut self) -> usize {
        let mut dispatched = 0;
        loop {
            match self.destination() {
                Destination::Retain => break,
                Destination::Callback => {
                    let Some(outcome) = self.next_outcome() else {
                        break;
                    };
                    self.notify(outcome);
                }
                Destination::Pending(sender) => {
                    let Some(outcome) = self.next_outcome() else {
                        self.pending.restore(sender);
                        break;
                    };
                    self.resolve_pending(sender, outcome);
                }
            }
            dispatched += 1;
        }
        dispatched
    }

    /// A live one-shot read wins over the callbacks.
    fn destination(&mut self) -> Destination<T> {
        if let Some(sender) = self.pending.take() {
            Destination::Pending(sender)
        } else if self.config.has_callbacks() {
            Destination::Callback
        } else {
            Destination::Retain
        }
    }

    fn next_outcome(&mut self) -> Option<Outcome<T>> {
        let max = self.config.get_max_line_length();
        let outcome = match self.buffer.next_line(&self.delimiter, max)? {
            Extracted::Line(line) => self.decode_line(&line),
            Extracted::Oversized(head) => {
                warn!("Dropping line longer than {} bytes", head.len());
                Err(DecodeError::new(
                    format!("line exceeds {} bytes", head.len()),
                    String::from_utf8_lossy(&head),
                ))
            }
        };
        Some(outcome.map_err(StreamError::from))
    }

    fn decode_line(&self, line: &[u8]) -> Result<T, DecodeError> {
        codec::decode(line).map_err(|reason| {
            debug!("Failed to decode line: {}", reason);
            DecodeError::new(reason, String::from_utf8_lossy(line))
        })
    }

    fn resolve_pending(&mut self, sender: oneshot::Sender<Outcome<T>>, outcome: Outcome<T>) {
        // The handle can be dropped between the liveness check and here.
        if let Err(outcome) = sender.send(outcome) {
            debug!("Read cancelled during dispatch, falling back to callbacks");
            self.notify(outcome);
        }
    }

    fn notify(&mut self, outcome: Outcome<T>) {
        match outcome {
            Ok(value) => match self.config.on_message.as_mut() {
                Some(on_message) => on_message(value),
                None => warn!("No on_message callback, dropping decoded message"),
            },
            Err(StreamError::Decode(err)) => match self.config.on_decode_error.as_mut() {
                Some(on_decode_error) => on_decode_error(err),
                None => warn!("No on_decode_error callback, dropping: {}", err),
            },
            Err(other) => warn!("Unexpected dispatch outcome: {}", other),
        }
    }

    fn finish(&mut self) {
        self.ended = true;

        if !self.buffer.is_empty() {
            let discarded = self.buffer.discard_partial(&self.delimiter);
            if discarded > 0 {
                debug!("Discarding {} byte partial line at end of stream", discarded);
            }
            if self.buffer.has_line(&self.delimiter) {
                debug!("Keeping {} bytes of complete lines for one-shot reads", self.buffer.len());
            }
        }

        if let Some(sender) = self.pending.take() {
            let _ = sender.send(Err(StreamError::Closed));
        }
    }
}

impl<S, T> std::fmt::Debug for JsonLineStream<S, T>
where
    S: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonLineStream")
            .field("sink", &self.sink)
            .field("config", &self.config)
            .field("buffered", &self.buffer.len())
            .field("ended", &self.ended)
            .finish()
    }
}
