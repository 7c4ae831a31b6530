//! Read loop feeding a tokio `AsyncRead` into a stream.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, error};

use super::sink::ByteSink;
use crate::error::StreamError;
use crate::stream::JsonLineStream;

/// Size of each read from the transport.
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Read from `reader` until EOF, handing every chunk to `stream`.
///
/// End of stream is signalled once the reader reports EOF or fails, so a
/// trailing undelimited line is discarded and an outstanding one-shot read
/// resolves with [`StreamError::Closed`](crate::StreamError::Closed) rather
/// than waiting forever.
///
/// Returns the number of bytes read.
///
/// # Errors
///
/// Returns an error if reading from the transport fails.
///
/// # Example
///
/// ```ignore
/// let pending = lines.read_message()?;
/// pump(read_half, &mut lines).await?;
/// let message = pending.await?;
/// ```
pub async fn pump<R, S, T>(mut reader: R, stream: &mut JsonLineStream<S, T>) -> Result<u64>
where
    R: AsyncRead + Unpin,
    S: ByteSink,
    T: DeserializeOwned,
{
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];
    let mut total: u64 = 0;

    loop {
        let bytes_read = match reader.read(&mut chunk).await {
            Ok(n) => n,
            Err(e) => {
                error!("Failed to read from transport: {}", e);
                stream.on_bytes_available(&[], true);
                return Err(e).context("Failed to read from transport");
            }
        };

        // EOF - peer closed its write side
        if bytes_read == 0 {
            debug!("Transport reached end of stream after {} bytes", total);
            stream.on_bytes_available(&[], true);
            return Ok(total);
        }

        total += bytes_read as u64;
        stream.on_bytes_available(&chunk[..bytes_read], false);
    }
}

/// Read from `reader` until the next message for `stream` arrives.
///
/// Opens a one-shot read and feeds chunks until it resolves. The stream is
/// only borrowed for the duration of one message, so writes can go out
/// between reads. Bytes read past the message stay buffered in the stream.
///
/// # Errors
///
/// - [`StreamError::Closed`] if the reader reaches EOF first
/// - [`StreamError::Transport`] if reading fails; end of stream is signalled
/// - anything [`read_message`](JsonLineStream::read_message) or the line
///   itself fails with
///
/// # Example
///
/// ```ignore
/// lines.write_message(&json!({"method": "ping"}), WriteOptions::default())?.await?;
/// let reply = read_next(&mut read_half, &mut lines).await?;
/// ```
pub async fn read_next<R, S, T>(reader: &mut R, stream: &mut JsonLineStream<S, T>) -> Result<T, StreamError>
where
    R: AsyncRead + Unpin,
    S: ByteSink,
    T: DeserializeOwned,
{
    let mut handle = stream.read_message()?;
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];

    loop {
        if let Some(outcome) = handle.try_take() {
            return outcome;
        }

        match reader.read(&mut chunk).await {
            Ok(0) => {
                debug!("Transport reached end of stream while waiting for a message");
                stream.on_bytes_available(&[], true);
            }
            Ok(bytes_read) => {
                stream.on_bytes_available(&chunk[..bytes_read], false);
            }
            Err(e) => {
                error!("Failed to read from transport: {}", e);
                stream.on_bytes_available(&[], true);
                return Err(StreamError::from(e));
            }
        }
    }
}
