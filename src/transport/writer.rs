//! Sink backed by a tokio `AsyncWrite`.

use std::io;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::sink::{ByteSink, FlushHandle, FlushSignal, WriteOptions};

/// Hands frames to a background task that writes them in order.
///
/// Each frame is written with `write_all` followed by `flush`; its handle
/// completes with the outcome of that pair. `submit_write` itself never
/// waits, so the encode-and-submit step stays synchronous.
///
/// # Example
///
/// ```ignore
/// let (read_half, write_half) = stream.into_split();
/// let sink = WriterSink::spawn(write_half);
/// let mut lines = JsonLineStream::new(sink, StreamConfig::new().one_shot_reads())?;
/// lines.write_message(&json!({"hello": "world"}), WriteOptions::default())?.await?;
/// ```
#[derive(Debug)]
pub struct WriterSink {
    queue: mpsc::UnboundedSender<(Bytes, FlushSignal)>,
    task: JoinHandle<()>,
}

impl WriterSink {
    /// Spawn the writer task on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn<W>(writer: W) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (queue, frames) = mpsc::unbounded_channel();
        let task = tokio::spawn(write_frames(writer, frames));
        Self { queue, task }
    }

    /// Stop accepting frames and wait for queued ones to be written.
    pub async fn shutdown(self) {
        drop(self.queue);
        if let Err(e) = self.task.await {
            warn!("Writer task ended abnormally: {}", e);
        }
    }
}

impl ByteSink for WriterSink {
    type Options = WriteOptions;

    fn submit_write(&mut self, bytes: Bytes, options: WriteOptions) -> FlushHandle {
        let (signal, handle) = FlushHandle::channel(options);
        if let Err(mpsc::error::SendError((_, signal))) = self.queue.send((bytes, signal)) {
            signal.complete(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "writer task has stopped",
            )));
        }
        handle
    }
}

async fn write_frames<W>(mut writer: W, mut frames: mpsc::UnboundedReceiver<(Bytes, FlushSignal)>)
where
    W: AsyncWrite + Unpin,
{
    while let Some((bytes, signal)) = frames.recv().await {
        let result = write_frame(&mut writer, &bytes).await;
        if let Err(e) = &result {
            warn!("Failed to write frame ({} bytes): {}", bytes.len(), e);
        }
        signal.complete(result);
    }
    debug!("Writer task finished");
}

async fn write_frame<W>(writer: &mut W, bytes: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(bytes).await?;
    writer.flush().await
}
