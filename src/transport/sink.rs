//! Outbound byte sink abstraction and flush completion handles.

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::sync::oneshot;

use crate::error::StreamError;

/// Where encoded frames go.
///
/// `submit_write` must not block: it queues (or performs) the write and hands
/// back a [`FlushHandle`] that the sink completes once the bytes have left
/// the process. `Options` are forwarded untouched from
/// [`JsonLineStream::write_message`](crate::JsonLineStream::write_message).
pub trait ByteSink {
    /// Per-write modifiers understood by this sink.
    type Options: Default;

    /// Submit one frame as a single write.
    fn submit_write(&mut self, bytes: Bytes, options: Self::Options) -> FlushHandle;
}

/// Per-write modifiers for the bundled sinks.
#[derive(Default)]
pub struct WriteOptions {
    /// Fired after these particular bytes are confirmed flushed.
    pub on_flushed: Option<Box<dyn FnOnce() + Send>>,
}

impl WriteOptions {
    pub fn on_flushed<F>(callback: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            on_flushed: Some(Box::new(callback)),
        }
    }
}

impl fmt::Debug for WriteOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteOptions")
            .field("on_flushed", &self.on_flushed.is_some())
            .finish()
    }
}

/// Sink-side half of a [`FlushHandle`].
pub struct FlushSignal {
    sender: oneshot::Sender<io::Result<()>>,
    on_flushed: Option<Box<dyn FnOnce() + Send>>,
}

impl FlushSignal {
    /// Report the outcome of the write. `on_flushed` only fires on success.
    pub fn complete(self, result: io::Result<()>) {
        if result.is_ok() {
            if let Some(callback) = self.on_flushed {
                callback();
            }
        }
        // The caller may have dropped the handle; that is not an error.
        let _ = self.sender.send(result);
    }
}

impl fmt::Debug for FlushSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlushSignal")
            .field("on_flushed", &self.on_flushed.is_some())
            .finish()
    }
}

/// Completes once the transport confirms a write was flushed.
///
/// Carries no value. Resolves to [`StreamError::Transport`] if the write
/// failed and [`StreamError::Closed`] if the sink went away without
/// reporting.
#[derive(Debug)]
#[must_use = "a FlushHandle does nothing unless awaited or checked"]
pub struct FlushHandle {
    state: FlushState,
}

#[derive(Debug)]
enum FlushState {
    Done(Option<io::Result<()>>),
    Waiting(oneshot::Receiver<io::Result<()>>),
}

impl FlushHandle {
    /// A pending handle plus the signal that completes it.
    pub fn channel(options: WriteOptions) -> (FlushSignal, FlushHandle) {
        let (sender, receiver) = oneshot::channel();
        let signal = FlushSignal {
            sender,
            on_flushed: options.on_flushed,
        };
        let handle = FlushHandle {
            state: FlushState::Waiting(receiver),
        };
        (signal, handle)
    }

    /// An already-completed handle.
    pub fn ready(result: io::Result<()>) -> Self {
        Self {
            state: FlushState::Done(Some(result)),
        }
    }

    /// Non-blocking check; `None` while the flush is still outstanding.
    pub fn try_take(&mut self) -> Option<Result<(), StreamError>> {
        match &mut self.state {
            FlushState::Done(result) => Some(settle(result.take())),
            FlushState::Waiting(receiver) => match receiver.try_recv() {
                Ok(result) => Some(settle(Some(result))),
                Err(oneshot::error::TryRecvError::Empty) => None,
                Err(oneshot::error::TryRecvError::Closed) => Some(Err(StreamError::Closed)),
            },
        }
    }
}

impl Future for FlushHandle {
    type Output = Result<(), StreamError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            FlushState::Done(result) => Poll::Ready(settle(result.take())),
            FlushState::Waiting(receiver) => Pin::new(receiver)
                .poll(cx)
                .map(|received| settle(received.ok())),
        }
    }
}

fn settle(result: Option<io::Result<()>>) -> Result<(), StreamError> {
    match result {
        Some(Ok(())) => Ok(()),
        Some(Err(err)) => Err(StreamError::Transport(err)),
        None => Err(StreamError::Closed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_handle_pending_until_signalled() {
        let (signal, mut handle) = FlushHandle::channel(WriteOptions::default());
        assert!(handle.try_take().is_none());

        signal.complete(Ok(()));
        assert!(matches!(handle.try_take(), Some(Ok(()))));
    }

    #[test]
    fn test_on_flushed_fires_only_on_success() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let (signal, mut handle) =
            FlushHandle::channel(WriteOptions::on_flushed(move || flag.store(true, Ordering::SeqCst)));

        signal.complete(Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone")));
        assert!(!fired.load(Ordering::SeqCst));
        let err = handle.try_take().unwrap().unwrap_err();
        assert_eq!(err.category(), "transport");
    }

    #[tokio::test]
    async fn test_dropped_signal_is_closed() {
        let (signal, handle) = FlushHandle::channel(WriteOptions::default());
        drop(signal);
        assert!(matches!(handle.await, Err(StreamError::Closed)));
    }

    #[tokio::test]
    async fn test_ready_handle() {
        assert!(FlushHandle::ready(Ok(())).await.is_ok());
    }
}
