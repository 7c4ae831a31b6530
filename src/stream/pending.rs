//! Single-slot registry for one-shot reads.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tracing::debug;

use crate::error::StreamError;

pub(crate) type Outcome<T> = Result<T, StreamError>;

/// Holds the sender half of the one outstanding read, if any.
///
/// A slot whose [`ReadHandle`] was dropped counts as empty: the sender is
/// released the next time the slot is inspected, so a cancelled waiter
/// never swallows a line.
#[derive(Debug)]
pub(crate) struct PendingSlot<T> {
    sender: Option<oneshot::Sender<Outcome<T>>>,
}

impl<T> Default for PendingSlot<T> {
    fn default() -> Self {
        Self { sender: None }
    }
}

impl<T> PendingSlot<T> {
    /// Whether a read is outstanding and its handle is still alive.
    pub(crate) fn is_live(&mut self) -> bool {
        match &self.sender {
            Some(sender) if sender.is_closed() => {
                debug!("Releasing cancelled read request");
                self.sender = None;
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Open a new read. Fails if a live one is already outstanding.
    pub(crate) fn claim(&mut self) -> Result<ReadHandle<T>, StreamError> {
        if self.is_live() {
            return Err(StreamError::ReadInProgress);
        }
        let (sender, receiver) = oneshot::channel();
        self.sender = Some(sender);
        Ok(ReadHandle { receiver })
    }

    /// Put back a sender taken with [`take`](Self::take) that had nothing to deliver.
    pub(crate) fn restore(&mut self, sender: oneshot::Sender<Outcome<T>>) {
        self.sender = Some(sender);
    }

    /// Take the live sender, leaving the slot empty.
    pub(crate) fn take(&mut self) -> Option<oneshot::Sender<Outcome<T>>> {
        if self.is_live() {
            self.sender.take()
        } else {
            None
        }
    }
}

/// The result of [`JsonLineStream::read_message`](crate::JsonLineStream::read_message).
///
/// Resolves exactly once, with the next decoded message or the failure for
/// the next line. Dropping the handle cancels the read.
#[derive(Debug)]
#[must_use = "dropping a ReadHandle cancels the read"]
pub struct ReadHandle<T> {
    receiver: oneshot::Receiver<Outcome<T>>,
}

impl<T> ReadHandle<T> {
    /// Non-blocking check; `None` while the read is still outstanding.
    pub fn try_take(&mut self) -> Option<Result<T, StreamError>> {
        match self.receiver.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(StreamError::Closed)),
        }
    }

    /// Give up on the read. The next line goes to the callbacks instead.
    pub fn cancel(mut self) {
        self.receiver.close();
    }
}

impl<T> Future for ReadHandle<T> {
    type Output = Result<T, StreamError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().receiver)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(StreamError::Closed)))
    }
}
