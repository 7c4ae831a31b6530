//! In-memory sink.

use std::collections::VecDeque;
use std::io;

use bytes::Bytes;

use super::sink::{ByteSink, FlushHandle, FlushSignal, WriteOptions};

/// Records every submitted frame in memory.
///
/// Flushes are confirmed either immediately ([`MemorySink::auto_flush`]) or
/// only when [`confirm_flush`](MemorySink::confirm_flush) is called, which
/// makes it possible to observe a write that is submitted but not yet
/// flushed.
#[derive(Debug, Default)]
pub struct MemorySink {
    frames: Vec<Bytes>,
    unflushed: VecDeque<FlushSignal>,
    auto_flush: bool,
}

impl MemorySink {
    /// A sink that holds flush confirmation until told otherwise.
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that confirms every write as soon as it is submitted.
    pub fn auto_flush() -> Self {
        Self {
            auto_flush: true,
            ..Self::default()
        }
    }

    /// Frames in submission order.
    pub fn frames(&self) -> &[Bytes] {
        &self.frames
    }

    /// All submitted bytes, concatenated.
    pub fn written(&self) -> Vec<u8> {
        self.frames.iter().flat_map(|f| f.iter().copied()).collect()
    }

    /// Writes submitted but not yet confirmed.
    pub fn unflushed(&self) -> usize {
        self.unflushed.len()
    }

    /// Confirm every outstanding write. Returns how many were confirmed.
    pub fn confirm_flush(&mut self) -> usize {
        let count = self.unflushed.len();
        for signal in self.unflushed.drain(..) {
            signal.complete(Ok(()));
        }
        count
    }

    /// Fail every outstanding write with `kind`. Returns how many failed.
    pub fn fail_flush(&mut self, kind: io::ErrorKind) -> usize {
        let count = self.unflushed.len();
        for signal in self.unflushed.drain(..) {
            signal.complete(Err(io::Error::new(kind, "memory sink write failed")));
        }
        count
    }
}

impl ByteSink for MemorySink {
    type Options = WriteOptions;

    fn submit_write(&mut self, bytes: Bytes, options: WriteOptions) -> FlushHandle {
        self.frames.push(bytes);
        let (signal, handle) = FlushHandle::channel(options);
        if self.auto_flush {
            signal.complete(Ok(()));
        } else {
            self.unflushed.push_back(signal);
        }
        handle
    }
}
