//! Accumulation buffer for incoming bytes.

use bytes::{Buf, BytesMut};

/// What [`LineBuffer::next_line`] extracted.
#[derive(Debug, PartialEq)]
pub(crate) enum Extracted {
    /// A complete line, delimiter stripped.
    Line(BytesMut),
    /// The first `max` bytes of a line over the length limit.
    Oversized(BytesMut),
}

/// Bytes received but not yet consumed as lines.
///
/// Lines are removed from the front with `split_to`, so extraction never
/// copies the remaining tail. `next_index` remembers how far the previous
/// scan got so a long partial line fed one byte at a time is not rescanned
/// from the start on every chunk.
///
/// With a length limit, an undelimited line is cut off as soon as it grows
/// past the limit. The rest of it is dropped as it arrives, up to and
/// including the next delimiter.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    buf: BytesMut,
    /// Index of the next byte to check for the delimiter.
    next_index: usize,
    /// Dropping the tail of an oversized line.
    discarding: bool,
}

impl LineBuffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    pub(crate) fn len(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Forget the scan position, e.g. after the delimiter changed.
    pub(crate) fn reset_scan(&mut self) {
        self.next_index = 0;
    }

    /// Remove and return the next line, delimiter stripped.
    ///
    /// Lines longer than `max` come back as [`Extracted::Oversized`], once
    /// per line, even if the delimiter has not arrived yet.
    pub(crate) fn next_line(&mut self, delimiter: &[u8], max: Option<usize>) -> Option<Extracted> {
        debug_assert!(!delimiter.is_empty());

        loop {
            let start = self.next_index.min(self.buf.len());
            let Some(offset) = find(&self.buf[start..], delimiter) else {
                return self.check_partial(delimiter, max);
            };
            let end = start + offset;
            self.next_index = 0;

            if self.discarding {
                self.buf.advance(end + delimiter.len());
                self.discarding = false;
                continue;
            }

            let mut line = self.buf.split_to(end);
            self.buf.advance(delimiter.len());
            return Some(match max {
                Some(max) if line.len() > max => {
                    line.truncate(max);
                    Extracted::Oversized(line)
                }
                _ => Extracted::Line(line),
            });
        }
    }

    /// No delimiter is buffered. Cut the partial line off if it is already
    /// over the limit.
    fn check_partial(&mut self, delimiter: &[u8], max: Option<usize>) -> Option<Extracted> {
        // A delimiter may straddle this chunk and the next one.
        let overlap = delimiter.len() - 1;

        if self.discarding {
            self.skip_to_overlap(overlap);
            return None;
        }

        match max {
            Some(max) if self.buf.len().saturating_sub(overlap) > max => {
                let head = self.buf.split_to(max);
                self.discarding = true;
                self.skip_to_overlap(overlap);
                Some(Extracted::Oversized(head))
            }
            _ => {
                self.next_index = self.buf.len().saturating_sub(overlap);
                None
            }
        }
    }

    fn skip_to_overlap(&mut self, overlap: usize) {
        let skip = self.buf.len().saturating_sub(overlap);
        self.buf.advance(skip);
        self.next_index = 0;
    }

    /// Whether at least one complete line is buffered.
    pub(crate) fn has_line(&self, delimiter: &[u8]) -> bool {
        find(&self.buf[self.skipped_len(delimiter)..], delimiter).is_some()
    }

    /// Drop the undelimited tail after the last complete line.
    /// Returns how many bytes were discarded.
    pub(crate) fn discard_partial(&mut self, delimiter: &[u8]) -> usize {
        let skipped = self.skipped_len(delimiter);
        self.buf.advance(skipped);
        self.discarding = false;

        let keep = rfind(&self.buf, delimiter)
            .map(|pos| pos + delimiter.len())
            .unwrap_or(0);
        let discarded = skipped + self.buf.len() - keep;
        self.buf.truncate(keep);
        self.next_index = 0;
        discarded
    }

    /// Leading bytes that still belong to an oversized line.
    fn skipped_len(&self, delimiter: &[u8]) -> usize {
        if !self.discarding {
            return 0;
        }
        find(&self.buf, delimiter).map_or(self.buf.len(), |pos| pos + delimiter.len())
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() == 1 {
        return haystack.iter().position(|b| *b == needle[0]);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}
