//! Per-flow byte engine: buffering, framing and consumption.
//!
//! The cursor owns the reassembled-but-unframed bytes of one direction. It
//! is deliberately synchronous: the decoder tasks drive it between channel
//! wakeups, and the framing laws (full consumption, segmentation
//! invariance) are property-tested on it without a runtime.

use bytes::{Buf, BytesMut};
use shine_proto::{Boundary, SizeClass, packet_boundary};
use tracing::{trace, warn};

/// Consumed prefix length that triggers buffer compaction.
///
/// Compaction discards already-framed bytes and rebases the offset; the
/// framing position itself never moves backwards relative to the stream.
const COMPACT_AT: usize = 4096;

/// One message sliced out of the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TakenFrame {
    /// Header width the message was framed with.
    pub class: SizeClass,
    /// Data block length.
    pub length: usize,
    /// The data block itself, copied out so the client decoder can XOR it
    /// in place without touching buffered stream bytes.
    pub block: Vec<u8>,
}

/// Growing buffer of stream bytes plus the index of the next unframed byte.
#[derive(Debug, Default)]
pub struct FrameCursor {
    buffer: BytesMut,
    offset: usize,
}

impl FrameCursor {
    /// Create an empty cursor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append reassembled bytes.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Index of the next unframed byte. Monotonically non-decreasing
    /// between compactions; rebased together with the buffer.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes currently buffered (framed prefix included until compaction).
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Slice the next complete message out of the buffer, or `None` when
    /// the stream is exhausted mid-header or mid-message.
    ///
    /// Partial messages straddling segment boundaries stay buffered
    /// verbatim until the missing bytes arrive; nothing is consumed
    /// speculatively. Zero-length frames advance past their header and are
    /// skipped with a warning.
    pub fn take_frame(&mut self) -> Option<TakenFrame> {
        loop {
            if self.offset > self.buffer.len() {
                // Framing never advances past the buffer; a violation means
                // a bookkeeping bug, so give up on this wakeup.
                warn!(
                    offset = self.offset,
                    buffered = self.buffer.len(),
                    "framing offset beyond buffered bytes"
                );
                return None;
            }
            if self.offset == self.buffer.len() {
                return None;
            }

            let Boundary::Frame { length, class } = packet_boundary(&self.buffer, self.offset)
            else {
                trace!(remaining = self.buffer.len() - self.offset, "not enough data for header");
                return None;
            };

            let step = class.header_len() + length;
            if self.offset + step > self.buffer.len() {
                trace!(
                    needed = step,
                    remaining = self.buffer.len() - self.offset,
                    "not enough data for message"
                );
                return None;
            }

            if length == 0 {
                warn!("zero-length frame; skipping header");
                self.offset += class.header_len();
                continue;
            }

            let start = self.offset + class.header_len();
            let block = self.buffer[start..self.offset + step].to_vec();
            self.offset += step;
            self.compact();

            return Some(TakenFrame { class, length, block });
        }
    }

    fn compact(&mut self) {
        if self.offset >= COMPACT_AT {
            self.buffer.advance(self.offset);
            self.offset = 0;
        }
    }
}
