//! Reassembled TCP segments.

use std::time::SystemTime;

use bytes::Bytes;

/// One in-order chunk of reassembled stream bytes.
///
/// Immutable after creation. `seen` is the capture receipt time and is
/// carried for logging/correlation only; ordering is fixed by the
/// reassembler before a segment is created.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Ordered stream bytes.
    pub data: Bytes,
    /// When the bytes were captured.
    pub seen: SystemTime,
}

impl Segment {
    /// Create a segment.
    #[must_use]
    pub fn new(data: impl Into<Bytes>, seen: SystemTime) -> Self {
        Self { data: data.into(), seen }
    }
}
