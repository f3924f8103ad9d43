//! Message framing for the Shine byte stream.
//!
//! A message on the wire is a length header followed by a data block. The
//! header comes in two widths: a single non-zero byte carries the block
//! length directly (*small*), while a zero byte announces a *large* message
//! whose length follows as a little-endian `u16`. The data block itself
//! (operation code plus payload) is opaque at this layer; see
//! [`crate::PacketCodec`].

/// Marker byte announcing a wide length header.
const LARGE_MARKER: u8 = 0x00;

/// Header width of a framed message.
///
/// Determines how many bytes the length prefix consumes before the data
/// block starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeClass {
    /// One header byte; the byte itself is the data block length (1..=255).
    Small,
    /// Three header bytes; a zero marker followed by a little-endian `u16`
    /// data block length.
    Large,
}

impl SizeClass {
    /// Number of bytes the length header consumes.
    #[must_use]
    pub const fn header_len(self) -> usize {
        match self {
            Self::Small => 1,
            Self::Large => 3,
        }
    }
}

/// Outcome of probing the buffer for the next message boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// Not enough bytes after `offset` to read a complete length header.
    NeedHeader,
    /// A complete header was read.
    Frame {
        /// Data block length in bytes, excluding the header.
        length: usize,
        /// Header width that produced `length`.
        class: SizeClass,
    },
}

/// Read the next message boundary from `buffer` starting at `offset`.
///
/// Pure function over the raw bytes: it never consumes anything and has no
/// awareness of encryption: ciphered client→server bytes frame identically
/// because the length header is transmitted in the clear.
///
/// The total consumption for the framed message is
/// `class.header_len() + length`; the caller checks that many bytes are
/// actually buffered before slicing the data block out.
#[must_use]
pub fn packet_boundary(buffer: &[u8], offset: usize) -> Boundary {
    let Some(&first) = buffer.get(offset) else {
        return Boundary::NeedHeader;
    };

    if first != LARGE_MARKER {
        return Boundary::Frame { length: first as usize, class: SizeClass::Small };
    }

    match (buffer.get(offset + 1), buffer.get(offset + 2)) {
        (Some(&lo), Some(&hi)) => Boundary::Frame {
            length: u16::from_le_bytes([lo, hi]) as usize,
            class: SizeClass::Large,
        },
        _ => Boundary::NeedHeader,
    }
}
