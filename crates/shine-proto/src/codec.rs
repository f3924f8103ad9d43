//! Decoding framed data blocks into packet records.

use std::sync::Arc;

use bytes::Bytes;

use crate::{CommandSchema, ProtoError, SizeClass};

/// Server→client operation that announces the keystream seed.
///
/// The first two bytes of its data are the little-endian position at which
/// the paired client→server stream starts XORing.
pub const XOR_SEED_OPCODE: u16 = 2055;

/// One decoded application message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketRecord {
    /// Operation code from the first two block bytes (little endian).
    pub operation_code: u16,
    /// Symbolic name from the command schema, when one is loaded.
    pub name: Option<Arc<str>>,
    /// Raw message data following the operation code.
    pub data: Bytes,
}

/// Turns framed (and, client-side, already deciphered) data blocks into
/// [`PacketRecord`]s.
///
/// The codec is stateless apart from the optional command schema; one
/// instance is shared by every flow decoder.
#[derive(Debug, Default)]
pub struct PacketCodec {
    schema: Option<CommandSchema>,
}

impl PacketCodec {
    /// Create a codec resolving names through `schema`.
    #[must_use]
    pub fn new(schema: Option<CommandSchema>) -> Self {
        Self { schema }
    }

    /// Decode one framed data block.
    ///
    /// `class` and `length` come from the framer; `block` is the
    /// `length`-byte slice between this message's header and the next
    /// boundary. Validation happens before any copying.
    ///
    /// # Errors
    ///
    /// [`ProtoError::PacketTooShort`] if the block cannot carry the two
    /// operation-code bytes.
    pub fn decode(
        &self,
        class: SizeClass,
        length: usize,
        block: &[u8],
    ) -> Result<PacketRecord, ProtoError> {
        debug_assert_eq!(block.len(), length);
        debug_assert!(class == SizeClass::Large || length <= u8::MAX as usize);

        let [lo, hi, data @ ..] = block else {
            return Err(ProtoError::PacketTooShort { length: block.len() });
        };

        let operation_code = u16::from_le_bytes([*lo, *hi]);

        Ok(PacketRecord {
            operation_code,
            name: self.schema.as_ref().and_then(|s| s.name(operation_code)),
            data: Bytes::copy_from_slice(data),
        })
    }
}
