//! Streaming XOR cipher for the client→server direction.
//!
//! Clients encrypt everything they send with a byte-wise XOR against a
//! fixed key table, starting at a position the server announces once per
//! connection (see [`crate::XOR_SEED_OPCODE`]). Decryption is the same
//! transform: each processed byte advances the position by one, wrapping at
//! the configured period.

use crate::error::ProtoError;

/// Process-wide keystream key table.
///
/// Built once at boot from the configured hex key and period, then shared
/// read-only between all client→server decoders. Each decoder owns its own
/// position into the table; the table itself is never mutated.
#[derive(Debug, Clone)]
pub struct XorTable {
    table: Vec<u8>,
    limit: u16,
}

impl XorTable {
    /// Decode the key table from a hex string and validate the period.
    ///
    /// # Errors
    ///
    /// - [`ProtoError::KeyEncoding`] if `key_hex` is not valid hex
    /// - [`ProtoError::KeystreamPeriod`] if `limit` is zero or exceeds the
    ///   decoded table length
    pub fn from_hex(key_hex: &str, limit: u16) -> Result<Self, ProtoError> {
        let table = hex::decode(key_hex.trim())?;

        if limit == 0 || limit as usize > table.len() {
            return Err(ProtoError::KeystreamPeriod { limit, table_len: table.len() });
        }

        Ok(Self { table, limit })
    }

    /// Keystream period: positions wrap back to zero at this value.
    #[must_use]
    pub fn limit(&self) -> u16 {
        self.limit
    }

    /// XOR-transform `data` in place, advancing `offset` by one position per
    /// byte.
    ///
    /// The position is reduced modulo the period before each lookup, so a
    /// seed recovered from the wire may exceed the period without indexing
    /// out of the table. After the call `offset` has advanced by exactly
    /// `data.len()` positions, in byte order, which is the property the
    /// paired-flow key synchronization depends on.
    pub fn apply(&self, data: &mut [u8], offset: &mut u16) {
        for byte in data {
            let pos = *offset % self.limit;
            *byte ^= self.table[pos as usize];
            *offset = (pos + 1) % self.limit;
        }
    }
}
