//! Wire-layer error types.

use std::path::PathBuf;

/// Errors produced by the wire layer.
///
/// Keystream and schema variants are fatal at boot (bad configuration);
/// [`ProtoError::PacketTooShort`] is a per-message decode failure the flow
/// layer logs and skips past.
#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    /// The configured keystream key is not a valid hex string.
    #[error("keystream key is not valid hex: {0}")]
    KeyEncoding(#[from] hex::FromHexError),

    /// The keystream period is zero or longer than the key table.
    #[error("keystream period {limit} does not fit key table of {table_len} bytes")]
    KeystreamPeriod {
        /// Configured period.
        limit: u16,
        /// Decoded key table length.
        table_len: usize,
    },

    /// A framed data block was too short to carry an operation code.
    #[error("data block of {length} bytes cannot carry an operation code")]
    PacketTooShort {
        /// Framed block length.
        length: usize,
    },

    /// The command schema file could not be read.
    #[error("failed to read command schema {path:?}: {source}")]
    SchemaRead {
        /// Schema path from configuration.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The command schema file is not valid JSON.
    #[error("failed to parse command schema {path:?}: {source}")]
    SchemaParse {
        /// Schema path from configuration.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// A command schema key is not a decimal or `0x`-hex operation code.
    #[error("command schema key {key:?} is not an operation code")]
    SchemaKey {
        /// Offending map key.
        key: String,
    },
}
