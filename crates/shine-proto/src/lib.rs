//! Wire-level building blocks for the Shine game protocol.
//!
//! This crate is the pure byte layer of the sniffer: it knows how messages
//! are framed on the TCP stream, how a framed payload decodes into an
//! operation code and data, and how the client→server keystream cipher
//! works. It performs no I/O beyond loading the optional command schema and
//! has no awareness of flows, capture or concurrency; those live in
//! `shine-flow` and `shine-capture`.

mod cipher;
mod codec;
mod commands;
mod error;
mod frame;
mod services;

pub use cipher::XorTable;
pub use codec::{PacketCodec, PacketRecord, XOR_SEED_OPCODE};
pub use commands::CommandSchema;
pub use error::ProtoError;
pub use frame::{Boundary, SizeClass, packet_boundary};
pub use services::{SERVICE_PORTS, Service, ServiceMap};

/// Convenience alias for results carrying a [`ProtoError`].
pub type Result<T> = std::result::Result<T, ProtoError>;
