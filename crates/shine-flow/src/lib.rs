//! Flow decoding core of the Shine sniffer.
//!
//! Everything between reassembled TCP bytes and decoded packet records
//! lives here: the per-direction decoder state machines, the process-wide
//! registry that pairs the two directions of one connection for keystream
//! synchronization, and the factory that spins a decoder task up per
//! observed flow.
//!
//! # Architecture
//!
//! The reassembler (see `shine-capture`) drives the [`StreamFactory`] /
//! [`StreamSink`] contract: one `new_stream` per flow, then ordered segment
//! batches, then completion. Each flow gets its own tokio task owning a
//! [`FrameCursor`]; no other task touches a decoder's buffer or keystream
//! position. The only cross-task state is the [`FlowRegistry`], and the
//! only thing ever sent through it is the one-shot keystream seed.

mod cursor;
mod decoder;
mod factory;
mod flow;
mod registry;
mod segment;
mod sink;

pub use cursor::{FrameCursor, TakenFrame};
pub use factory::{FlowConfig, FlowFactory, FlowStream, StreamFactory, StreamSink};
pub use flow::{Direction, FlowKey, FlowLabel};
pub use registry::FlowRegistry;
pub use segment::Segment;
pub use sink::{PacketSink, TraceSink};
