//! Packet acquisition for the Shine sniffer.
//!
//! Opens a datalink channel on the configured interface, keeps only traffic
//! matching the server/port-range filter, restores per-flow byte order, and
//! drives the `shine-flow` stream contract: one stream per observed TCP
//! flow, ordered segment batches, completion on FIN/RST.

mod driver;
mod filter;
mod reassembly;

pub use driver::{CaptureConfig, CaptureDriver, CaptureError};
pub use filter::CaptureFilter;
pub use reassembly::TcpReassembler;
