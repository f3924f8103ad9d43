//! In-order TCP reassembly.
//!
//! Restores per-flow byte order from raw captured packets: duplicate and
//! already-delivered bytes are trimmed, future segments wait in a bounded
//! out-of-order buffer, and sequence numbers compare with 32-bit
//! wraparound. Ordered bytes leave through the `shine-flow` stream
//! contract; this module never looks inside them.

use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap, hash_map::Entry},
    net::IpAddr,
    time::SystemTime,
};

use bytes::{Buf, Bytes};
use etherparse::{InternetSlice, SlicedPacket, TcpSlice, TransportSlice};
use shine_flow::{FlowKey, Segment, StreamFactory, StreamSink};
use tracing::{trace, warn};

use crate::CaptureFilter;

/// Maximum out-of-order segments buffered per flow.
const MAX_PENDING: usize = 512;

/// Midpoint of the sequence space, for wraparound-aware comparison.
const SEQ_MID: u32 = 1 << 31;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FlowPair {
    src: FlowKey,
    dst: FlowKey,
}

/// A flow the factory declined stays as a tombstone so it is not offered
/// again for every packet.
enum FlowSlot<S> {
    Active(FlowState<S>),
    Dropped,
}

struct FlowState<S> {
    sink: S,
    /// Next expected sequence number; adopted from the first observed
    /// packet when the capture joins mid-stream.
    next_seq: Option<u32>,
    /// Out-of-order segments keyed by sequence number.
    pending: BTreeMap<u32, Bytes>,
}

/// Per-flow TCP reassembly over a stream factory.
pub struct TcpReassembler<F: StreamFactory> {
    factory: F,
    filter: CaptureFilter,
    flows: HashMap<FlowPair, FlowSlot<F::Sink>>,
}

impl<F: StreamFactory> TcpReassembler<F> {
    /// Create a reassembler delivering into `factory`'s streams.
    pub fn new(factory: F, filter: CaptureFilter) -> Self {
        Self { factory, filter, flows: HashMap::new() }
    }

    /// Number of flows currently tracked, tombstones included.
    pub fn flow_count(&self) -> usize {
        self.flows.len()
    }

    /// Feed one captured ethernet frame.
    ///
    /// Non-IP, non-TCP and filtered-out traffic is ignored. The first
    /// matching packet of a flow creates its stream; FIN or RST completes
    /// it (any payload riding along is delivered first).
    pub fn process_ethernet(&mut self, frame: &[u8], seen: SystemTime) {
        let Ok(packet) = SlicedPacket::from_ethernet(frame) else {
            trace!("unparseable frame ignored");
            return;
        };

        let (src_ip, dst_ip): (IpAddr, IpAddr) = match &packet.net {
            Some(InternetSlice::Ipv4(ip)) => {
                (ip.header().source_addr().into(), ip.header().destination_addr().into())
            },
            Some(InternetSlice::Ipv6(ip)) => {
                (ip.header().source_addr().into(), ip.header().destination_addr().into())
            },
            None => return,
        };
        let Some(TransportSlice::Tcp(tcp)) = packet.transport else {
            return;
        };

        let src = FlowKey::new(src_ip, tcp.source_port());
        let dst = FlowKey::new(dst_ip, tcp.destination_port());
        if !self.filter.matches(src, dst) {
            return;
        }

        let slot = match self.flows.entry(FlowPair { src, dst }) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let slot = Self::open_stream(&self.factory, src, dst);
                entry.insert(slot)
            },
        };

        // A tombstone absorbs post-FIN stragglers, but a fresh SYN on the
        // same endpoints is a new connection and gets a new stream.
        if matches!(slot, FlowSlot::Dropped) && tcp.syn() {
            *slot = Self::open_stream(&self.factory, src, dst);
        }

        let mut finished = false;
        if let FlowSlot::Active(state) = slot {
            finished = state.recv(&tcp, seen);
            if finished {
                state.sink.reassembly_complete();
            }
        }
        if finished {
            *slot = FlowSlot::Dropped;
        }
    }

    fn open_stream(factory: &F, src: FlowKey, dst: FlowKey) -> FlowSlot<F::Sink> {
        match factory.new_stream(src, dst) {
            Some(sink) => {
                FlowSlot::Active(FlowState { sink, next_seq: None, pending: BTreeMap::new() })
            },
            None => FlowSlot::Dropped,
        }
    }
}

impl<S: StreamSink> FlowState<S> {
    /// Apply one TCP packet; returns `true` when the stream ended.
    fn recv(&mut self, tcp: &TcpSlice<'_>, seen: SystemTime) -> bool {
        let raw_seq = tcp.sequence_number();

        // A SYN occupies one sequence number; data starts past it.
        let data_seq = if tcp.syn() { raw_seq.wrapping_add(1) } else { raw_seq };
        if tcp.syn() || self.next_seq.is_none() {
            self.next_seq = Some(data_seq);
        }

        let payload = tcp.payload();
        if !payload.is_empty()
            && let Some(expected) = self.next_seq
        {
            let advanced = self.ingest(data_seq, Bytes::copy_from_slice(payload), expected, seen);
            self.next_seq = Some(advanced);
        }

        tcp.fin() || tcp.rst()
    }

    /// Place one payload into the ordered stream, draining any buffered
    /// successors it unblocks. Returns the new expected sequence number.
    fn ingest(&mut self, seq: u32, payload: Bytes, expected: u32, seen: SystemTime) -> u32 {
        let mut seq = seq;
        let mut payload = payload;
        let mut expected = expected;

        match align(&mut seq, &mut payload, expected) {
            Align::Stale => {
                trace!(seq, "already-delivered bytes ignored");
                return expected;
            },
            Align::Future => {
                if self.pending.len() >= MAX_PENDING {
                    warn!(seq, "out-of-order buffer full, segment dropped");
                } else {
                    self.pending.insert(seq, payload);
                }
                return expected;
            },
            Align::Deliver => {},
        }

        expected = seq.wrapping_add(payload.len() as u32);
        let mut batch = vec![Segment::new(payload, seen)];

        // Two passes over the pending map: with sequence wraparound the
        // numeric BTreeMap order can visit the successor chunks last.
        for _ in 0..2 {
            for (mut buffered_seq, mut buffered) in std::mem::take(&mut self.pending) {
                match align(&mut buffered_seq, &mut buffered, expected) {
                    Align::Deliver => {
                        expected = buffered_seq.wrapping_add(buffered.len() as u32);
                        batch.push(Segment::new(buffered, seen));
                    },
                    Align::Future => {
                        self.pending.insert(buffered_seq, buffered);
                    },
                    Align::Stale => {},
                }
            }
        }

        self.sink.reassembled(batch);
        expected
    }
}

enum Align {
    /// Payload (possibly trimmed) starts exactly at the expected sequence.
    Deliver,
    /// Payload starts past the expected sequence; buffer it.
    Future,
    /// Every payload byte was already delivered.
    Stale,
}

/// Align a payload against the expected sequence number, trimming the
/// already-delivered front when the packet partially overlaps.
fn align(seq: &mut u32, payload: &mut Bytes, expected: u32) -> Align {
    match sequence_cmp(*seq, expected) {
        Ordering::Greater => return Align::Future,
        Ordering::Equal => return Align::Deliver,
        Ordering::Less => {},
    }

    let end = seq.wrapping_add(payload.len() as u32);
    if sequence_cmp(expected, end).is_ge() {
        return Align::Stale;
    }

    let skip = expected.wrapping_sub(*seq) as usize;
    payload.advance(skip);
    *seq = expected;
    Align::Deliver
}

/// Compare sequence numbers with wraparound: values in opposite halves of
/// the space reverse their numeric order.
fn sequence_cmp(a: u32, b: u32) -> Ordering {
    if (a & SEQ_MID) == (b & SEQ_MID) {
        a.cmp(&b)
    } else {
        a.wrapping_add(SEQ_MID).cmp(&b).reverse()
    }
}
