//! Reassembly tests over crafted ethernet frames.
//!
//! A recording stream factory stands in for the flow layer, so these tests
//! observe exactly what byte sequence each flow's decoder would receive.

use std::{
    collections::HashMap,
    net::Ipv4Addr,
    sync::{Arc, Mutex},
    time::SystemTime,
};

use etherparse::PacketBuilder;
use shine_capture::{CaptureFilter, TcpReassembler};
use shine_flow::{FlowKey, Segment, StreamFactory, StreamSink};

const SERVER: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
const CLIENT: Ipv4Addr = Ipv4Addr::new(1, 2, 3, 4);

#[derive(Default)]
struct Log {
    stream_calls: usize,
    streams: Vec<(FlowKey, FlowKey)>,
    bytes: HashMap<usize, Vec<u8>>,
    completed: Vec<usize>,
}

#[derive(Clone)]
struct RecordingFactory {
    log: Arc<Mutex<Log>>,
    accept: bool,
}

impl RecordingFactory {
    fn new(accept: bool) -> Self {
        Self { log: Arc::new(Mutex::new(Log::default())), accept }
    }
}

struct RecordingSink {
    id: usize,
    log: Arc<Mutex<Log>>,
}

impl StreamFactory for RecordingFactory {
    type Sink = RecordingSink;

    fn new_stream(&self, src: FlowKey, dst: FlowKey) -> Option<RecordingSink> {
        let mut log = self.log.lock().unwrap();
        log.stream_calls += 1;
        if !self.accept {
            return None;
        }
        let id = log.streams.len();
        log.streams.push((src, dst));
        log.bytes.insert(id, Vec::new());
        Some(RecordingSink { id, log: Arc::clone(&self.log) })
    }
}

impl StreamSink for RecordingSink {
    fn reassembled(&mut self, batch: Vec<Segment>) {
        let mut log = self.log.lock().unwrap();
        let bytes = log.bytes.get_mut(&self.id).unwrap();
        for segment in batch {
            bytes.extend_from_slice(&segment.data);
        }
    }

    fn reassembly_complete(&mut self) {
        self.log.lock().unwrap().completed.push(self.id);
    }
}

struct Flags {
    syn: bool,
    fin: bool,
    rst: bool,
}

const DATA: Flags = Flags { syn: false, fin: false, rst: false };
const SYN: Flags = Flags { syn: true, fin: false, rst: false };
const FIN: Flags = Flags { syn: false, fin: true, rst: false };
const RST: Flags = Flags { syn: false, fin: false, rst: true };

fn packet(
    src: (Ipv4Addr, u16),
    dst: (Ipv4Addr, u16),
    seq: u32,
    payload: &[u8],
    flags: &Flags,
) -> Vec<u8> {
    let builder = PacketBuilder::ethernet2([1; 6], [2; 6])
        .ipv4(src.0.octets(), dst.0.octets(), 64)
        .tcp(src.1, dst.1, seq, 64240);
    let builder = if flags.syn { builder.syn() } else { builder };
    let builder = if flags.fin { builder.fin() } else { builder };
    let builder = if flags.rst { builder.rst() } else { builder };

    let mut frame = Vec::with_capacity(builder.size(payload.len()));
    builder.write(&mut frame, payload).unwrap();
    frame
}

fn reassembler(accept: bool) -> (TcpReassembler<RecordingFactory>, Arc<Mutex<Log>>) {
    let factory = RecordingFactory::new(accept);
    let log = Arc::clone(&factory.log);
    let filter = CaptureFilter::new(SERVER.into(), 9000..=9600);
    (TcpReassembler::new(factory, filter), log)
}

fn now() -> SystemTime {
    SystemTime::now()
}

#[test]
fn in_order_stream_is_delivered_verbatim() {
    let (mut reassembler, log) = reassembler(true);

    reassembler.process_ethernet(&packet((CLIENT, 54321), (SERVER, 9000), 100, &[], &SYN), now());
    reassembler
        .process_ethernet(&packet((CLIENT, 54321), (SERVER, 9000), 101, b"hello", &DATA), now());
    reassembler
        .process_ethernet(&packet((CLIENT, 54321), (SERVER, 9000), 106, b" world", &DATA), now());

    let log = log.lock().unwrap();
    assert_eq!(log.streams.len(), 1);
    assert_eq!(log.bytes[&0], b"hello world");
    assert!(log.completed.is_empty());
}

#[test]
fn out_of_order_segments_are_reordered() {
    let (mut reassembler, log) = reassembler(true);

    reassembler.process_ethernet(&packet((CLIENT, 54321), (SERVER, 9000), 100, &[], &SYN), now());
    // Second chunk arrives first and must wait
    reassembler
        .process_ethernet(&packet((CLIENT, 54321), (SERVER, 9000), 106, b" world", &DATA), now());
    assert_eq!(log.lock().unwrap().bytes[&0], b"");

    reassembler
        .process_ethernet(&packet((CLIENT, 54321), (SERVER, 9000), 101, b"hello", &DATA), now());
    assert_eq!(log.lock().unwrap().bytes[&0], b"hello world");
}

#[test]
fn retransmissions_and_overlaps_deliver_each_byte_once() {
    let (mut reassembler, log) = reassembler(true);

    reassembler.process_ethernet(&packet((CLIENT, 54321), (SERVER, 9000), 100, &[], &SYN), now());
    reassembler
        .process_ethernet(&packet((CLIENT, 54321), (SERVER, 9000), 101, b"hello", &DATA), now());
    // Full retransmission
    reassembler
        .process_ethernet(&packet((CLIENT, 54321), (SERVER, 9000), 101, b"hello", &DATA), now());
    // Partial overlap: "llo w" starting inside delivered bytes
    reassembler
        .process_ethernet(&packet((CLIENT, 54321), (SERVER, 9000), 103, b"llo w", &DATA), now());
    reassembler
        .process_ethernet(&packet((CLIENT, 54321), (SERVER, 9000), 108, b"orld", &DATA), now());

    assert_eq!(log.lock().unwrap().bytes[&0], b"hello world");
}

#[test]
fn mid_stream_join_adopts_first_sequence() {
    let (mut reassembler, log) = reassembler(true);

    // No SYN ever observed
    reassembler
        .process_ethernet(&packet((SERVER, 9000), (CLIENT, 54321), 5000, b"abc", &DATA), now());
    reassembler
        .process_ethernet(&packet((SERVER, 9000), (CLIENT, 54321), 5003, b"def", &DATA), now());

    assert_eq!(log.lock().unwrap().bytes[&0], b"abcdef");
}

#[test]
fn fin_completes_and_later_packets_are_ignored() {
    let (mut reassembler, log) = reassembler(true);

    reassembler.process_ethernet(&packet((CLIENT, 54321), (SERVER, 9000), 100, &[], &SYN), now());
    reassembler
        .process_ethernet(&packet((CLIENT, 54321), (SERVER, 9000), 101, b"bye", &FIN), now());
    // Straggler after the FIN
    reassembler
        .process_ethernet(&packet((CLIENT, 54321), (SERVER, 9000), 104, b"zzz", &DATA), now());

    let log = log.lock().unwrap();
    assert_eq!(log.bytes[&0], b"bye", "payload riding the FIN is delivered, stragglers are not");
    assert_eq!(log.completed, vec![0]);
    assert_eq!(log.stream_calls, 1, "tombstone must absorb post-FIN packets");
}

#[test]
fn rst_completes_the_stream() {
    let (mut reassembler, log) = reassembler(true);

    reassembler.process_ethernet(&packet((CLIENT, 54321), (SERVER, 9000), 100, &[], &SYN), now());
    reassembler.process_ethernet(&packet((CLIENT, 54321), (SERVER, 9000), 101, &[], &RST), now());

    assert_eq!(log.lock().unwrap().completed, vec![0]);
}

#[test]
fn each_direction_is_its_own_flow() {
    let (mut reassembler, log) = reassembler(true);

    reassembler
        .process_ethernet(&packet((CLIENT, 54321), (SERVER, 9000), 100, b"up", &DATA), now());
    reassembler
        .process_ethernet(&packet((SERVER, 9000), (CLIENT, 54321), 700, b"down", &DATA), now());

    let log = log.lock().unwrap();
    assert_eq!(log.streams.len(), 2);
    assert_eq!(log.bytes[&0], b"up");
    assert_eq!(log.bytes[&1], b"down");
    assert_eq!(reassembler.flow_count(), 2);
}

#[test]
fn filtered_traffic_never_reaches_the_factory() {
    let (mut reassembler, log) = reassembler(true);

    // Wrong host
    reassembler.process_ethernet(
        &packet((CLIENT, 54321), (Ipv4Addr::new(8, 8, 8, 8), 9000), 1, b"x", &DATA),
        now(),
    );
    // Right host, wrong ports
    reassembler.process_ethernet(&packet((CLIENT, 54321), (SERVER, 443), 1, b"x", &DATA), now());

    assert_eq!(log.lock().unwrap().stream_calls, 0);
    assert_eq!(reassembler.flow_count(), 0);
}

#[test]
fn declined_flow_is_offered_exactly_once() {
    let (mut reassembler, log) = reassembler(false);

    for seq in [1u32, 10, 20] {
        reassembler
            .process_ethernet(&packet((CLIENT, 54321), (SERVER, 9000), seq, b"x", &DATA), now());
    }

    assert_eq!(log.lock().unwrap().stream_calls, 1);
    assert_eq!(reassembler.flow_count(), 1, "tombstone remains to absorb the flow");
}

#[test]
fn fresh_syn_reopens_a_finished_flow() {
    let (mut reassembler, log) = reassembler(true);

    reassembler.process_ethernet(&packet((CLIENT, 54321), (SERVER, 9000), 100, &[], &SYN), now());
    reassembler
        .process_ethernet(&packet((CLIENT, 54321), (SERVER, 9000), 101, b"one", &FIN), now());

    // Same endpoints, new connection
    reassembler.process_ethernet(&packet((CLIENT, 54321), (SERVER, 9000), 900, &[], &SYN), now());
    reassembler
        .process_ethernet(&packet((CLIENT, 54321), (SERVER, 9000), 901, b"two", &DATA), now());

    let log = log.lock().unwrap();
    assert_eq!(log.streams.len(), 2);
    assert_eq!(log.bytes[&0], b"one");
    assert_eq!(log.bytes[&1], b"two");
    assert_eq!(log.completed, vec![0]);
}

#[test]
fn garbage_frames_are_ignored() {
    let (mut reassembler, log) = reassembler(true);

    reassembler.process_ethernet(&[0xDE, 0xAD], now());
    reassembler.process_ethernet(&[], now());

    assert_eq!(log.lock().unwrap().stream_calls, 0);
}
