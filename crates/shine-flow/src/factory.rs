//! Flow creation and the reassembler-facing stream contract.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use shine_proto::{PacketCodec, ServiceMap, XorTable};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    Direction, FlowKey, FlowLabel, FlowRegistry, FrameCursor, PacketSink, Segment,
    decoder::{ClientDecoder, DecoderCore, ServerDecoder},
};

/// Per-flow handle the reassembler drives.
///
/// One sink per flow: ordered segment batches go in, and stream completion
/// tears the decoder down. Implemented by [`FlowStream`] in production and
/// by test doubles in the capture crate's tests.
pub trait StreamSink: Send {
    /// Deliver a batch of in-order segments.
    ///
    /// Blocks while the decoder's segment queue is full, pushing
    /// backpressure onto the reassembler.
    fn reassembled(&mut self, batch: Vec<Segment>);

    /// The reassembler has seen the end of this stream.
    fn reassembly_complete(&mut self);
}

/// Creates a stream sink when the reassembler observes a new flow.
pub trait StreamFactory: Send {
    /// Sink type handed back per flow.
    type Sink: StreamSink;

    /// Start decoding a flow from `src` to `dst`, or `None` to drop it.
    fn new_stream(&self, src: FlowKey, dst: FlowKey) -> Option<Self::Sink>;
}

/// Tunables for flow creation.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// Segment queue capacity per decoder; a full queue blocks the
    /// reassembler.
    pub segment_queue: usize,
    /// Verbose message logging for client→server flows.
    pub log_client: bool,
    /// Verbose message logging for server→client flows.
    pub log_server: bool,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self { segment_queue: 512, log_client: false, log_server: false }
    }
}

/// Builds and registers a decoder per observed TCP flow.
pub struct FlowFactory {
    registry: Arc<FlowRegistry>,
    codec: Arc<PacketCodec>,
    cipher: Arc<XorTable>,
    services: ServiceMap,
    sink: Arc<dyn PacketSink>,
    runtime: tokio::runtime::Handle,
    root: CancellationToken,
    next_flow_id: AtomicU64,
    config: FlowConfig,
}

impl FlowFactory {
    /// Create a factory.
    ///
    /// `root` is the capture-wide cancellation token; every decoder runs
    /// under a child of it, so cancelling the root tears all flows down.
    /// `runtime` is the handle decoder tasks are spawned on, since the
    /// factory itself is typically called from the capture thread, outside
    /// any runtime context.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<FlowRegistry>,
        codec: Arc<PacketCodec>,
        cipher: Arc<XorTable>,
        services: ServiceMap,
        sink: Arc<dyn PacketSink>,
        runtime: tokio::runtime::Handle,
        root: CancellationToken,
        config: FlowConfig,
    ) -> Self {
        Self {
            registry,
            codec,
            cipher,
            services,
            sink,
            runtime,
            root,
            next_flow_id: AtomicU64::new(1),
            config,
        }
    }

    fn classify(&self, src: FlowKey, dst: FlowKey) -> Option<(Direction, Arc<str>)> {
        if let Some(service) = self.services.name(src.port) {
            return Some((Direction::ServerToClient, service));
        }
        if let Some(service) = self.services.name(dst.port) {
            return Some((Direction::ClientToServer, service));
        }
        None
    }
}

impl StreamFactory for FlowFactory {
    type Sink = FlowStream;

    fn new_stream(&self, src: FlowKey, dst: FlowKey) -> Option<FlowStream> {
        let Some((direction, service)) = self.classify(src, dst) else {
            // The capture filter is built from the same service list; an
            // unmatched flow means the two have drifted apart.
            warn!(%src, %dst, "no service registered for flow, dropping");
            return None;
        };

        let id = self.next_flow_id.fetch_add(1, Ordering::Relaxed);
        let name: Arc<str> = match direction {
            Direction::ServerToClient => Arc::from(format!("{service}-client").as_str()),
            Direction::ClientToServer => Arc::from(format!("client-{service}").as_str()),
        };
        let label = FlowLabel { id, name, src, dst, direction };

        let (segment_tx, segment_rx) = mpsc::channel(self.config.segment_queue);
        let cancel = self.root.child_token();

        let core = DecoderCore {
            label: label.clone(),
            cursor: FrameCursor::new(),
            codec: Arc::clone(&self.codec),
            sink: Arc::clone(&self.sink),
            log_messages: match direction {
                Direction::ServerToClient => self.config.log_server,
                Direction::ClientToServer => self.config.log_client,
            },
        };

        match direction {
            Direction::ServerToClient => {
                self.registry.insert(direction, src, id, None);
                let decoder =
                    ServerDecoder { core, registry: Arc::clone(&self.registry), key_found: false };
                self.runtime.spawn(decoder.run(segment_rx, cancel.clone()));
            },
            Direction::ClientToServer => {
                let (key_tx, key_rx) = oneshot::channel();
                self.registry.insert(direction, src, id, Some(key_tx));
                let decoder = ClientDecoder {
                    core,
                    registry: Arc::clone(&self.registry),
                    cipher: Arc::clone(&self.cipher),
                    xor_offset: None,
                };
                self.runtime.spawn(decoder.run(segment_rx, key_rx, cancel.clone()));
            },
        }

        debug!(flow = %label, %src, %dst, "flow decoder started");
        Some(FlowStream { flow_id: id, segments: segment_tx, cancel })
    }
}

/// Production [`StreamSink`]: forwards segments into the decoder task.
pub struct FlowStream {
    flow_id: u64,
    segments: mpsc::Sender<Segment>,
    cancel: CancellationToken,
}

impl FlowStream {
    /// Flow id this stream feeds, for correlation.
    #[must_use]
    pub fn flow_id(&self) -> u64 {
        self.flow_id
    }

    /// Async variant of [`StreamSink::reassembled`] for in-process
    /// producers that already run on the runtime.
    pub async fn deliver(&self, segment: Segment) {
        if segment.data.is_empty() {
            return;
        }
        if self.segments.send(segment).await.is_err() {
            debug!(flow = self.flow_id, "decoder gone, segment dropped");
        }
    }

    /// [`StreamSink::reassembly_complete`] through a shared reference,
    /// usable from any context.
    pub fn complete(&self) {
        debug!(flow = self.flow_id, "reassembly complete");
        self.cancel.cancel();
    }
}

impl StreamSink for FlowStream {
    fn reassembled(&mut self, batch: Vec<Segment>) {
        for segment in batch {
            if segment.data.is_empty() {
                continue;
            }
            if self.segments.blocking_send(segment).is_err() {
                debug!(flow = self.flow_id, "decoder gone, segment dropped");
                return;
            }
        }
    }

    fn reassembly_complete(&mut self) {
        self.complete();
    }
}
