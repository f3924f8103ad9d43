//! Downstream dispatch seam for decoded packets.

use shine_proto::PacketRecord;
use tracing::debug;

use crate::FlowLabel;

/// Consumer of decoded messages.
///
/// Called inline on the decoder task, one call per message, in wire order
/// per flow. Implementations must not assume concurrency and should return
/// quickly: a slow sink stalls its flow and, through the bounded segment
/// queue, eventually the reassembler.
pub trait PacketSink: Send + Sync {
    /// Handle one decoded message from `flow`.
    fn deliver(&self, flow: &FlowLabel, packet: &PacketRecord);
}

/// Sink that emits each packet as a structured trace event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TraceSink;

impl PacketSink for TraceSink {
    fn deliver(&self, flow: &FlowLabel, packet: &PacketRecord) {
        debug!(
            flow = %flow,
            op = packet.operation_code,
            name = packet.name.as_deref().unwrap_or("?"),
            size = packet.data.len(),
            "packet"
        );
    }
}
