//! Per-flow decoder tasks.
//!
//! Both directions share a skeleton: wait for a segment (or cancellation),
//! append it to the frame cursor, then drain as many complete messages as
//! the buffer holds. The server→client variant additionally watches for the
//! keystream seed announcement and forwards it to the paired flow; the
//! client→server variant refuses to frame anything until that seed arrives,
//! then deciphers every block before decoding.

use std::sync::Arc;

use shine_proto::{PacketCodec, PacketRecord, XOR_SEED_OPCODE, XorTable};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{Direction, FlowLabel, FlowRegistry, FrameCursor, PacketSink, Segment, TakenFrame};

/// State shared by both decoder variants.
pub(crate) struct DecoderCore {
    pub(crate) label: FlowLabel,
    pub(crate) cursor: FrameCursor,
    pub(crate) codec: Arc<PacketCodec>,
    pub(crate) sink: Arc<dyn PacketSink>,
    /// Per-direction verbose message logging from configuration.
    pub(crate) log_messages: bool,
}

impl DecoderCore {
    /// Decode one framed block and hand the record downstream.
    ///
    /// Codec failures are logged and skipped; the cursor has already
    /// advanced past the block, so one bad message never stalls the flow.
    fn decode_and_dispatch(&self, frame: &TakenFrame) -> Option<PacketRecord> {
        match self.codec.decode(frame.class, frame.length, &frame.block) {
            Ok(packet) => {
                if self.log_messages {
                    debug!(
                        flow = %self.label,
                        op = packet.operation_code,
                        name = packet.name.as_deref().unwrap_or("?"),
                        size = packet.data.len(),
                        "decoded message"
                    );
                }
                self.sink.deliver(&self.label, &packet);
                Some(packet)
            },
            Err(error) => {
                warn!(flow = %self.label, %error, "dropping undecodable message");
                None
            },
        }
    }
}

/// Decoder for the cleartext server→client direction.
pub(crate) struct ServerDecoder {
    pub(crate) core: DecoderCore,
    pub(crate) registry: Arc<FlowRegistry>,
    /// Latches on the first seed announcement; later ones are ordinary
    /// messages.
    pub(crate) key_found: bool,
}

impl ServerDecoder {
    pub(crate) async fn run(
        mut self,
        mut segments: mpsc::Receiver<Segment>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                segment = segments.recv() => match segment {
                    Some(segment) => self.core.cursor.extend(&segment.data),
                    None => break,
                },
            }
            self.drain();
        }

        self.registry.remove(Direction::ServerToClient, &self.core.label.src, self.core.label.id);
        debug!(flow = %self.core.label, "decoder stopped");
    }

    fn drain(&mut self) {
        while let Some(frame) = self.core.cursor.take_frame() {
            if let Some(packet) = self.core.decode_and_dispatch(&frame) {
                self.sync_keystream(&packet);
            }
        }
    }

    /// Recover the keystream seed from the first seed announcement and hand
    /// it to the paired client→server decoder.
    ///
    /// The pair is registered under this flow's *destination* endpoint: the
    /// server→client destination is the client endpoint, which is exactly
    /// the source key the paired decoder registered with. A missing pair is
    /// logged by the registry and the seed is dropped.
    fn sync_keystream(&mut self, packet: &PacketRecord) {
        if self.key_found || packet.operation_code != XOR_SEED_OPCODE {
            return;
        }
        self.key_found = true;

        match packet.data.first_chunk::<2>() {
            Some(&[lo, hi]) => {
                let seed = u16::from_le_bytes([lo, hi]);
                self.registry.deliver_key(&self.core.label.dst, seed);
            },
            None => {
                warn!(
                    flow = %self.core.label,
                    size = packet.data.len(),
                    "seed announcement too short"
                );
            },
        }
    }
}

/// Decoder for the XOR-ciphered client→server direction.
pub(crate) struct ClientDecoder {
    pub(crate) core: DecoderCore,
    pub(crate) registry: Arc<FlowRegistry>,
    pub(crate) cipher: Arc<XorTable>,
    /// Current keystream position; `None` until the paired flow delivers
    /// the seed, and nothing is framed before then.
    pub(crate) xor_offset: Option<u16>,
}

impl ClientDecoder {
    pub(crate) async fn run(
        mut self,
        mut segments: mpsc::Receiver<Segment>,
        mut key_rx: oneshot::Receiver<u16>,
        cancel: CancellationToken,
    ) {
        // Disabled once resolved either way; a closed channel means the
        // paired decoder died keyless and this flow can only buffer.
        let mut key_pending = true;

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                segment = segments.recv() => match segment {
                    Some(segment) => self.core.cursor.extend(&segment.data),
                    None => break,
                },
                seed = &mut key_rx, if key_pending => {
                    key_pending = false;
                    match seed {
                        Ok(seed) => {
                            debug!(flow = %self.core.label, seed, "keystream synchronized");
                            self.xor_offset = Some(seed);
                        },
                        Err(_) => {
                            warn!(flow = %self.core.label, "key channel closed without a seed");
                        },
                    }
                },
            }
            self.drain();
        }

        self.registry.remove(Direction::ClientToServer, &self.core.label.src, self.core.label.id);
        debug!(flow = %self.core.label, "decoder stopped");
    }

    /// Frame, decipher and dispatch buffered messages.
    ///
    /// No byte is consumed before the keystream position is known, and each
    /// consumed block is XORed exactly once: the copied block is
    /// transformed, never the buffered stream bytes, so a message split
    /// across segments cannot be deciphered twice.
    fn drain(&mut self) {
        let Some(mut offset) = self.xor_offset else {
            return;
        };

        while let Some(mut frame) = self.core.cursor.take_frame() {
            self.cipher.apply(&mut frame.block, &mut offset);
            self.core.decode_and_dispatch(&frame);
        }

        self.xor_offset = Some(offset);
    }
}
