//! Live capture driver.

use std::time::{Duration, SystemTime};

use pnet::datalink::{self, Channel};
use shine_flow::StreamFactory;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{CaptureFilter, TcpReassembler};

/// How long one read may block before the cancellation token is rechecked.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Capture driver configuration.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Interface name to capture on.
    pub interface: String,
    /// Read buffer size, the datalink equivalent of a snap length.
    pub snaplen: usize,
    /// Traffic filter.
    pub filter: CaptureFilter,
}

/// Errors that abort capture startup.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// The configured interface does not exist on this host.
    #[error("capture interface {0:?} not found")]
    InterfaceNotFound(String),

    /// The interface produced a non-ethernet channel.
    #[error("datalink channel on {interface:?} is not ethernet")]
    UnsupportedChannel {
        /// Interface name from configuration.
        interface: String,
    },

    /// The datalink channel could not be opened (typically a permissions
    /// problem).
    #[error("failed to open capture on {interface:?}: {source}")]
    ChannelOpen {
        /// Interface name from configuration.
        interface: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Pumps captured packets into a [`TcpReassembler`] until cancelled.
pub struct CaptureDriver;

impl CaptureDriver {
    /// Run the capture loop on the calling thread.
    ///
    /// Blocks until `cancel` fires; meant for a dedicated capture thread
    /// next to the runtime the decoders live on. Packets are stamped at
    /// receipt and handed to the reassembler, which creates and feeds the
    /// per-flow decoders through `factory`.
    ///
    /// # Errors
    ///
    /// [`CaptureError`] when the interface is missing or the channel cannot
    /// be opened; fatal at boot, while per-packet problems are only logged.
    pub fn run<F: StreamFactory>(
        config: &CaptureConfig,
        factory: F,
        cancel: &CancellationToken,
    ) -> Result<(), CaptureError> {
        let interface = datalink::interfaces()
            .into_iter()
            .find(|candidate| candidate.name == config.interface)
            .ok_or_else(|| CaptureError::InterfaceNotFound(config.interface.clone()))?;

        let channel_config = datalink::Config {
            read_buffer_size: config.snaplen,
            read_timeout: Some(POLL_INTERVAL),
            promiscuous: true,
            ..datalink::Config::default()
        };

        let mut rx = match datalink::channel(&interface, channel_config) {
            Ok(Channel::Ethernet(_tx, rx)) => rx,
            Ok(_) => {
                return Err(CaptureError::UnsupportedChannel {
                    interface: config.interface.clone(),
                });
            },
            Err(source) => {
                return Err(CaptureError::ChannelOpen {
                    interface: config.interface.clone(),
                    source,
                });
            },
        };

        info!(
            interface = %config.interface,
            snaplen = config.snaplen,
            filter = %config.filter.expression(),
            "capture started"
        );

        let mut reassembler = TcpReassembler::new(factory, config.filter.clone());

        while !cancel.is_cancelled() {
            match rx.next() {
                Ok(frame) => reassembler.process_ethernet(frame, SystemTime::now()),
                // Timeouts are just the cancellation poll tick
                Err(error)
                    if matches!(
                        error.kind(),
                        std::io::ErrorKind::TimedOut
                            | std::io::ErrorKind::WouldBlock
                            | std::io::ErrorKind::Interrupted
                    ) => {},
                Err(error) => warn!(%error, "capture read failed"),
            }
        }

        info!(flows = reassembler.flow_count(), "capture stopped");
        Ok(())
    }
}
