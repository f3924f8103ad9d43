//! Capture traffic filter.

use std::{net::IpAddr, ops::RangeInclusive};

use shine_flow::FlowKey;

/// Keeps only traffic between the game server and its service ports.
///
/// The predicate is the in-process equivalent of the classic BPF filter
/// `(dst net S or src net S) and (dst portrange A-B or src portrange A-B)`;
/// [`CaptureFilter::expression`] renders exactly that string so the running
/// filter can be compared against a tcpdump invocation.
#[derive(Debug, Clone)]
pub struct CaptureFilter {
    server_ip: IpAddr,
    ports: RangeInclusive<u16>,
}

impl CaptureFilter {
    /// Create a filter for one server address and its port range.
    #[must_use]
    pub fn new(server_ip: IpAddr, ports: RangeInclusive<u16>) -> Self {
        Self { server_ip, ports }
    }

    /// `true` if a packet between these endpoints should be processed.
    #[must_use]
    pub fn matches(&self, src: FlowKey, dst: FlowKey) -> bool {
        let server = src.ip == self.server_ip || dst.ip == self.server_ip;
        let service = self.ports.contains(&src.port) || self.ports.contains(&dst.port);
        server && service
    }

    /// The equivalent BPF expression, for the startup log.
    #[must_use]
    pub fn expression(&self) -> String {
        let ip = self.server_ip;
        let (a, b) = (self.ports.start(), self.ports.end());
        format!(
            "(dst net {ip} or src net {ip}) and (dst portrange {a}-{b} or src portrange {a}-{b})"
        )
    }
}
