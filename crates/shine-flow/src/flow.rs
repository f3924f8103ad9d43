//! Flow identity: endpoints, direction and labels.

use std::{fmt, net::IpAddr, sync::Arc};

/// One TCP endpoint, the unit the flow registry indexes by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowKey {
    /// Endpoint address.
    pub ip: IpAddr,
    /// Endpoint port.
    pub port: u16,
}

impl FlowKey {
    /// Create a flow key.
    #[must_use]
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self { ip, port }
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// Which way a flow carries bytes.
///
/// A flow sourced from a registered service port runs server→client; a flow
/// aimed at one runs client→server. A flow matching neither has no decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Cleartext direction; carries the keystream seed announcement.
    ServerToClient,
    /// XOR-ciphered direction; blocked until the seed arrives.
    ClientToServer,
}

/// Identity of one live flow, carried for logging and correlation.
#[derive(Debug, Clone)]
pub struct FlowLabel {
    /// Opaque unique id.
    pub id: u64,
    /// `"<service>-client"` or `"client-<service>"`.
    pub name: Arc<str>,
    /// Source endpoint (the registry key for this flow's decoder).
    pub src: FlowKey,
    /// Destination endpoint (the registry key of the paired flow).
    pub dst: FlowKey,
    /// Decode direction.
    pub direction: Direction,
}

impl fmt::Display for FlowLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_displays_as_endpoint() {
        let key = FlowKey::new("1.2.3.4".parse().unwrap(), 9000);
        assert_eq!(key.to_string(), "1.2.3.4:9000");
    }

    #[test]
    fn label_displays_name_and_id() {
        let label = FlowLabel {
            id: 7,
            name: Arc::from("Login-client"),
            src: FlowKey::new("1.2.3.4".parse().unwrap(), 9010),
            dst: FlowKey::new("5.6.7.8".parse().unwrap(), 54321),
            direction: Direction::ServerToClient,
        };
        assert_eq!(label.to_string(), "Login-client#7");
    }
}
