//! Service registry: which TCP ports belong to which game service.
//!
//! Flow direction classification rests on this map: a packet sourced from
//! a service port travels server→client, everything else client→server.
//! The map is built once at boot and read-only afterwards, so lookups take
//! no lock.

use std::{collections::HashMap, ops::RangeInclusive, sync::Arc};

/// Port range the game servers listen in.
pub const SERVICE_PORTS: RangeInclusive<u16> = 9000..=9600;

/// One named service endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    /// TCP port the service listens on.
    pub port: u16,
    /// Service name used in flow labels.
    pub name: String,
}

impl Service {
    /// Create a service entry.
    #[must_use]
    pub fn new(port: u16, name: impl Into<String>) -> Self {
        Self { port, name: name.into() }
    }
}

/// Immutable port → service-name map.
#[derive(Debug, Clone)]
pub struct ServiceMap {
    by_port: HashMap<u16, Arc<str>>,
}

impl ServiceMap {
    /// Build a map from explicit entries, replacing the defaults wholesale.
    #[must_use]
    pub fn new(services: impl IntoIterator<Item = Service>) -> Self {
        let by_port = services
            .into_iter()
            .map(|service| (service.port, Arc::from(service.name.as_str())))
            .collect();

        Self { by_port }
    }

    /// Service name registered for `port`.
    #[must_use]
    pub fn name(&self, port: u16) -> Option<Arc<str>> {
        self.by_port.get(&port).cloned()
    }

    /// `true` if `port` belongs to a known service.
    #[must_use]
    pub fn is_service_port(&self, port: u16) -> bool {
        self.by_port.contains_key(&port)
    }

    /// Number of registered services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_port.len()
    }

    /// `true` if no services are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_port.is_empty()
    }
}

impl Default for ServiceMap {
    /// The stock deployment layout of a Shine server cluster.
    fn default() -> Self {
        Self::new([
            Service::new(9000, "Account"),
            Service::new(9010, "Login"),
            Service::new(9110, "WorldManager"),
            Service::new(9210, "Zone00"),
            Service::new(9212, "Zone01"),
            Service::new(9214, "Zone02"),
            Service::new(9216, "Zone03"),
            Service::new(9218, "Zone04"),
            Service::new(9311, "AccountLog"),
            Service::new(9411, "Character"),
            Service::new(9511, "GameLog"),
        ])
    }
}
