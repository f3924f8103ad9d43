//! Process-wide table of live flow decoders.
//!
//! The registry exists so that a key-discovery event observed in one
//! direction can signal the paired decoder in the opposite direction of the
//! same connection. Both direction tables sit behind a single mutex; the
//! only work ever done under the lock is map maintenance and the
//! non-blocking send on a one-shot key channel.

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::{Direction, FlowKey};

struct RegisteredFlow {
    flow_id: u64,
    /// Single-slot keystream seed channel; populated for client→server
    /// flows only and taken on first delivery.
    key_slot: Option<oneshot::Sender<u16>>,
}

#[derive(Default)]
struct Tables {
    to_client: HashMap<FlowKey, RegisteredFlow>,
    from_client: HashMap<FlowKey, RegisteredFlow>,
}

impl Tables {
    fn table(&mut self, direction: Direction) -> &mut HashMap<FlowKey, RegisteredFlow> {
        match direction {
            Direction::ServerToClient => &mut self.to_client,
            Direction::ClientToServer => &mut self.from_client,
        }
    }
}

/// Live decoders keyed by their source endpoint, split per direction.
///
/// Every live decoder is reachable via exactly one of the two tables; an
/// entry is inserted by the factory at flow creation and removed by the
/// decoder itself on termination.
#[derive(Default)]
pub struct FlowRegistry {
    inner: Mutex<Tables>,
}

impl FlowRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a decoder under its source endpoint.
    ///
    /// `key_slot` carries the seed sender for client→server flows. An
    /// existing entry under the same key belongs to a dead connection that
    /// reused the endpoint; it is replaced with a warning.
    pub(crate) fn insert(
        &self,
        direction: Direction,
        key: FlowKey,
        flow_id: u64,
        key_slot: Option<oneshot::Sender<u16>>,
    ) {
        let mut tables = self.lock();
        if let Some(stale) = tables.table(direction).insert(key, RegisteredFlow { flow_id, key_slot })
        {
            warn!(%key, stale_flow = stale.flow_id, flow = flow_id, "replaced stale flow entry");
        }
    }

    /// Drop the entry for `key` if it still belongs to `flow_id`.
    ///
    /// The id guard keeps a slow-exiting decoder from evicting a newer flow
    /// that reused its endpoint. Returns whether an entry was removed.
    pub(crate) fn remove(&self, direction: Direction, key: &FlowKey, flow_id: u64) -> bool {
        let mut tables = self.lock();
        let table = tables.table(direction);

        match table.get(key) {
            Some(entry) if entry.flow_id == flow_id => {
                table.remove(key);
                true
            },
            _ => false,
        }
    }

    /// Deliver the keystream seed to the client→server decoder registered
    /// under `client`.
    ///
    /// Returns `false` (with a warning, never an error) when no paired
    /// flow is registered or its slot was already used; the seed is dropped.
    pub fn deliver_key(&self, client: &FlowKey, seed: u16) -> bool {
        let mut tables = self.lock();

        let Some(entry) = tables.from_client.get_mut(client) else {
            warn!(%client, seed, "no paired client flow for keystream seed");
            return false;
        };

        let Some(sender) = entry.key_slot.take() else {
            warn!(%client, seed, "paired client flow already received a seed");
            return false;
        };

        if sender.send(seed).is_err() {
            warn!(%client, seed, "paired client decoder stopped before the seed arrived");
            return false;
        }

        debug!(%client, seed, flow = entry.flow_id, "keystream seed delivered");
        true
    }

    /// Number of live decoders per direction: `(to_client, from_client)`.
    #[must_use]
    pub fn flow_counts(&self) -> (usize, usize) {
        let tables = self.lock();
        (tables.to_client.len(), tables.from_client.len())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
