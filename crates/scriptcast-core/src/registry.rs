//! Authoritative set of live target connections, keyed by port.
//!
//! Mutated from two directions: the scanner merges freshly-opened
//! connections in batches, and close events remove single ports. Every
//! mutation that actually changes membership emits one [`RegistryChange`]
//! on the feed handed out by [`Registry::new`]; no-op mutations stay
//! silent.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::connection::Connection;

/// Membership change notification, consumed by whatever surface presents
/// the available targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryChange {
    /// Ports newly connected by one scan cycle (a single event per batch)
    Added(Vec<u16>),
    /// A live connection closed and was deregistered
    Removed(u16),
    /// Bulk teardown dropped every connection
    Cleared,
}

/// Port-keyed connection set
#[derive(Debug)]
pub struct Registry {
    connections: HashMap<u16, Connection>,
    changes: mpsc::UnboundedSender<RegistryChange>,
}

impl Registry {
    /// Create a registry plus the receiving end of its change feed.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RegistryChange>) {
        let (changes, changes_rx) = mpsc::unbounded_channel();
        (
            Self {
                connections: HashMap::new(),
                changes,
            },
            changes_rx,
        )
    }

    /// Merge a batch of freshly-opened connections.
    ///
    /// A port already present keeps its existing connection and the
    /// incoming duplicate is dropped. Fires a single `Added` event for the
    /// whole batch, and only if membership actually grew. Returns the
    /// number of connections added.
    pub fn add(&mut self, batch: Vec<Connection>) -> usize {
        let mut added = Vec::new();
        for conn in batch {
            let port = conn.port();
            if self.connections.contains_key(&port) {
                debug!("[{port}] already registered, dropping duplicate");
                continue;
            }
            self.connections.insert(port, conn);
            added.push(port);
        }

        if added.is_empty() {
            return 0;
        }

        added.sort_unstable();
        info!("targets connected: {added:?}");
        let count = added.len();
        let _ = self.changes.send(RegistryChange::Added(added));
        count
    }

    /// Deregister a port.
    ///
    /// Fires `Removed` only if the port was present; removing an absent
    /// port is a silent no-op. Returns whether membership changed.
    pub fn remove(&mut self, port: u16) -> bool {
        if self.connections.remove(&port).is_none() {
            return false;
        }
        info!("[{port}] target deregistered");
        let _ = self.changes.send(RegistryChange::Removed(port));
        true
    }

    #[must_use]
    pub fn contains(&self, port: u16) -> bool {
        self.connections.contains_key(&port)
    }

    #[must_use]
    pub fn get(&self, port: u16) -> Option<&Connection> {
        self.connections.get(&port)
    }

    /// Every registered connection, in registry iteration order.
    pub fn all(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Registered ports in ascending order.
    #[must_use]
    pub fn ports(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self.connections.keys().copied().collect();
        ports.sort_unstable();
        ports
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Tear down every connection, flushing queued frames first.
    ///
    /// Fires a single `Cleared` event if anything was dropped.
    pub async fn clear(&mut self) {
        if self.connections.is_empty() {
            return;
        }
        for (_, conn) in self.connections.drain() {
            conn.shutdown().await;
        }
        let _ = self.changes.send(RegistryChange::Cleared);
    }
}
