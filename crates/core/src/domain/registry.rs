//! Device node registry with bounded-wait lookup
//!
//! The registry is the only synchronization point between the node watcher
//! and the selection engine. A USB device is usually reported before the
//! kernel has created its nodes, so the engine blocks in [`NodeRegistry::await_node`]
//! until the watcher inserts the node or the deadline passes.

use std::collections::HashMap;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, error, trace, warn};

use super::node::{parse_node_name, DeviceNode, NodeEvent, NodeKind};

/// Node name to record map guarded by a mutex, with a condition variable
/// signalled on every insertion.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: Mutex<HashMap<String, DeviceNode>>,
    node_added: Condvar,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, DeviceNode>> {
        self.nodes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a parsed node and wake every waiter
    ///
    /// A name that is already present keeps its first record, so a name maps
    /// to one `(kind, card, device)` triple for as long as it is registered.
    /// Returns whether the node was inserted.
    pub fn insert(&self, node: DeviceNode) -> bool {
        let mut nodes = self.lock();
        if nodes.contains_key(&node.name) {
            trace!(name = %node.name, "Node already registered");
            return false;
        }
        debug!(node = %node, "Adding ALSA device node");
        nodes.insert(node.name.clone(), node);
        self.node_added.notify_all();
        true
    }

    /// Remove a node by name; unknown names are ignored
    pub fn remove(&self, name: &str) -> Option<DeviceNode> {
        let removed = self.lock().remove(name);
        if let Some(node) = &removed {
            debug!(node = %node, "ALSA device node removed");
        }
        removed
    }

    /// Apply a create/delete event coming from the node directory
    ///
    /// Malformed stream names are logged and dropped without touching the map.
    pub fn apply(&self, event: &NodeEvent) {
        match event {
            NodeEvent::Created(name) => match parse_node_name(name) {
                Ok(Some(node)) => {
                    self.insert(node);
                }
                Ok(None) => trace!(name = %name, "Ignoring non-stream node"),
                Err(e) => error!(name = %name, error = %e, "Could not parse ALSA node name"),
            },
            NodeEvent::Deleted(name) => {
                self.remove(name);
            }
        }
    }

    /// Look up a node without waiting
    pub fn find(&self, card: u32, device: u32, kind: NodeKind) -> Option<DeviceNode> {
        self.lock()
            .values()
            .find(|node| node.matches(card, device, kind))
            .cloned()
    }

    /// Wait up to `timeout` for the `(card, device, kind)` node to exist
    ///
    /// Returns immediately when the node is already registered. The deadline
    /// is checked after every wakeup, so spurious wakeups never extend the wait.
    pub fn await_node(
        &self,
        card: u32,
        device: u32,
        kind: NodeKind,
        timeout: Duration,
    ) -> Option<DeviceNode> {
        let deadline = Instant::now() + timeout;
        let mut nodes = self.lock();

        loop {
            if let Some(node) = nodes.values().find(|n| n.matches(card, device, kind)) {
                return Some(node.clone());
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }

            let (guard, _) = self
                .node_added
                .wait_timeout(nodes, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            nodes = guard;
        }

        warn!(card, device, %kind, ?timeout, "Timed out waiting for ALSA device node");
        None
    }

    /// Snapshot of registered nodes, sorted by name
    pub fn nodes(&self) -> Vec<DeviceNode> {
        let mut nodes: Vec<DeviceNode> = self.lock().values().cloned().collect();
        nodes.sort_by(|a, b| a.name.cmp(&b.name));
        nodes
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
