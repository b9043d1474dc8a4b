//! The topology handler: bulk reconciliation driven by cluster membership
//! events.

use std::collections::HashSet;
use std::sync::Arc;

use crate::node::NodeId;
use crate::occupant::Occupant;
use crate::store::DualIndexStore;

/// Reacts to cluster membership events by rewriting the store and handing
/// back the set of occupants that disappeared, for the caller to turn into
/// "has left" presence for locally-connected observers.
pub struct TopologyHandler<N: NodeId> {
    store: Arc<DualIndexStore<N>>,
}

impl<N: NodeId> TopologyHandler<N> {
    pub fn new(store: Arc<DualIndexStore<N>>) -> Self {
        Self { store }
    }

    /// A remote node left the cluster.
    pub fn node_left(&self, node: &N) -> HashSet<Occupant> {
        let removed = self.store.node_left(node);
        if !removed.is_empty() {
            tracing::info!(node = ?node, count = removed.len(), "node left: occupants removed");
        }
        removed
    }

    /// The local node was severed from the cluster (split-brain).
    pub fn local_detached(&self, local_node: &N) -> HashSet<Occupant> {
        let lost = self.store.local_detached(local_node);
        if !lost.is_empty() {
            tracing::warn!(count = lost.len(), "local node detached: occupants lost");
        }
        lost
    }
}
