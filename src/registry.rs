//! The facade tying the dual-index store, event sink, task applier,
//! topology handler, and query surface together into one registry
//! instance per MUC service.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::applier::TaskApplier;
use crate::cluster::ClusterLayer;
use crate::config::{BroadcastMode, RegistryConfig};
use crate::event_sink::{EventSink, MucEvent};
use crate::node::NodeId;
use crate::occupant::Occupant;
use crate::store::DualIndexStore;
use crate::task::Task;
use crate::telemetry::dispatch_span;
use crate::topology::TopologyHandler;

/// One registry instance per MUC service, identified by `service_domain`.
pub struct OccupantRegistry<N: NodeId> {
    service_domain: String,
    local_node: N,
    store: Arc<DualIndexStore<N>>,
    event_sink: EventSink<N>,
    applier: TaskApplier<N>,
    topology: TopologyHandler<N>,
    cluster: Arc<dyn ClusterLayer<N>>,
    broadcast_mode: BroadcastMode,
}

impl<N: NodeId> OccupantRegistry<N> {
    pub fn new(service_domain: impl Into<String>, cluster: Arc<dyn ClusterLayer<N>>, config: &RegistryConfig) -> Self {
        let service_domain = service_domain.into();
        let local_node = cluster.local_node();
        let store = Arc::new(DualIndexStore::new());

        Self {
            event_sink: EventSink::new(service_domain.clone(), local_node.clone(), store.clone()),
            applier: TaskApplier::new(store.clone()),
            topology: TopologyHandler::new(store.clone()),
            broadcast_mode: BroadcastMode::from(config),
            service_domain,
            local_node,
            store,
            cluster,
        }
    }

    pub fn service_domain(&self) -> &str {
        &self.service_domain
    }

    pub fn local_node(&self) -> &N {
        &self.local_node
    }

    pub fn broadcast_mode(&self) -> &BroadcastMode {
        &self.broadcast_mode
    }

    // ---- MUC event interface ---------------------------------------------

    /// Handle a local MUC callback: apply the local mutation, then
    /// broadcast the same mutation to peers. Local mutation always
    /// precedes broadcast so a synchronous broadcast blocking on a slow
    /// peer never delays local state becoming queryable.
    pub fn handle_muc_event(&self, event: MucEvent) {
        if let Some(task) = self.event_sink.handle(event) {
            self.broadcast(task);
        }
    }

    fn broadcast(&self, task: Task<N>) {
        let kind = task.kind();
        let service = task.service().unwrap_or(&self.service_domain).to_string();
        let _span = dispatch_span(kind, &service).entered();

        if self.broadcast_mode.is_nonblocking() {
            self.cluster.dispatch_async(task);
        } else if let Err(err) = self.cluster.dispatch_sync(task) {
            tracing::warn!(
                error = %err,
                "broadcast failed; local mutation already applied, peer reconciles via next snapshot"
            );
        }
    }

    // ---- task applier ------------------------------------------------------

    /// Apply a task arriving from a peer (or replay one of our own).
    pub fn apply_task(&self, task: &Task<N>) {
        self.applier.apply(task);
    }

    // ---- topology handler --------------------------------------------------

    pub fn node_left(&self, node: &N) -> HashSet<Occupant> {
        self.topology.node_left(node)
    }

    pub fn local_detached(&self) -> HashSet<Occupant> {
        self.topology.local_detached(&self.local_node)
    }

    // ---- query surface -------------------------------------------------

    pub fn room_names_for_address(&self, real_address: &str) -> HashSet<String> {
        self.store.room_names_for_address(real_address)
    }

    pub fn local_occupants(&self) -> HashSet<Occupant> {
        self.store.local_occupants(&self.local_node)
    }

    pub fn register_activity(&self, real_address: &str, now_millis: i64) {
        self.store.register_activity(&self.local_node, real_address, now_millis);
    }

    pub fn last_activity_on_local_node(&self, real_address: &str) -> Option<i64> {
        self.store.last_activity_on_local_node(&self.local_node, real_address)
    }

    pub fn number_of_unique_users(&self) -> usize {
        self.store.number_of_unique_users()
    }

    pub fn exists(&self, occ: &Occupant, exclude_node: Option<&N>) -> bool {
        self.store.exists(occ, exclude_node)
    }

    pub fn occupants_for_room_by_node(&self, room: &str, node: &N) -> Vec<Occupant> {
        self.store.occupants_for_room_by_node(room, node)
    }

    pub fn occupants_for_room_except_for_node(&self, room: &str, exclude_node: &N) -> Vec<Occupant> {
        self.store.occupants_for_room_except_for_node(room, exclude_node)
    }

    pub fn occupants_by_node(&self) -> HashMap<N, HashSet<Occupant>> {
        self.store.occupants_by_node_snapshot()
    }

    pub fn nodes_by_occupant(&self) -> HashMap<Occupant, HashSet<N>> {
        self.store.nodes_by_occupant_snapshot()
    }
}
