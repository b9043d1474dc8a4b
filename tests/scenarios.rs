//! End-to-end coverage of the registry facade's six presence scenarios,
//! run against an in-memory `ClusterLayer` that loops tasks straight back
//! to a second registry instance to exercise real cross-node apply.

use std::sync::{Arc, Mutex};

use occupant_registry::{
    ClusterLayer, DispatchError, MucEvent, OccupantRegistry, RegistryConfig, RoomAddress, Task,
};

/// A cluster layer that hands dispatched tasks straight to every other
/// registered peer's `apply_task`, synchronously, so tests can assert on
/// cross-node state without a real network.
struct LoopbackCluster {
    node: String,
    peers: Mutex<Vec<Arc<OccupantRegistry<String>>>>,
}

impl LoopbackCluster {
    fn new(node: &str) -> Arc<Self> {
        Arc::new(Self {
            node: node.to_string(),
            peers: Mutex::new(Vec::new()),
        })
    }

    fn register_peer(&self, peer: Arc<OccupantRegistry<String>>) {
        self.peers.lock().unwrap().push(peer);
    }
}

impl ClusterLayer<String> for LoopbackCluster {
    fn local_node(&self) -> String {
        self.node.clone()
    }

    fn dispatch_sync(&self, task: Task<String>) -> Result<(), DispatchError> {
        for peer in self.peers.lock().unwrap().iter() {
            peer.apply_task(&task);
        }
        Ok(())
    }

    fn dispatch_async(&self, task: Task<String>) {
        let _ = self.dispatch_sync(task);
    }
}

const SERVICE: &str = "conference.example.org";

fn two_node_cluster() -> (Arc<OccupantRegistry<String>>, Arc<OccupantRegistry<String>>) {
    let cluster_a = LoopbackCluster::new("A");
    let cluster_b = LoopbackCluster::new("B");
    let config = RegistryConfig::default();

    let registry_a = Arc::new(OccupantRegistry::new(SERVICE, cluster_a.clone(), &config));
    let registry_b = Arc::new(OccupantRegistry::new(SERVICE, cluster_b.clone(), &config));

    cluster_a.register_peer(registry_b.clone());
    cluster_b.register_peer(registry_a.clone());

    (registry_a, registry_b)
}

fn room(name: &str) -> RoomAddress {
    RoomAddress::new(name, SERVICE)
}

#[test]
fn scenario_1_join_replicates_to_peer() {
    let (a, b) = two_node_cluster();

    a.handle_muc_event(MucEvent::OccupantJoined {
        room: room("r1"),
        nickname: "a1".into(),
        real_address: "alice@ex".into(),
    });

    assert_eq!(a.room_names_for_address("alice@ex"), ["r1".to_string()].into());
    assert_eq!(a.number_of_unique_users(), 1);
    assert_eq!(b.number_of_unique_users(), 1);
    assert_eq!(b.room_names_for_address("alice@ex"), ["r1".to_string()].into());
}

#[test]
fn scenario_2_rename_replicates_identity_change() {
    let (a, b) = two_node_cluster();
    a.handle_muc_event(MucEvent::OccupantJoined {
        room: room("r1"),
        nickname: "a1".into(),
        real_address: "alice@ex".into(),
    });
    a.handle_muc_event(MucEvent::NicknameChanged {
        room: room("r1"),
        old_nickname: "a1".into(),
        new_nickname: "a2".into(),
        real_address: "alice@ex".into(),
    });

    let local = a.local_occupants();
    assert_eq!(local.len(), 1);
    let occ = local.iter().next().unwrap();
    assert_eq!((occ.room(), occ.nickname(), occ.real_address()), ("r1", "a2", "alice@ex"));

    let on_b = b.occupants_for_room_by_node("r1", &"A".to_string());
    assert_eq!(on_b.len(), 1);
    assert_eq!(on_b[0].nickname(), "a2");
}

#[test]
fn scenario_3_node_left_removes_only_that_nodes_occupants() {
    let (a, b) = two_node_cluster();
    a.handle_muc_event(MucEvent::OccupantJoined {
        room: room("r1"),
        nickname: "a1".into(),
        real_address: "alice@ex".into(),
    });
    b.handle_muc_event(MucEvent::OccupantJoined {
        room: room("r1"),
        nickname: "b1".into(),
        real_address: "bob@ex".into(),
    });

    let removed = a.node_left(&"B".to_string());
    assert_eq!(removed.len(), 1);
    assert_eq!(removed.iter().next().unwrap().nickname(), "b1");

    assert!(!a.exists(&occupant_registry::Occupant::new("r1", "b1", "bob@ex"), None));
    assert!(a.exists(&occupant_registry::Occupant::new("r1", "a1", "alice@ex"), None));
}

#[test]
fn scenario_4_nickname_kick_fans_out_across_nodes() {
    // A three-node mesh where every node relays directly to the other two,
    // so a join on any node is visible everywhere before the kick fires.
    let cluster_a = LoopbackCluster::new("A");
    let cluster_b = LoopbackCluster::new("B");
    let cluster_c = LoopbackCluster::new("C");
    let config = RegistryConfig::default();

    let a = Arc::new(OccupantRegistry::new(SERVICE, cluster_a.clone(), &config));
    let b = Arc::new(OccupantRegistry::new(SERVICE, cluster_b.clone(), &config));
    let c = Arc::new(OccupantRegistry::new(SERVICE, cluster_c.clone(), &config));

    cluster_a.register_peer(b.clone());
    cluster_a.register_peer(c.clone());
    cluster_b.register_peer(a.clone());
    cluster_b.register_peer(c.clone());
    cluster_c.register_peer(a.clone());
    cluster_c.register_peer(b.clone());

    a.handle_muc_event(MucEvent::OccupantJoined {
        room: room("r2"),
        nickname: "dup".into(),
        real_address: "alice@ex".into(),
    });
    b.handle_muc_event(MucEvent::OccupantJoined {
        room: room("r2"),
        nickname: "dup".into(),
        real_address: "bob@ex".into(),
    });
    c.handle_muc_event(MucEvent::OccupantJoined {
        room: room("r2"),
        nickname: "dup".into(),
        real_address: "carol@ex".into(),
    });

    assert_eq!(a.number_of_unique_users(), 3);

    a.handle_muc_event(MucEvent::NicknameKicked {
        room: room("r2"),
        nickname: "dup".into(),
    });

    assert!(a.room_names_for_address("alice@ex").is_empty());
    assert!(a.room_names_for_address("bob@ex").is_empty());
    assert!(a.room_names_for_address("carol@ex").is_empty());
    assert_eq!(a.number_of_unique_users(), 0);

    // The kick was only applied on A; B and C apply their own kick locally
    // in the real deployment once their own event sink fires. This test
    // only exercises A's local fan-out across every node it knows about.
}

#[test]
fn scenario_5_local_detach_preserves_local_and_reports_lost() {
    let (a, b) = two_node_cluster();
    a.handle_muc_event(MucEvent::OccupantJoined {
        room: room("r1"),
        nickname: "a1".into(),
        real_address: "alice@ex".into(),
    });
    b.handle_muc_event(MucEvent::OccupantJoined {
        room: room("r1"),
        nickname: "b1".into(),
        real_address: "bob@ex".into(),
    });
    a.apply_task(&Task::Added {
        service: SERVICE.into(),
        room: "r2".into(),
        nickname: "a1".into(),
        real_address: "alice@ex".into(),
        origin: "C".into(),
    });

    let before = a.local_occupants();
    let lost = a.local_detached();

    assert_eq!(lost.len(), 2);
    assert_eq!(a.local_occupants(), before);
    assert_eq!(a.nodes_by_occupant().len(), 1);
}

#[test]
fn scenario_6_peer_snapshot_overwrites_nodes_contents() {
    let (a, b) = two_node_cluster();
    b.handle_muc_event(MucEvent::OccupantJoined {
        room: room("r1"),
        nickname: "b1".into(),
        real_address: "bob@ex".into(),
    });

    a.apply_task(&Task::PeerSnapshot {
        occupants: vec![
            occupant_registry::OccupantRecord::new("r1", "b1", "bob@ex"),
            occupant_registry::OccupantRecord::new("r3", "b2", "bob@ex"),
        ],
        origin: "B".into(),
    });

    let on_b = a.occupants_for_room_by_node("r3", &"B".to_string());
    assert_eq!(on_b.len(), 1);
    assert_eq!(a.occupants_by_node().get(&"B".to_string()).map(|s| s.len()), Some(2));

    // A's own entries are untouched by a snapshot scoped to B.
    assert_eq!(a.local_occupants().len(), 0);
}
