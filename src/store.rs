//! The dual-index store: the one place both indices are ever mutated.
//!
//! `occupants_by_node` and `nodes_by_occupant` are a cache of one another.
//! Every pair-preserving mutation funnels through `replace`; nothing else
//! in this crate reaches into the indices directly.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;

use crate::error::InvariantViolation;
use crate::node::NodeId;
use crate::occupant::Occupant;

#[derive(Default)]
struct Index<N: NodeId> {
    occupants_by_node: HashMap<N, HashMap<String, HashSet<Occupant>>>,
    nodes_by_occupant: HashMap<Occupant, HashSet<N>>,
}

/// The registry's single source of truth: both indices behind one lock.
pub struct DualIndexStore<N: NodeId> {
    inner: RwLock<Index<N>>,
}

impl<N: NodeId> Default for DualIndexStore<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: NodeId> DualIndexStore<N> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Index::default()),
        }
    }

    // ---- the one primitive mutation -----------------------------------

    /// Replace `old` with `new` on `node`. Either side may be absent
    /// (insert-only or delete-only). If `node` is absent, the operation
    /// fans out over every node currently present as a key in
    /// `occupants_by_node` — used only for nickname-collision kicks, which
    /// are nickname-scoped across the whole cluster rather than
    /// node-scoped.
    ///
    /// Both phases of a single call are observable as one atomic step: the
    /// write lock is held for the whole operation.
    pub fn replace(&self, old: Option<&Occupant>, new: Option<&Occupant>, node: Option<&N>) {
        let mut idx = self.inner.write();

        if let Some(old) = old {
            old.cancel_pending_ping();
        }

        match node {
            Some(n) => Self::replace_on_node(&mut idx, old, new, n),
            None => {
                let nodes: Vec<N> = idx.occupants_by_node.keys().cloned().collect();
                for n in &nodes {
                    Self::replace_on_node(&mut idx, old, new, n);
                }
            }
        }
    }

    fn replace_on_node(idx: &mut Index<N>, old: Option<&Occupant>, new: Option<&Occupant>, node: &N) {
        if let Some(old) = old {
            Self::delete_one(idx, old, node);
            Self::verify_pair(idx, old, node, false);
        }
        if let Some(new) = new {
            Self::insert_one(idx, new, node);
            Self::verify_pair(idx, new, node, true);
        }
    }

    fn delete_one(idx: &mut Index<N>, occ: &Occupant, node: &N) {
        let mut node_becomes_empty = false;
        if let Some(by_addr) = idx.occupants_by_node.get_mut(node) {
            if let Some(set) = by_addr.get_mut(occ.real_address()) {
                set.remove(occ);
                if set.is_empty() {
                    by_addr.remove(occ.real_address());
                }
            }
            node_becomes_empty = by_addr.is_empty();
        }
        if node_becomes_empty {
            idx.occupants_by_node.remove(node);
        }

        let mut occupant_becomes_empty = false;
        if let Some(nodes) = idx.nodes_by_occupant.get_mut(occ) {
            nodes.remove(node);
            occupant_becomes_empty = nodes.is_empty();
        }
        if occupant_becomes_empty {
            idx.nodes_by_occupant.remove(occ);
        }
    }

    fn insert_one(idx: &mut Index<N>, occ: &Occupant, node: &N) {
        idx.occupants_by_node
            .entry(node.clone())
            .or_default()
            .entry(occ.real_address().to_string())
            .or_default()
            .insert(occ.clone());
        idx.nodes_by_occupant
            .entry(occ.clone())
            .or_default()
            .insert(node.clone());
    }

    /// Cheap, targeted check that one (occupant, node) pair agrees between
    /// the two indices after a mutation touching it — O(1) amortized, so it
    /// runs unconditionally rather than only under a feature flag. The full
    /// O(n) sweep lives in `audit` for tests and operator tooling.
    fn verify_pair(idx: &Index<N>, occ: &Occupant, node: &N, expect_present: bool) {
        let forward = idx
            .occupants_by_node
            .get(node)
            .and_then(|by_addr| by_addr.get(occ.real_address()))
            .is_some_and(|set| set.contains(occ));
        let reverse = idx
            .nodes_by_occupant
            .get(occ)
            .is_some_and(|nodes| nodes.contains(node));

        if forward != reverse || forward != expect_present {
            let violation = InvariantViolation::MissingReverseEntry {
                node: format!("{node:?}"),
                occupant: format!("{occ:?}"),
            };
            if cfg!(debug_assertions) {
                panic!("occupant registry invariant violated: {violation}");
            } else {
                tracing::error!(%violation, "occupant registry invariant violated");
            }
        }
    }

    // ---- bulk topology-change primitives -------------------------------

    /// Remove every occupant held for `node` in one atomic step. Returns
    /// the removed set so the caller can synthesize "has left" presence.
    pub fn node_left(&self, node: &N) -> HashSet<Occupant> {
        let mut idx = self.inner.write();
        let removed: HashSet<Occupant> = idx
            .occupants_by_node
            .get(node)
            .map(|by_addr| by_addr.values().flatten().cloned().collect())
            .unwrap_or_default();

        for occ in &removed {
            occ.cancel_pending_ping();
            Self::delete_one(&mut idx, occ, node);
        }
        removed
    }

    /// Sever `local_node` from every other node in one atomic step.
    /// Retains the local node's own occupants, returns the occupants known
    /// elsewhere that are not also present locally (by identity), and
    /// rebuilds the reverse index from scratch against only the local
    /// node's surviving entries.
    pub fn local_detached(&self, local_node: &N) -> HashSet<Occupant> {
        let mut idx = self.inner.write();

        let local_set: HashSet<Occupant> = idx
            .occupants_by_node
            .get(local_node)
            .map(|by_addr| by_addr.values().flatten().cloned().collect())
            .unwrap_or_default();

        let mut lost = HashSet::new();
        for (node, by_addr) in idx.occupants_by_node.iter() {
            if node == local_node {
                continue;
            }
            for occ in by_addr.values().flatten() {
                if !local_set.contains(occ) {
                    occ.cancel_pending_ping();
                    lost.insert(occ.clone());
                }
            }
        }

        idx.occupants_by_node.retain(|node, _| node == local_node);

        idx.nodes_by_occupant.clear();
        if let Some(by_addr) = idx.occupants_by_node.get(local_node) {
            for occ in by_addr.values().flatten() {
                idx.nodes_by_occupant
                    .entry(occ.clone())
                    .or_default()
                    .insert(local_node.clone());
            }
        }

        lost
    }

    // ---- nickname-kick support: the canonical lock-not-upgradeable path

    /// All occupants, cluster-wide, matching `(room, nickname)`. Read-lock
    /// only; the caller releases this before taking the write lock to
    /// delete, and must tolerate that the set may be stale by the time it
    /// re-enters under the writer: a missing occupant in the delete phase
    /// is a no-op, so this is safe.
    pub fn occupants_matching(&self, room: &str, nickname: &str) -> Vec<Occupant> {
        let idx = self.inner.read();
        idx.nodes_by_occupant
            .keys()
            .filter(|o| o.room() == room && o.nickname() == nickname)
            .cloned()
            .collect()
    }

    // ---- query surface ---------------------------------------------------

    pub fn room_names_for_address(&self, real_address: &str) -> HashSet<String> {
        let idx = self.inner.read();
        idx.nodes_by_occupant
            .keys()
            .filter(|o| o.real_address() == real_address)
            .map(|o| o.room().to_string())
            .collect()
    }

    pub fn local_occupants(&self, local_node: &N) -> HashSet<Occupant> {
        let idx = self.inner.read();
        idx.occupants_by_node
            .get(local_node)
            .map(|by_addr| by_addr.values().flatten().cloned().collect())
            .unwrap_or_default()
    }

    /// Update `last_active` on every local occupant matching `real_address`.
    /// Takes the write lock: although the mutation itself is through
    /// interior mutability, the value being mutated is reachable from both
    /// indices, so readers must not observe a half-updated set.
    pub fn register_activity(&self, local_node: &N, real_address: &str, now_millis: i64) {
        let idx = self.inner.write();
        if let Some(by_addr) = idx.occupants_by_node.get(local_node)
            && let Some(set) = by_addr.get(real_address)
        {
            for occ in set {
                occ.touch_activity(now_millis);
            }
        }
    }

    pub fn last_activity_on_local_node(&self, local_node: &N, real_address: &str) -> Option<i64> {
        let idx = self.inner.read();
        idx.occupants_by_node
            .get(local_node)
            .and_then(|by_addr| by_addr.get(real_address))
            .into_iter()
            .flatten()
            .filter_map(|o| o.last_active_millis())
            .max()
    }

    pub fn number_of_unique_users(&self) -> usize {
        self.inner.read().nodes_by_occupant.len()
    }

    pub fn exists(&self, occ: &Occupant, exclude_node: Option<&N>) -> bool {
        let idx = self.inner.read();
        match idx.nodes_by_occupant.get(occ) {
            None => false,
            Some(nodes) => match exclude_node {
                Some(excl) => nodes.iter().any(|n| n != excl),
                None => !nodes.is_empty(),
            },
        }
    }

    pub fn occupants_for_room_by_node(&self, room: &str, node: &N) -> Vec<Occupant> {
        let idx = self.inner.read();
        idx.occupants_by_node
            .get(node)
            .into_iter()
            .flat_map(|by_addr| by_addr.values().flatten())
            .filter(|o| o.room() == room)
            .cloned()
            .collect()
    }

    // TODO: this scans every node but the excluded one. A room-keyed
    // secondary index would make it O(room size) but doubles the invariant
    // surface for a query that's not on the hot path.
    pub fn occupants_for_room_except_for_node(&self, room: &str, exclude_node: &N) -> Vec<Occupant> {
        let idx = self.inner.read();
        idx.occupants_by_node
            .iter()
            .filter(|(node, _)| *node != exclude_node)
            .flat_map(|(_, by_addr)| by_addr.values().flatten())
            .filter(|o| o.room() == room)
            .cloned()
            .collect()
    }

    /// Materialized snapshot, never a view over the live map: callers get
    /// an owned copy at the API boundary rather than a guard tied to the
    /// lock's lifetime.
    pub fn occupants_by_node_snapshot(&self) -> HashMap<N, HashSet<Occupant>> {
        let idx = self.inner.read();
        idx.occupants_by_node
            .iter()
            .map(|(node, by_addr)| (node.clone(), by_addr.values().flatten().cloned().collect()))
            .collect()
    }

    pub fn nodes_by_occupant_snapshot(&self) -> HashMap<Occupant, HashSet<N>> {
        self.inner.read().nodes_by_occupant.clone()
    }

    /// Full O(n) consistency sweep over both indices. Not called on the
    /// mutation hot path (see `verify_pair`); meant for tests and operator
    /// diagnostics.
    pub fn audit(&self) -> Result<(), InvariantViolation> {
        let idx = self.inner.read();

        for (node, by_addr) in &idx.occupants_by_node {
            if by_addr.is_empty() {
                return Err(InvariantViolation::EmptyLeafRetained {
                    location: "occupants_by_node[node]",
                });
            }
            for (addr, set) in by_addr {
                if set.is_empty() {
                    return Err(InvariantViolation::EmptyLeafRetained {
                        location: "occupants_by_node[node][address]",
                    });
                }
                for occ in set {
                    if occ.real_address() != addr {
                        return Err(InvariantViolation::MissingReverseEntry {
                            node: format!("{node:?}"),
                            occupant: format!("{occ:?}"),
                        });
                    }
                    let reverse_ok = idx
                        .nodes_by_occupant
                        .get(occ)
                        .is_some_and(|nodes| nodes.contains(node));
                    if !reverse_ok {
                        return Err(InvariantViolation::MissingReverseEntry {
                            node: format!("{node:?}"),
                            occupant: format!("{occ:?}"),
                        });
                    }
                }
            }
        }

        for (occ, nodes) in &idx.nodes_by_occupant {
            if nodes.is_empty() {
                return Err(InvariantViolation::EmptyLeafRetained {
                    location: "nodes_by_occupant[occupant]",
                });
            }
            for node in nodes {
                let forward_ok = idx
                    .occupants_by_node
                    .get(node)
                    .and_then(|by_addr| by_addr.get(occ.real_address()))
                    .is_some_and(|set| set.contains(occ));
                if !forward_ok {
                    return Err(InvariantViolation::MissingForwardEntry {
                        node: format!("{node:?}"),
                        occupant: format!("{occ:?}"),
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occ(room: &str, nick: &str, addr: &str) -> Occupant {
        Occupant::new(room, nick, addr)
    }

    #[test]
    fn insert_then_query() {
        let store: DualIndexStore<String> = DualIndexStore::new();
        let a = occ("r1", "a1", "alice@ex");
        store.replace(None, Some(&a), Some(&"A".to_string()));

        assert_eq!(store.number_of_unique_users(), 1);
        assert_eq!(
            store.room_names_for_address("alice@ex"),
            HashSet::from(["r1".to_string()])
        );
        assert!(store.exists(&a, None));
        store.audit().unwrap();
    }

    #[test]
    fn law_l1_idempotent_delete() {
        let store: DualIndexStore<String> = DualIndexStore::new();
        let a = occ("r1", "a1", "alice@ex");
        store.replace(None, Some(&a), Some(&"A".to_string()));
        store.replace(Some(&a), None, Some(&"A".to_string()));
        let snapshot_once = store.occupants_by_node_snapshot();
        store.replace(Some(&a), None, Some(&"A".to_string()));
        let snapshot_twice = store.occupants_by_node_snapshot();
        assert_eq!(snapshot_once, snapshot_twice);
        assert_eq!(store.number_of_unique_users(), 0);
        store.audit().unwrap();
    }

    #[test]
    fn law_l2_self_replace_is_noop() {
        let store: DualIndexStore<String> = DualIndexStore::new();
        let a = occ("r1", "a1", "alice@ex");
        store.replace(None, Some(&a), Some(&"A".to_string()));
        let before = store.occupants_by_node_snapshot();
        store.replace(Some(&a), Some(&a), Some(&"A".to_string()));
        let after = store.occupants_by_node_snapshot();
        assert_eq!(before, after);
    }

    #[test]
    fn law_l3_round_trip_restores_state() {
        let store: DualIndexStore<String> = DualIndexStore::new();
        let before = store.occupants_by_node_snapshot();
        let a = occ("r1", "a1", "alice@ex");
        store.replace(None, Some(&a), Some(&"A".to_string()));
        store.replace(Some(&a), None, Some(&"A".to_string()));
        let after = store.occupants_by_node_snapshot();
        assert_eq!(before, after);
    }

    #[test]
    fn empty_leaves_are_not_retained() {
        let store: DualIndexStore<String> = DualIndexStore::new();
        let a = occ("r1", "a1", "alice@ex");
        store.replace(None, Some(&a), Some(&"A".to_string()));
        store.replace(Some(&a), None, Some(&"A".to_string()));
        assert!(store.occupants_by_node_snapshot().is_empty());
        assert!(store.nodes_by_occupant_snapshot().is_empty());
    }

    #[test]
    fn nickname_kick_fans_out_across_nodes() {
        let store: DualIndexStore<String> = DualIndexStore::new();
        let a = occ("r2", "dup", "alice@ex");
        let b = occ("r2", "dup", "bob@ex");
        let c = occ("r2", "dup", "carol@ex");
        store.replace(None, Some(&a), Some(&"A".to_string()));
        store.replace(None, Some(&b), Some(&"B".to_string()));
        store.replace(None, Some(&c), Some(&"C".to_string()));

        let matching = store.occupants_matching("r2", "dup");
        assert_eq!(matching.len(), 3);
        for occ in &matching {
            store.replace(Some(occ), None, None);
        }

        assert_eq!(store.number_of_unique_users(), 0);
        assert!(store.room_names_for_address("alice@ex").is_empty());
        assert!(store.room_names_for_address("bob@ex").is_empty());
        assert!(store.room_names_for_address("carol@ex").is_empty());
    }

    #[test]
    fn node_left_returns_removed_and_preserves_others() {
        let store: DualIndexStore<String> = DualIndexStore::new();
        let alice = occ("r1", "a1", "alice@ex");
        let bob = occ("r1", "b1", "bob@ex");
        store.replace(None, Some(&alice), Some(&"A".to_string()));
        store.replace(None, Some(&bob), Some(&"B".to_string()));

        let removed = store.node_left(&"B".to_string());
        assert_eq!(removed, HashSet::from([bob.clone()]));
        assert!(!store.exists(&bob, None));
        assert!(store.exists(&alice, None));
        store.audit().unwrap();
    }

    #[test]
    fn local_detach_conserves_local_occupants() {
        let store: DualIndexStore<String> = DualIndexStore::new();
        let a_r1 = occ("r1", "a1", "alice@ex");
        let b_r1 = occ("r1", "b1", "bob@ex");
        let a_r2 = occ("r2", "a1", "alice@ex");
        store.replace(None, Some(&a_r1), Some(&"A".to_string()));
        store.replace(None, Some(&b_r1), Some(&"B".to_string()));
        store.replace(None, Some(&a_r2), Some(&"C".to_string()));

        let before_local = store.local_occupants(&"A".to_string());
        let lost = store.local_detached(&"A".to_string());

        assert_eq!(lost, HashSet::from([b_r1, a_r2]));
        assert_eq!(store.local_occupants(&"A".to_string()), before_local);
        assert_eq!(store.nodes_by_occupant_snapshot().len(), 1);
        store.audit().unwrap();
    }
}
