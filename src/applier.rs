//! The task applier.
//!
//! Applies a `Task` to the store, regardless of whether it was produced by
//! this node's own event sink or received from a peer. Every task carries
//! its origin node; applier operations always target that node.

use crate::node::NodeId;
use crate::occupant::Occupant;
use crate::store::DualIndexStore;
use crate::task::Task;

pub struct TaskApplier<N: NodeId> {
    store: std::sync::Arc<DualIndexStore<N>>,
}

impl<N: NodeId> TaskApplier<N> {
    pub fn new(store: std::sync::Arc<DualIndexStore<N>>) -> Self {
        Self { store }
    }

    pub fn apply(&self, task: &Task<N>) {
        match task {
            Task::Added {
                room,
                nickname,
                real_address,
                origin,
                ..
            } => {
                let occ = Occupant::new(room.clone(), nickname.clone(), real_address.clone());
                self.store.replace(None, Some(&occ), Some(origin));
            }
            Task::Updated {
                room,
                old_nickname,
                new_nickname,
                real_address,
                origin,
                ..
            } => {
                let old = Occupant::new(room.clone(), old_nickname.clone(), real_address.clone());
                let new = Occupant::new(room.clone(), new_nickname.clone(), real_address.clone());
                self.store.replace(Some(&old), Some(&new), Some(origin));
            }
            Task::Removed {
                room,
                nickname,
                real_address,
                origin,
                ..
            } => {
                let occ = Occupant::new(room.clone(), nickname.clone(), real_address.clone());
                self.store.replace(Some(&occ), None, Some(origin));
            }
            Task::NickKicked { room, nickname, .. } => {
                // Lock-not-upgradeable pattern: collect under the read
                // lock, release, then re-enter under the writer. A missing
                // occupant by then is a no-op, so a stale snapshot is safe.
                let matching = self.store.occupants_matching(room, nickname);
                for occ in &matching {
                    self.store.replace(Some(occ), None, None);
                }
            }
            Task::PeerSnapshot { occupants, origin } => {
                self.apply_snapshot(occupants, origin);
            }
        }
    }

    fn apply_snapshot(&self, occupants: &[crate::occupant::OccupantRecord], origin: &N) {
        let prior: std::collections::HashSet<Occupant> = self.store.local_occupants(origin);
        let incoming: std::collections::HashSet<Occupant> = occupants
            .iter()
            .cloned()
            .map(|r| r.into_occupant())
            .collect();

        if !prior.is_empty() {
            let prior_records: std::collections::HashSet<_> =
                prior.iter().map(|o| o.record()).collect();
            let incoming_records: std::collections::HashSet<_> =
                incoming.iter().map(|o| o.record()).collect();
            if prior_records == incoming_records {
                tracing::info!(origin = ?origin, "redundant snapshot: peer resent its current state");
            } else {
                tracing::warn!(origin = ?origin, "conflicting snapshot overwritten: peer's prior local state differed from the incoming one");
            }
        }

        for occ in &prior {
            self.store.replace(Some(occ), None, Some(origin));
        }
        for occ in &incoming {
            self.store.replace(None, Some(occ), Some(origin));
        }
    }
}
