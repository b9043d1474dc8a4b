//! The event sink: turns MUC room callbacks into a local store mutation
//! plus a broadcast task describing the same mutation.

use crate::node::NodeId;
use crate::occupant::{Occupant, RoomAddress};
use crate::store::DualIndexStore;
use crate::task::Task;

/// The MUC event interface this registry consumes. Four variants are
/// deliberate no-ops: the registry has nothing to track for them, but
/// `EventSink::handle` is total over the whole callback surface so a
/// caller never needs an extra match arm of its own.
#[derive(Debug, Clone)]
pub enum MucEvent {
    OccupantJoined {
        room: RoomAddress,
        nickname: String,
        real_address: String,
    },
    NicknameChanged {
        room: RoomAddress,
        old_nickname: String,
        new_nickname: String,
        real_address: String,
    },
    OccupantLeft {
        room: RoomAddress,
        nickname: String,
        real_address: String,
    },
    /// Nickname-collision kick. Deliberately *not* filtered by service
    /// domain below, unlike the other room-lifecycle events: a nickname
    /// collision is cluster-wide, not scoped to one service.
    NicknameKicked { room: RoomAddress, nickname: String },
    RoomDestroyed {
        room: RoomAddress,
        /// Every occupant known to have been in the room, so the sink can
        /// delete them on whichever node each was known to exist.
        occupants: Vec<Occupant>,
    },
    RoomCreated { room: RoomAddress },
    MessageReceived { room: RoomAddress },
    PrivateMessageReceived { real_address: String },
    SubjectChanged { room: RoomAddress },
}

/// Turns an event into a local store mutation and, where applicable, a
/// broadcast task carrying the local node as origin.
pub struct EventSink<N: NodeId> {
    service_domain: String,
    local_node: N,
    store: std::sync::Arc<DualIndexStore<N>>,
}

impl<N: NodeId> EventSink<N> {
    pub fn new(service_domain: impl Into<String>, local_node: N, store: std::sync::Arc<DualIndexStore<N>>) -> Self {
        Self {
            service_domain: service_domain.into(),
            local_node,
            store,
        }
    }

    /// Apply the local mutation (if any) and return the broadcast task (if
    /// any). `None` covers both "filtered out" and the genuine no-op
    /// events.
    pub fn handle(&self, event: MucEvent) -> Option<Task<N>> {
        match event {
            MucEvent::OccupantJoined {
                room,
                nickname,
                real_address,
            } => {
                if !room.belongs_to(&self.service_domain) {
                    return None;
                }
                let occ = Occupant::new(room.name.clone(), nickname.clone(), real_address.clone());
                self.store.replace(None, Some(&occ), Some(&self.local_node));
                Some(Task::Added {
                    service: self.service_domain.clone(),
                    room: room.name,
                    nickname,
                    real_address,
                    origin: self.local_node.clone(),
                })
            }
            MucEvent::NicknameChanged {
                room,
                old_nickname,
                new_nickname,
                real_address,
            } => {
                if !room.belongs_to(&self.service_domain) {
                    return None;
                }
                let old = Occupant::new(room.name.clone(), old_nickname.clone(), real_address.clone());
                let new = Occupant::new(room.name.clone(), new_nickname.clone(), real_address.clone());
                self.store.replace(Some(&old), Some(&new), Some(&self.local_node));
                Some(Task::Updated {
                    service: self.service_domain.clone(),
                    room: room.name,
                    old_nickname,
                    new_nickname,
                    real_address,
                    origin: self.local_node.clone(),
                })
            }
            MucEvent::OccupantLeft {
                room,
                nickname,
                real_address,
            } => {
                if !room.belongs_to(&self.service_domain) {
                    return None;
                }
                let occ = Occupant::new(room.name.clone(), nickname.clone(), real_address.clone());
                self.store.replace(Some(&occ), None, Some(&self.local_node));
                Some(Task::Removed {
                    service: self.service_domain.clone(),
                    room: room.name,
                    nickname,
                    real_address,
                    origin: self.local_node.clone(),
                })
            }
            MucEvent::NicknameKicked { room, nickname } => {
                // Not filtered by service domain; see doc comment above.
                let matching = self.store.occupants_matching(&room.name, &nickname);
                for occ in &matching {
                    self.store.replace(Some(occ), None, None);
                }
                Some(Task::NickKicked {
                    service: self.service_domain.clone(),
                    room: room.name,
                    nickname,
                    origin: self.local_node.clone(),
                })
            }
            MucEvent::RoomDestroyed { room, occupants } => {
                if !room.belongs_to(&self.service_domain) {
                    return None;
                }
                for occ in &occupants {
                    // Delete on every node the occupant is known on, not
                    // just locally, rather than waiting for each peer to
                    // observe its own room-destroyed callback for
                    // occupants it never locally hosted.
                    self.store.replace(Some(occ), None, None);
                }
                // Peers observe room-destroyed through their own MUC
                // service callback; no broadcast task for this one.
                None
            }
            MucEvent::RoomCreated { .. }
            | MucEvent::MessageReceived { .. }
            | MucEvent::PrivateMessageReceived { .. }
            | MucEvent::SubjectChanged { .. } => None,
        }
    }
}
