//! Broadcast task shapes.
//!
//! A task is a self-describing mutation descriptor: it carries enough
//! identity information and an origin node to be applied on any node,
//! local or remote, without further context. This is what makes the
//! registry tolerant of out-of-order arrival: every task is
//! idempotent-on-absence when applied.

use crate::occupant::OccupantRecord;
use crate::node::NodeId;

/// A mutation descriptor, either produced locally by the event sink or
/// received from a peer via the cluster layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task<N: NodeId> {
    /// An occupant joined a room.
    Added {
        service: String,
        room: String,
        nickname: String,
        real_address: String,
        origin: N,
    },
    /// An occupant changed nickname in place.
    Updated {
        service: String,
        room: String,
        old_nickname: String,
        new_nickname: String,
        real_address: String,
        origin: N,
    },
    /// An occupant left a room.
    Removed {
        service: String,
        room: String,
        nickname: String,
        real_address: String,
        origin: N,
    },
    /// A nickname collision kick. Nickname-global, not service-scoped: the
    /// filter the other tasks apply does not apply here.
    NickKicked {
        service: String,
        room: String,
        nickname: String,
        origin: N,
    },
    /// The originating node's full set of local occupants, sent on
    /// topology change so peers can reconcile.
    PeerSnapshot {
        occupants: Vec<OccupantRecord>,
        origin: N,
    },
}

impl<N: NodeId> Task<N> {
    /// The service this task is addressed to, so a multi-service host can
    /// route it to the right registry instance. `PeerSnapshot` carries no
    /// service name (it is a full per-node dump, not scoped to one
    /// service); callers that multiplex services key snapshots by origin
    /// and apply them to every registry that node is known to.
    pub fn service(&self) -> Option<&str> {
        match self {
            Task::Added { service, .. }
            | Task::Updated { service, .. }
            | Task::Removed { service, .. }
            | Task::NickKicked { service, .. } => Some(service),
            Task::PeerSnapshot { .. } => None,
        }
    }

    /// A stable label for metrics and logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Task::Added { .. } => "added",
            Task::Updated { .. } => "updated",
            Task::Removed { .. } => "removed",
            Task::NickKicked { .. } => "nick_kicked",
            Task::PeerSnapshot { .. } => "peer_snapshot",
        }
    }

    pub fn origin(&self) -> &N {
        match self {
            Task::Added { origin, .. }
            | Task::Updated { origin, .. }
            | Task::Removed { origin, .. }
            | Task::NickKicked { origin, .. }
            | Task::PeerSnapshot { origin, .. } => origin,
        }
    }
}
