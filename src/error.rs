//! Error hierarchy.
//!
//! The registry's own mutators are infallible: every primitive is defined
//! on every input (deleting something absent is a no-op, inserting
//! something present is idempotent), so `replace` and the task applier
//! never return a `Result`. The errors below are for collaborators: a peer
//! that can't be reached, and a debug-only consistency check over the two
//! indices.

use thiserror::Error;

/// A broadcast to one or more peers failed.
///
/// Local mutation always precedes broadcast, so the local state is already
/// correct by the time this can occur; there is nothing to roll back. The
/// peer catches up via the next `PeerSnapshot` it receives after rejoining;
/// this is logged, not retried, by the caller.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no peers reachable")]
    NoPeersReachable,

    #[error("dispatch to peer failed: {0}")]
    PeerUnreachable(String),
}

/// One of the dual-index invariants did not hold after a mutation. This is
/// a programming error in the registry itself, not a collaborator fault.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("node {node:?} carries occupant {occupant:?} in occupants_by_node but not in nodes_by_occupant")]
    MissingReverseEntry { node: String, occupant: String },

    #[error("nodes_by_occupant lists node {node:?} for occupant {occupant:?} not present in occupants_by_node")]
    MissingForwardEntry { node: String, occupant: String },

    #[error("empty leaf collection retained at {location}")]
    EmptyLeafRetained { location: &'static str },
}
