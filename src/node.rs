//! Cluster node identity.
//!
//! The registry treats node identifiers as opaque values supplied by the
//! cluster membership layer (out of scope here; see `ClusterLayer`). Any
//! type that can be cloned, compared, hashed, and named in a log line
//! qualifies.

use std::fmt::Debug;
use std::hash::Hash;

/// A cluster node identifier.
///
/// Blanket-implemented for anything that already satisfies the bounds, so
/// callers can plug in whatever their cluster layer uses (a `String`, a
/// `u64`, a newtype around either) without implementing a marker trait by
/// hand.
pub trait NodeId: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> NodeId for T where T: Clone + Eq + Hash + Debug + Send + Sync + 'static {}
