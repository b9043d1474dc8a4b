//! The cluster layer's contract, consumed rather than implemented here.
//!
//! The membership layer itself — node identity assignment, task transport,
//! topology-change detection — is out of scope. This trait is only the
//! seam the registry needs: who am I, and how do I reach my peers.

use crate::error::DispatchError;
use crate::node::NodeId;
use crate::task::Task;

/// Capabilities the registry consumes from the cluster membership layer.
pub trait ClusterLayer<N: NodeId>: Send + Sync {
    /// This node's own identifier.
    fn local_node(&self) -> N;

    /// Dispatch a task to every reachable peer and block until each has
    /// applied it.
    fn dispatch_sync(&self, task: Task<N>) -> Result<(), DispatchError>;

    /// Enqueue a task for delivery to every reachable peer and return
    /// immediately.
    fn dispatch_async(&self, task: Task<N>);
}
