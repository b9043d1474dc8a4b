//! Cluster-wide occupant registry for a multi-user chat service.
//!
//! Tracks which user identities are present in which rooms, partitioned by
//! cluster node, and reconciles the two coupled indices on node departure,
//! split-brain detection, and peer resynchronization.

pub mod applier;
pub mod cluster;
pub mod config;
pub mod error;
pub mod event_sink;
pub mod node;
pub mod occupant;
pub mod registry;
pub mod store;
pub mod task;
pub mod telemetry;
pub mod topology;

pub use applier::TaskApplier;
pub use cluster::ClusterLayer;
pub use config::{BroadcastMode, ConfigError, RegistryConfig};
pub use error::{DispatchError, InvariantViolation};
pub use event_sink::{EventSink, MucEvent};
pub use node::NodeId;
pub use occupant::{Occupant, OccupantRecord, PingHandle, RoomAddress};
pub use registry::OccupantRegistry;
pub use store::DualIndexStore;
pub use task::Task;
pub use topology::TopologyHandler;
