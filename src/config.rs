//! Configuration.
//!
//! Recognized options: `cluster-task-nonblocking`, a dynamic boolean
//! controlling whether event broadcasts block on peer acknowledgement or
//! fire-and-forget.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Deserialize;
use thiserror::Error;

fn default_cluster_task_nonblocking() -> bool {
    false
}

/// Static configuration, as loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// When `true`, event broadcasts are fire-and-forget. When `false`
    /// (the default), broadcasts block until every reachable peer has
    /// applied the task.
    #[serde(
        rename = "cluster-task-nonblocking",
        default = "default_cluster_task_nonblocking"
    )]
    pub cluster_task_nonblocking: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            cluster_task_nonblocking: default_cluster_task_nonblocking(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

impl RegistryConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

/// The live, mutable view of the broadcast-mode flag.
///
/// Broadcast mode can change between events without restarting the
/// registry. It is resolved per event at dispatch time, so this is a plain
/// atomic rather than a value baked into `RegistryConfig` at construction.
#[derive(Debug)]
pub struct BroadcastMode {
    nonblocking: AtomicBool,
}

impl BroadcastMode {
    pub fn new(nonblocking: bool) -> Self {
        Self {
            nonblocking: AtomicBool::new(nonblocking),
        }
    }

    pub fn is_nonblocking(&self) -> bool {
        self.nonblocking.load(Ordering::Relaxed)
    }

    pub fn set_nonblocking(&self, value: bool) {
        self.nonblocking.store(value, Ordering::Relaxed);
    }
}

impl From<&RegistryConfig> for BroadcastMode {
    fn from(cfg: &RegistryConfig) -> Self {
        Self::new(cfg.cluster_task_nonblocking)
    }
}
