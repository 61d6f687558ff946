use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Runtime-assigned container identity, typically a hash provided by the
/// runtime when a container is created.
pub type ContainerId = String;

#[derive(Debug, Error)]
pub enum DeckhandError {
    #[error("Manifest validation failed: {0}")]
    Validation(String),
    #[error("Dependency cycle: {0}")]
    Cycle(String),
    #[error("Container runtime error: {0}")]
    Runtime(String),
    #[error("Readiness timeout: {0}")]
    ReadinessTimeout(String),
    #[error("Cluster launch failed: {0}")]
    Launch(String),
    #[error("Cluster not found: {0}")]
    ClusterNotFound(String),
    #[error("Cluster is not running: {0}")]
    ClusterNotRunning(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Generic result type for orchestration operations.
pub type Result<T> = std::result::Result<T, DeckhandError>;

/// A `hostPort:containerPort` publication.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PortMapping {
    pub host_port: u16,
    pub container_port: u16,
}

/// A single `KEY=value` environment assignment.
///
/// Duplicate keys are allowed in a spec's env sequence; lookups are
/// last-write-wins while the full sequence is retained in order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnvVar {
    pub key: String,
    pub value: String,
}

impl EnvVar {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A `hostPath:containerPath` bind mount, passed through to the runtime
/// unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MountSpec {
    pub host_path: String,
    pub container_path: String,
}

/// Container network mode. `bridge` unless the manifest says otherwise.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum NetworkMode {
    #[default]
    Bridge,
    Host,
    Other(String),
}

impl NetworkMode {
    pub fn as_str(&self) -> &str {
        match self {
            NetworkMode::Bridge => "bridge",
            NetworkMode::Host => "host",
            NetworkMode::Other(name) => name,
        }
    }

    /// Host-mode containers share the host network namespace and have no
    /// network-scoped alias visibility.
    pub fn is_host(&self) -> bool {
        matches!(self, NetworkMode::Host)
    }
}

impl From<String> for NetworkMode {
    fn from(value: String) -> Self {
        match value.as_str() {
            "bridge" => NetworkMode::Bridge,
            "host" => NetworkMode::Host,
            _ => NetworkMode::Other(value),
        }
    }
}

impl From<NetworkMode> for String {
    fn from(mode: NetworkMode) -> Self {
        mode.as_str().to_string()
    }
}

impl std::fmt::Display for NetworkMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dependency edge from the declaring container to `target`, addressed at
/// runtime by `alias`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DependencyEdge {
    pub target: String,
    pub alias: String,
}

/// Fully merged, launch-ready configuration for one container instance.
///
/// Constructed fresh per cluster-launch by the override merger, immutable
/// afterwards. `sort_key` is the container's position in the cluster's
/// declared list, attached at resolution time so ordering never depends on
/// map iteration order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub ports: Vec<PortMapping>,
    pub env: Vec<EnvVar>,
    pub net: NetworkMode,
    pub mounts: Vec<MountSpec>,
    pub privileged: bool,
    pub dependencies: Vec<DependencyEdge>,
    pub sort_key: usize,
}

impl ContainerSpec {
    /// Effective value of an environment key: the last assignment wins.
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|var| var.key == key)
            .map(|var| var.value.as_str())
    }

    pub fn has_dependencies(&self) -> bool {
        !self.dependencies.is_empty()
    }
}
