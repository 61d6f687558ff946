use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use deckhand_shared_types::{ContainerId, ContainerSpec, DeckhandError, Result};

/// Runtime-reported status of a container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerStatus {
    pub id: ContainerId,
    pub state: String, // e.g. "created", "running", "exited"
    pub exit_code: Option<i32>,
    pub error_message: Option<String>,
}

impl ContainerStatus {
    /// Whether the container has reached a running state. Used by the
    /// orchestrator as the readiness signal.
    pub fn is_running(&self) -> bool {
        self.state == "running"
    }
}

/// Trait for driving an external container runtime (e.g. Docker).
///
/// The engine issues lifecycle commands through this seam; it never
/// reimplements image pull, namespace creation or process execution.
/// Calls on distinct container identities must not interfere with each
/// other; no atomicity is assumed across calls.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Creates a container from a fully merged spec. Does not start it.
    async fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerId>;

    /// Starts a created container.
    async fn start_container(&self, container_id: &ContainerId) -> Result<()>;

    /// Reports the container's current state.
    async fn container_status(&self, container_id: &ContainerId) -> Result<ContainerStatus>;

    /// Stops a running container, allowing it `grace` to exit cleanly.
    async fn stop_container(&self, container_id: &ContainerId, grace: Duration) -> Result<()>;

    /// Removes a stopped container.
    async fn remove_container(&self, container_id: &ContainerId) -> Result<()>;

    /// Registers `alias` so that `dependent` can resolve it to `target`
    /// within their shared network scope. Must be called after `target` is
    /// running and before `dependent` is started.
    async fn bind_alias(
        &self,
        dependent: &ContainerId,
        alias: &str,
        target: &ContainerId,
    ) -> Result<()>;
}

/// Errors raised by runtime implementations.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Container not found: {0}")]
    ContainerNotFound(ContainerId),

    #[error("Runtime command failed: {command} - {message}")]
    CommandFailed { command: String, message: String },

    #[error("Invalid state output: {0}")]
    InvalidState(String),

    #[error("Alias binding failed for '{alias}': {message}")]
    AliasBindFailed { alias: String, message: String },

    #[error("Underlying I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RuntimeError> for DeckhandError {
    fn from(err: RuntimeError) -> Self {
        DeckhandError::Runtime(err.to_string())
    }
}
