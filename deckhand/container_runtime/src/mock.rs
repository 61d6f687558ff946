//! Mock container runtime for testing and development.
//!
//! Simulates container operations in-memory, records every call in an
//! ordered journal (so tests can assert launch and rollback ordering), and
//! supports failure injection for create, start and readiness.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use container_runtime_interface::{ContainerRuntime, ContainerStatus, RuntimeError};
use deckhand_shared_types::{ContainerId, ContainerSpec, Result};

/// One recorded runtime call, identified by container name rather than the
/// generated ID so tests stay readable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeOp {
    Create { name: String },
    Start { name: String },
    Stop { name: String },
    Remove { name: String },
    BindAlias {
        dependent: String,
        alias: String,
        target: String,
    },
}

#[derive(Debug, Clone)]
struct MockContainer {
    id: ContainerId,
    name: String,
    state: String,
    exit_code: Option<i32>,
}

/// In-memory runtime that simulates container operations.
#[derive(Debug, Default)]
pub struct MockRuntime {
    containers: Arc<RwLock<HashMap<ContainerId, MockContainer>>>,
    journal: Arc<RwLock<Vec<RuntimeOp>>>,
    fail_create: Arc<RwLock<HashSet<String>>>,
    fail_start: Arc<RwLock<HashSet<String>>>,
    hold_ready: Arc<RwLock<HashSet<String>>>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `create_container` fail for the named container.
    pub async fn fail_create_of(&self, name: &str) {
        self.fail_create.write().await.insert(name.to_string());
    }

    /// Make `start_container` fail for the named container.
    pub async fn fail_start_of(&self, name: &str) {
        self.fail_start.write().await.insert(name.to_string());
    }

    /// Keep the named container in `starting` state forever, so readiness
    /// polling times out.
    pub async fn hold_readiness_of(&self, name: &str) {
        self.hold_ready.write().await.insert(name.to_string());
    }

    /// Ordered list of every runtime call made so far.
    pub async fn journal(&self) -> Vec<RuntimeOp> {
        self.journal.read().await.clone()
    }

    pub async fn container_count(&self) -> usize {
        self.containers.read().await.len()
    }

    /// Runtime ID of a container by manifest name, if it exists.
    pub async fn id_of(&self, name: &str) -> Option<ContainerId> {
        self.containers
            .read()
            .await
            .values()
            .find(|c| c.name == name)
            .map(|c| c.id.clone())
    }

    async fn record(&self, op: RuntimeOp) {
        self.journal.write().await.push(op);
    }

    /// Resolves an identity to `(id, name)`. Like Docker, the mock accepts
    /// either the runtime-assigned ID or the container name.
    async fn resolve(&self, identity: &ContainerId) -> Result<(ContainerId, String)> {
        let containers = self.containers.read().await;
        if let Some(c) = containers.get(identity) {
            return Ok((c.id.clone(), c.name.clone()));
        }
        containers
            .values()
            .find(|c| c.name == *identity)
            .map(|c| (c.id.clone(), c.name.clone()))
            .ok_or_else(|| RuntimeError::ContainerNotFound(identity.clone()).into())
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    async fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerId> {
        if self.fail_create.read().await.contains(&spec.name) {
            return Err(RuntimeError::CommandFailed {
                command: "create".to_string(),
                message: format!("injected create failure for '{}'", spec.name),
            }
            .into());
        }

        let container_id = format!("mock-{}", Uuid::new_v4());
        info!(name = %spec.name, id = %container_id, "MockRuntime: creating container");
        debug!(?spec, "container spec");

        self.containers.write().await.insert(
            container_id.clone(),
            MockContainer {
                id: container_id.clone(),
                name: spec.name.clone(),
                state: "created".to_string(),
                exit_code: None,
            },
        );
        self.record(RuntimeOp::Create {
            name: spec.name.clone(),
        })
        .await;
        Ok(container_id)
    }

    async fn start_container(&self, container_id: &ContainerId) -> Result<()> {
        let (id, name) = self.resolve(container_id).await?;
        if self.fail_start.read().await.contains(&name) {
            return Err(RuntimeError::CommandFailed {
                command: "start".to_string(),
                message: format!("injected start failure for '{name}'"),
            }
            .into());
        }

        info!(name = %name, id = %id, "MockRuntime: starting container");
        let held = self.hold_ready.read().await.contains(&name);
        let mut containers = self.containers.write().await;
        let container = containers
            .get_mut(&id)
            .ok_or_else(|| RuntimeError::ContainerNotFound(id.clone()))?;
        container.state = if held {
            "starting".to_string()
        } else {
            "running".to_string()
        };
        drop(containers);

        self.record(RuntimeOp::Start { name }).await;
        Ok(())
    }

    async fn container_status(&self, container_id: &ContainerId) -> Result<ContainerStatus> {
        let (id, _name) = self.resolve(container_id).await?;
        let containers = self.containers.read().await;
        let container = containers
            .get(&id)
            .ok_or_else(|| RuntimeError::ContainerNotFound(id.clone()))?;
        Ok(ContainerStatus {
            id: container.id.clone(),
            state: container.state.clone(),
            exit_code: container.exit_code,
            error_message: None,
        })
    }

    async fn stop_container(&self, container_id: &ContainerId, _grace: Duration) -> Result<()> {
        let (id, name) = self.resolve(container_id).await?;
        info!(name = %name, id = %id, "MockRuntime: stopping container");

        let mut containers = self.containers.write().await;
        let container = containers
            .get_mut(&id)
            .ok_or_else(|| RuntimeError::ContainerNotFound(id.clone()))?;
        container.state = "exited".to_string();
        container.exit_code = Some(0);
        drop(containers);

        self.record(RuntimeOp::Stop { name }).await;
        Ok(())
    }

    async fn remove_container(&self, container_id: &ContainerId) -> Result<()> {
        let (id, name) = self.resolve(container_id).await?;
        info!(name = %name, id = %id, "MockRuntime: removing container");

        self.containers.write().await.remove(&id);
        self.record(RuntimeOp::Remove { name }).await;
        Ok(())
    }

    async fn bind_alias(
        &self,
        dependent: &ContainerId,
        alias: &str,
        target: &ContainerId,
    ) -> Result<()> {
        let (_dependent_id, dependent_name) = self.resolve(dependent).await?;
        let (target_id, _) = self.resolve(target).await?;
        let containers = self.containers.read().await;
        let target_container = containers
            .get(&target_id)
            .ok_or_else(|| RuntimeError::ContainerNotFound(target.clone()))?;
        // Alias targets must already be running when binding happens.
        if target_container.state != "running" {
            return Err(RuntimeError::AliasBindFailed {
                alias: alias.to_string(),
                message: format!(
                    "target '{}' is {}, not running",
                    target_container.name, target_container.state
                ),
            }
            .into());
        }
        let target_name = target_container.name.clone();
        drop(containers);

        debug!(
            dependent = %dependent_name,
            alias = %alias,
            target = %target_name,
            "MockRuntime: binding alias"
        );
        self.record(RuntimeOp::BindAlias {
            dependent: dependent_name,
            alias: alias.to_string(),
            target: target_name,
        })
        .await;
        Ok(())
    }
}
