//! Lifecycle orchestrator: drives the container runtime through a cluster
//! launch in dependency-layer order, and back down again on teardown.
//!
//! Launch processes the layers from [`crate::graph`] in order. Within a
//! layer every container is created, alias-bound and started concurrently;
//! a strict barrier waits for the whole layer to reach running before the
//! next layer begins, because later layers address state established by
//! earlier ones. Any failure rolls back every container already started,
//! in strict reverse start order, and the caller receives one aggregated
//! [`LaunchError`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use container_runtime_interface::ContainerRuntime;
use deckhand_shared_types::{ContainerId, ContainerSpec, DeckhandError, Result};
use manifest_model::Manifest;

use crate::binder::{self, AliasBinding, BindingPlan};
use crate::graph::{self, CycleError};
use crate::merge::{self, ResolveError};

/// Tunable bounds for launch and teardown.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// How long a container may take to reach running after start.
    pub readiness_timeout: Duration,
    /// Interval between readiness polls.
    pub readiness_poll_interval: Duration,
    /// Grace period passed to the runtime's stop call.
    pub stop_grace: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            readiness_timeout: Duration::from_secs(30),
            readiness_poll_interval: Duration::from_millis(250),
            stop_grace: Duration::from_secs(8),
        }
    }
}

/// Lifecycle phases a container moves through during orchestration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerPhase {
    Pending,
    Created,
    Started,
    Running,
    Failed,
    Stopped,
    Removed,
}

impl std::fmt::Display for ContainerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let phase = match self {
            ContainerPhase::Pending => "pending",
            ContainerPhase::Created => "created",
            ContainerPhase::Started => "started",
            ContainerPhase::Running => "running",
            ContainerPhase::Failed => "failed",
            ContainerPhase::Stopped => "stopped",
            ContainerPhase::Removed => "removed",
        };
        f.write_str(phase)
    }
}

/// A container that reached running during a launch. The effective spec is
/// retained for the lifetime of the running cluster so teardown operates on
/// the same resolved values.
#[derive(Debug, Clone)]
pub struct RunningContainer {
    pub name: String,
    pub id: ContainerId,
    pub spec: ContainerSpec,
}

/// A successfully launched cluster, retained by the orchestrator session
/// until torn down.
#[derive(Debug, Clone)]
pub struct RunningCluster {
    pub cluster: String,
    pub session_id: Uuid,
    /// Containers in start order; teardown walks this in reverse.
    pub containers: Vec<RunningContainer>,
    pub layers: Vec<Vec<String>>,
    /// Configuration warnings surfaced during launch (e.g. host-network
    /// dependents whose aliases could not be bound).
    pub warnings: Vec<String>,
}

/// Outcome of a teardown. Teardown is best-effort: it proceeds through
/// every container and aggregates errors instead of aborting early.
#[derive(Debug)]
pub struct TeardownReport {
    pub cluster: String,
    /// Containers processed, in teardown (reverse start) order.
    pub torn_down: Vec<String>,
    pub errors: Vec<String>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Current runtime state of one container in a running cluster.
#[derive(Debug, Clone)]
pub struct ContainerStatusEntry {
    pub name: String,
    pub id: ContainerId,
    pub state: String,
}

/// Snapshot of a running cluster's container states.
#[derive(Debug, Clone)]
pub struct ClusterStatus {
    pub cluster: String,
    pub containers: Vec<ContainerStatusEntry>,
}

/// Why a single container failed during launch.
#[derive(Debug, Error)]
pub enum FailureCause {
    #[error("runtime call failed: {0}")]
    Runtime(String),
    #[error("exited before becoming ready (exit code {code:?})")]
    ExitedEarly { code: Option<i32> },
    #[error("not ready within {timeout:?}")]
    ReadinessTimeout { timeout: Duration },
}

/// Aggregated launch failure. Structural errors (resolve, cycle) occur
/// before any side effect; the `Failed` and `Cancelled` variants carry the
/// set that was rolled back and any secondary rollback errors.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Cycle(#[from] CycleError),

    #[error("cluster '{0}' is already running")]
    AlreadyRunning(String),

    #[error(
        "launch of cluster '{cluster}' failed: container '{container}': {cause}; \
         rolled back {} container(s){}",
        .rolled_back.len(),
        summarize_errors(.rollback_errors)
    )]
    Failed {
        cluster: String,
        container: String,
        cause: FailureCause,
        /// Containers stopped and removed, in rollback order.
        rolled_back: Vec<String>,
        rollback_errors: Vec<String>,
    },

    #[error(
        "launch of cluster '{cluster}' cancelled; rolled back {} container(s){}",
        .rolled_back.len(),
        summarize_errors(.rollback_errors)
    )]
    Cancelled {
        cluster: String,
        rolled_back: Vec<String>,
        rollback_errors: Vec<String>,
    },
}

fn summarize_errors(errors: &[String]) -> String {
    if errors.is_empty() {
        String::new()
    } else {
        format!("; rollback errors: {}", errors.join("; "))
    }
}

impl From<LaunchError> for DeckhandError {
    fn from(err: LaunchError) -> Self {
        match err {
            LaunchError::Resolve(e) => e.into(),
            LaunchError::Cycle(e) => e.into(),
            other => DeckhandError::Launch(other.to_string()),
        }
    }
}

/// Result of one container's concurrent launch attempt within a layer.
struct LaunchOutcome {
    name: String,
    /// Present whenever the runtime created the container, even if a later
    /// step failed; rollback must cover it.
    id: Option<ContainerId>,
    phase: ContainerPhase,
    failure: Option<FailureCause>,
}

/// Drives cluster launches and teardowns against a container runtime.
///
/// The manifest is shared read-only; each launch owns its resolved specs
/// and layer plan exclusively. Successful launches are retained as sessions
/// keyed by cluster name until torn down.
pub struct Orchestrator {
    runtime: Arc<dyn ContainerRuntime>,
    config: OrchestratorConfig,
    sessions: RwLock<HashMap<String, RunningCluster>>,
}

impl Orchestrator {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: OrchestratorConfig) -> Self {
        Self {
            runtime,
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Launches a cluster, waiting layer by layer for readiness.
    pub async fn launch_cluster(
        &self,
        manifest: &Manifest,
        cluster_name: &str,
    ) -> std::result::Result<RunningCluster, LaunchError> {
        self.launch_cluster_with_cancel(manifest, cluster_name, CancellationToken::new())
            .await
    }

    /// Launches a cluster with caller-controlled cancellation. Cancellation
    /// is observed at layer boundaries: no further layer is started and
    /// everything already started is rolled back.
    pub async fn launch_cluster_with_cancel(
        &self,
        manifest: &Manifest,
        cluster_name: &str,
        cancel: CancellationToken,
    ) -> std::result::Result<RunningCluster, LaunchError> {
        if self.sessions.read().await.contains_key(cluster_name) {
            return Err(LaunchError::AlreadyRunning(cluster_name.to_string()));
        }

        // Structural phase: resolve and order before any side effect.
        let specs = merge::resolve(cluster_name, manifest)?;
        let layers = graph::build_layers(&specs)?;

        let session_id = Uuid::new_v4();
        info!(
            cluster = %cluster_name,
            session = %session_id,
            containers = specs.len(),
            layers = layers.len(),
            "launching cluster"
        );

        let spec_by_name: HashMap<&str, &ContainerSpec> =
            specs.iter().map(|s| (s.name.as_str(), s)).collect();
        let plans: HashMap<String, BindingPlan> = specs
            .iter()
            .map(|s| (s.name.clone(), binder::plan_for(s)))
            .collect();
        let warnings: Vec<String> = specs
            .iter()
            .flat_map(|s| plans[&s.name].warnings.iter().cloned())
            .collect();

        let mut started: Vec<RunningContainer> = Vec::new();
        let mut ids: HashMap<String, ContainerId> = HashMap::new();

        for (layer_index, layer) in layers.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(cluster = %cluster_name, layer = layer_index, "launch cancelled");
                let rolled_back = rollback_order(&started);
                let rollback_errors = self.rollback(&started).await;
                return Err(LaunchError::Cancelled {
                    cluster: cluster_name.to_string(),
                    rolled_back,
                    rollback_errors,
                });
            }

            debug!(layer = layer_index, containers = ?layer, "starting layer");
            let attempts = layer.iter().map(|name| {
                let spec = spec_by_name[name.as_str()];
                let bindings = plans[name.as_str()].bindings.as_slice();
                self.launch_one(spec, bindings, &ids)
            });
            let outcomes = futures::future::join_all(attempts).await;

            // Record every created container first so rollback covers the
            // whole layer, then act on the first failure.
            let mut failure: Option<(String, FailureCause)> = None;
            for outcome in outcomes {
                if let Some(id) = outcome.id {
                    ids.insert(outcome.name.clone(), id.clone());
                    started.push(RunningContainer {
                        name: outcome.name.clone(),
                        id,
                        spec: spec_by_name[outcome.name.as_str()].clone(),
                    });
                }
                if let Some(cause) = outcome.failure {
                    error!(
                        container = %outcome.name,
                        phase = %outcome.phase,
                        %cause,
                        "container failed during launch"
                    );
                    if failure.is_none() {
                        failure = Some((outcome.name, cause));
                    }
                }
            }

            if let Some((container, cause)) = failure {
                let rolled_back = rollback_order(&started);
                let rollback_errors = self.rollback(&started).await;
                return Err(LaunchError::Failed {
                    cluster: cluster_name.to_string(),
                    container,
                    cause,
                    rolled_back,
                    rollback_errors,
                });
            }
        }

        let running = RunningCluster {
            cluster: cluster_name.to_string(),
            session_id,
            containers: started,
            layers,
            warnings,
        };
        info!(
            cluster = %cluster_name,
            session = %session_id,
            containers = running.containers.len(),
            "cluster running"
        );
        self.sessions
            .write()
            .await
            .insert(cluster_name.to_string(), running.clone());
        Ok(running)
    }

    /// Stops and removes a running cluster, deepest dependents first.
    pub async fn teardown_cluster(&self, cluster_name: &str) -> Result<TeardownReport> {
        let session = self
            .sessions
            .write()
            .await
            .remove(cluster_name)
            .ok_or_else(|| DeckhandError::ClusterNotRunning(cluster_name.to_string()))?;

        info!(cluster = %cluster_name, session = %session.session_id, "tearing down cluster");
        let mut report = TeardownReport {
            cluster: cluster_name.to_string(),
            torn_down: Vec::new(),
            errors: Vec::new(),
        };
        for container in session.containers.iter().rev() {
            if let Err(err) = self
                .runtime
                .stop_container(&container.id, self.config.stop_grace)
                .await
            {
                warn!(container = %container.name, %err, "stop failed during teardown");
                report.errors.push(format!("stop '{}': {}", container.name, err));
            }
            if let Err(err) = self.runtime.remove_container(&container.id).await {
                warn!(container = %container.name, %err, "remove failed during teardown");
                report
                    .errors
                    .push(format!("remove '{}': {}", container.name, err));
            }
            report.torn_down.push(container.name.clone());
        }
        Ok(report)
    }

    /// Reports the current runtime state of each container in a running
    /// cluster, in start order.
    pub async fn status_cluster(&self, cluster_name: &str) -> Result<ClusterStatus> {
        let sessions = self.sessions.read().await;
        let session = sessions
            .get(cluster_name)
            .ok_or_else(|| DeckhandError::ClusterNotRunning(cluster_name.to_string()))?;

        let mut containers = Vec::with_capacity(session.containers.len());
        for container in &session.containers {
            let state = match self.runtime.container_status(&container.id).await {
                Ok(status) => status.state,
                Err(err) => format!("unknown ({err})"),
            };
            containers.push(ContainerStatusEntry {
                name: container.name.clone(),
                id: container.id.clone(),
                state,
            });
        }
        Ok(ClusterStatus {
            cluster: cluster_name.to_string(),
            containers,
        })
    }

    /// Tears down a cluster that is not retained as a session (e.g. one
    /// launched by an earlier process), addressing containers by their
    /// manifest names. Relies on the runtime accepting the container name
    /// as an identity, which runtimes that name containers after the spec
    /// (Docker) do. Reverse dependency order, best-effort.
    pub async fn teardown_unmanaged(
        &self,
        manifest: &Manifest,
        cluster_name: &str,
    ) -> Result<TeardownReport> {
        let specs = merge::resolve(cluster_name, manifest).map_err(DeckhandError::from)?;
        let layers = graph::build_layers(&specs).map_err(DeckhandError::from)?;

        info!(cluster = %cluster_name, "tearing down unmanaged cluster");
        let mut report = TeardownReport {
            cluster: cluster_name.to_string(),
            torn_down: Vec::new(),
            errors: Vec::new(),
        };
        let start_order: Vec<&String> = layers.iter().flatten().collect();
        for name in start_order.into_iter().rev() {
            let identity: ContainerId = name.clone();
            if let Err(err) = self
                .runtime
                .stop_container(&identity, self.config.stop_grace)
                .await
            {
                warn!(container = %name, %err, "stop failed during teardown");
                report.errors.push(format!("stop '{name}': {err}"));
            }
            if let Err(err) = self.runtime.remove_container(&identity).await {
                warn!(container = %name, %err, "remove failed during teardown");
                report.errors.push(format!("remove '{name}': {err}"));
            }
            report.torn_down.push(name.clone());
        }
        Ok(report)
    }

    /// Reports the state of a cluster's containers by manifest name, without
    /// requiring a retained session. Containers the runtime does not know
    /// are reported as `not created`.
    pub async fn status_unmanaged(
        &self,
        manifest: &Manifest,
        cluster_name: &str,
    ) -> Result<ClusterStatus> {
        let specs = merge::resolve(cluster_name, manifest).map_err(DeckhandError::from)?;

        let mut containers = Vec::with_capacity(specs.len());
        for spec in &specs {
            let identity: ContainerId = spec.name.clone();
            let (id, state) = match self.runtime.container_status(&identity).await {
                Ok(status) => (status.id, status.state),
                Err(_) => (identity, "not created".to_string()),
            };
            containers.push(ContainerStatusEntry {
                name: spec.name.clone(),
                id,
                state,
            });
        }
        Ok(ClusterStatus {
            cluster: cluster_name.to_string(),
            containers,
        })
    }

    /// Names of clusters currently retained as running sessions.
    pub async fn running_clusters(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Create, alias-bind, start and await readiness for one container.
    /// Alias targets are guaranteed running by the layer barrier.
    async fn launch_one(
        &self,
        spec: &ContainerSpec,
        bindings: &[AliasBinding],
        ids: &HashMap<String, ContainerId>,
    ) -> LaunchOutcome {
        let mut outcome = LaunchOutcome {
            name: spec.name.clone(),
            id: None,
            phase: ContainerPhase::Pending,
            failure: None,
        };

        let id = match self.runtime.create_container(spec).await {
            Ok(id) => id,
            Err(err) => {
                outcome.failure = Some(FailureCause::Runtime(err.to_string()));
                return outcome;
            }
        };
        outcome.id = Some(id.clone());
        outcome.phase = ContainerPhase::Created;

        for binding in bindings {
            let Some(target_id) = ids.get(&binding.target) else {
                outcome.phase = ContainerPhase::Failed;
                outcome.failure = Some(FailureCause::Runtime(format!(
                    "alias target '{}' has no runtime identity",
                    binding.target
                )));
                return outcome;
            };
            if let Err(err) = self.runtime.bind_alias(&id, &binding.alias, target_id).await {
                outcome.phase = ContainerPhase::Failed;
                outcome.failure = Some(FailureCause::Runtime(err.to_string()));
                return outcome;
            }
        }

        if let Err(err) = self.runtime.start_container(&id).await {
            outcome.phase = ContainerPhase::Failed;
            outcome.failure = Some(FailureCause::Runtime(err.to_string()));
            return outcome;
        }
        outcome.phase = ContainerPhase::Started;

        match self.wait_ready(&spec.name, &id).await {
            Ok(()) => {
                outcome.phase = ContainerPhase::Running;
            }
            Err(cause) => {
                outcome.phase = ContainerPhase::Failed;
                outcome.failure = Some(cause);
            }
        }
        outcome
    }

    /// Polls the runtime until the container is running, it exits, or the
    /// readiness window elapses.
    async fn wait_ready(
        &self,
        name: &str,
        id: &ContainerId,
    ) -> std::result::Result<(), FailureCause> {
        let deadline = Instant::now() + self.config.readiness_timeout;
        loop {
            match self.runtime.container_status(id).await {
                Ok(status) if status.is_running() => {
                    debug!(container = %name, "container ready");
                    return Ok(());
                }
                Ok(status) if status.state == "exited" || status.state == "dead" => {
                    return Err(FailureCause::ExitedEarly {
                        code: status.exit_code,
                    });
                }
                Ok(_) => {}
                Err(err) => return Err(FailureCause::Runtime(err.to_string())),
            }
            if Instant::now() >= deadline {
                return Err(FailureCause::ReadinessTimeout {
                    timeout: self.config.readiness_timeout,
                });
            }
            tokio::time::sleep(self.config.readiness_poll_interval).await;
        }
    }

    /// Stops and removes everything in `started`, newest first. Best-effort:
    /// collects errors rather than stopping at the first one.
    async fn rollback(&self, started: &[RunningContainer]) -> Vec<String> {
        let mut errors = Vec::new();
        for container in started.iter().rev() {
            info!(container = %container.name, "rolling back");
            if let Err(err) = self
                .runtime
                .stop_container(&container.id, self.config.stop_grace)
                .await
            {
                errors.push(format!("stop '{}': {}", container.name, err));
            }
            if let Err(err) = self.runtime.remove_container(&container.id).await {
                errors.push(format!("remove '{}': {}", container.name, err));
            }
        }
        errors
    }
}

fn rollback_order(started: &[RunningContainer]) -> Vec<String> {
    started.iter().rev().map(|c| c.name.clone()).collect()
}
