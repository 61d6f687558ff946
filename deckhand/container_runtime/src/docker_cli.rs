//! CLI-based Docker container runtime.
//!
//! Drives the `docker` binary to manage containers. Non-host containers are
//! attached to a shared user-defined bridge network so dependency aliases
//! resolve through Docker's embedded DNS; the default bridge network does
//! not support aliases.
//!
//! # Requirements
//!
//! - `docker` binary installed and in PATH
//! - permission to talk to the Docker daemon

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use container_runtime_interface::{ContainerRuntime, ContainerStatus};
use deckhand_shared_types::{ContainerId, ContainerSpec, DeckhandError, NetworkMode, Result};

/// Errors specific to driving the docker CLI.
#[derive(Debug, thiserror::Error)]
pub enum DockerCliError {
    #[error("Docker command failed: {command} - {message}")]
    CommandFailed { command: String, message: String },

    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    #[error("Timeout running: {0}")]
    Timeout(String),

    #[error("Invalid inspect output: {0}")]
    InvalidState(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<DockerCliError> for DeckhandError {
    fn from(err: DockerCliError) -> Self {
        DeckhandError::Runtime(err.to_string())
    }
}

/// Configuration for [`DockerCliRuntime`].
#[derive(Debug, Clone)]
pub struct DockerCliConfig {
    /// Path to the docker binary (default: "docker").
    pub docker_binary: PathBuf,
    /// Timeout applied to every docker invocation.
    pub command_timeout: Duration,
    /// Name of the shared user-defined bridge network used for alias
    /// resolution between bridge-mode containers.
    pub network: String,
}

impl Default for DockerCliConfig {
    fn default() -> Self {
        Self {
            docker_binary: PathBuf::from("docker"),
            command_timeout: Duration::from_secs(30),
            network: "deckhand".to_string(),
        }
    }
}

/// Container state from `docker inspect`.
#[derive(Debug, Deserialize)]
struct DockerState {
    #[serde(rename = "Status")]
    status: String,
    #[serde(rename = "ExitCode", default)]
    exit_code: i32,
    #[serde(rename = "Error", default)]
    error: String,
}

/// Container runtime backed by the `docker` CLI.
pub struct DockerCliRuntime {
    config: DockerCliConfig,
    network_ready: Mutex<bool>,
    /// Aliases bound so far, per target container. Needed because adding an
    /// alias to an already-attached container requires reconnecting it with
    /// the full alias set.
    aliases: RwLock<HashMap<ContainerId, HashSet<String>>>,
}

impl DockerCliRuntime {
    pub fn new(config: DockerCliConfig) -> Self {
        Self {
            config,
            network_ready: Mutex::new(false),
            aliases: RwLock::new(HashMap::new()),
        }
    }

    async fn run_docker(&self, args: &[&str]) -> std::result::Result<String, DockerCliError> {
        let command_line = format!("docker {}", args.join(" "));
        debug!(command = %command_line, "running docker command");

        let output = tokio::time::timeout(
            self.config.command_timeout,
            Command::new(&self.config.docker_binary)
                .args(args)
                .stdin(Stdio::null())
                .output(),
        )
        .await
        .map_err(|_| DockerCliError::Timeout(command_line.clone()))??;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if stderr.contains("No such container") || stderr.contains("No such object") {
                return Err(DockerCliError::ContainerNotFound(stderr));
            }
            Err(DockerCliError::CommandFailed {
                command: command_line,
                message: stderr,
            })
        }
    }

    /// Creates the shared alias network if it does not exist yet.
    async fn ensure_network(&self) -> std::result::Result<(), DockerCliError> {
        let mut ready = self.network_ready.lock().await;
        if *ready {
            return Ok(());
        }
        let exists = self
            .run_docker(&["network", "inspect", &self.config.network])
            .await
            .is_ok();
        if !exists {
            info!(network = %self.config.network, "creating shared alias network");
            self.run_docker(&["network", "create", &self.config.network])
                .await?;
        }
        *ready = true;
        Ok(())
    }

    /// Connects `container_id` to the shared network carrying `aliases`.
    async fn connect_with_aliases(
        &self,
        container_id: &ContainerId,
        aliases: &HashSet<String>,
    ) -> std::result::Result<(), DockerCliError> {
        let mut args: Vec<String> = vec!["network".into(), "connect".into()];
        for alias in aliases {
            args.push("--alias".into());
            args.push(alias.clone());
        }
        args.push(self.config.network.clone());
        args.push(container_id.clone());
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run_docker(&arg_refs).await.map(|_| ())
    }
}

/// Builds the `docker create` argument list for a spec. Separated out so
/// the flag mapping is testable without a docker daemon.
fn create_args(spec: &ContainerSpec, shared_network: &str) -> Vec<String> {
    let mut args: Vec<String> = vec!["create".into(), "--name".into(), spec.name.clone()];
    for port in &spec.ports {
        args.push("-p".into());
        args.push(format!("{}:{}", port.host_port, port.container_port));
    }
    for var in &spec.env {
        args.push("-e".into());
        args.push(format!("{}={}", var.key, var.value));
    }
    for mount in &spec.mounts {
        args.push("-v".into());
        args.push(format!("{}:{}", mount.host_path, mount.container_path));
    }
    match &spec.net {
        NetworkMode::Bridge => {
            args.push("--network".into());
            args.push(shared_network.to_string());
        }
        NetworkMode::Host => {
            args.push("--network".into());
            args.push("host".into());
        }
        NetworkMode::Other(name) => {
            args.push("--network".into());
            args.push(name.clone());
        }
    }
    if spec.privileged {
        args.push("--privileged".into());
    }
    args.push(spec.image.clone());
    args
}

#[async_trait]
impl ContainerRuntime for DockerCliRuntime {
    async fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerId> {
        if !spec.net.is_host() {
            self.ensure_network().await?;
        }
        info!(name = %spec.name, image = %spec.image, "creating container");
        let args = create_args(spec, &self.config.network);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let container_id = self.run_docker(&arg_refs).await?;
        Ok(container_id)
    }

    async fn start_container(&self, container_id: &ContainerId) -> Result<()> {
        info!(id = %container_id, "starting container");
        self.run_docker(&["start", container_id]).await?;
        Ok(())
    }

    async fn container_status(&self, container_id: &ContainerId) -> Result<ContainerStatus> {
        let raw = self
            .run_docker(&["inspect", "--format", "{{json .State}}", container_id])
            .await?;
        let state: DockerState = serde_json::from_str(&raw).map_err(DockerCliError::Json)?;
        Ok(ContainerStatus {
            id: container_id.clone(),
            state: state.status.clone(),
            exit_code: (state.status == "exited").then_some(state.exit_code),
            error_message: (!state.error.is_empty()).then_some(state.error),
        })
    }

    async fn stop_container(&self, container_id: &ContainerId, grace: Duration) -> Result<()> {
        info!(id = %container_id, "stopping container");
        let grace_secs = grace.as_secs().to_string();
        self.run_docker(&["stop", "-t", &grace_secs, container_id])
            .await?;
        Ok(())
    }

    async fn remove_container(&self, container_id: &ContainerId) -> Result<()> {
        info!(id = %container_id, "removing container");
        self.run_docker(&["rm", container_id]).await?;
        Ok(())
    }

    async fn bind_alias(
        &self,
        dependent: &ContainerId,
        alias: &str,
        target: &ContainerId,
    ) -> Result<()> {
        self.ensure_network().await?;

        let mut aliases = self.aliases.write().await;
        let bound = aliases.entry(target.clone()).or_default();
        if bound.contains(alias) {
            debug!(alias = %alias, target = %target, "alias already bound");
            return Ok(());
        }
        bound.insert(alias.to_string());
        let full_set = bound.clone();
        drop(aliases);

        debug!(dependent = %dependent, alias = %alias, target = %target, "binding alias");
        match self.connect_with_aliases(target, &full_set).await {
            Ok(()) => Ok(()),
            Err(DockerCliError::CommandFailed { message, .. })
                if message.contains("already exists in network") =>
            {
                // The target is attached without this alias (it was created
                // on the shared network, or an earlier bind attached it).
                // Docker cannot add aliases in place, so reconnect with the
                // accumulated set. This only ever happens before any
                // dependent of the target has been started.
                warn!(target = %target, alias = %alias, "reconnecting target to refresh aliases");
                self.run_docker(&["network", "disconnect", &self.config.network, target])
                    .await?;
                self.connect_with_aliases(target, &full_set).await?;
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckhand_shared_types::{EnvVar, MountSpec, PortMapping};

    fn full_spec() -> ContainerSpec {
        ContainerSpec {
            name: "web".to_string(),
            image: "repo/web".to_string(),
            ports: vec![PortMapping {
                host_port: 8080,
                container_port: 80,
            }],
            env: vec![EnvVar::new("MODE", "prod")],
            net: NetworkMode::Bridge,
            mounts: vec![MountSpec {
                host_path: "/srv/web".to_string(),
                container_path: "/data".to_string(),
            }],
            privileged: true,
            dependencies: vec![],
            sort_key: 0,
        }
    }

    #[test]
    fn create_args_maps_every_field() {
        let args = create_args(&full_spec(), "deckhand");
        assert_eq!(
            args,
            vec![
                "create",
                "--name",
                "web",
                "-p",
                "8080:80",
                "-e",
                "MODE=prod",
                "-v",
                "/srv/web:/data",
                "--network",
                "deckhand",
                "--privileged",
                "repo/web",
            ]
        );
    }

    #[test]
    fn create_args_host_network() {
        let mut spec = full_spec();
        spec.net = NetworkMode::Host;
        spec.privileged = false;
        let args = create_args(&spec, "deckhand");
        assert!(args.windows(2).any(|w| w == ["--network", "host"]));
        assert!(!args.contains(&"--privileged".to_string()));
    }

    #[test]
    fn create_args_named_network_passes_through() {
        let mut spec = full_spec();
        spec.net = NetworkMode::Other("overlay1".to_string());
        let args = create_args(&spec, "deckhand");
        assert!(args.windows(2).any(|w| w == ["--network", "overlay1"]));
    }

    #[test]
    fn docker_state_parsing() {
        let state: DockerState = serde_json::from_str(
            r#"{"Status":"exited","Running":false,"ExitCode":137,"Error":"oom"}"#,
        )
        .unwrap();
        assert_eq!(state.status, "exited");
        assert_eq!(state.exit_code, 137);
        assert_eq!(state.error, "oom");
    }
}
