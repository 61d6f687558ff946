//! Start command - launch a cluster in dependency order.

use std::path::Path;
use std::time::Duration;

use clap::Args;

use deckhand_core::{Orchestrator, OrchestratorConfig};
use manifest_model::Manifest;

use crate::commands::make_runtime;
use crate::output;

/// Arguments for the start command.
#[derive(Args)]
pub struct StartArgs {
    /// Cluster to launch
    pub cluster: String,

    /// Seconds to wait for each container to become ready
    #[arg(long, default_value_t = 30)]
    pub readiness_timeout: u64,
}

pub async fn execute(args: StartArgs, config: &Path, mock: bool) -> anyhow::Result<()> {
    let manifest = Manifest::from_path(config).await?;
    let orchestrator = Orchestrator::new(
        make_runtime(mock),
        OrchestratorConfig {
            readiness_timeout: Duration::from_secs(args.readiness_timeout),
            ..Default::default()
        },
    );

    let running = orchestrator.launch_cluster(&manifest, &args.cluster).await?;

    for warning in &running.warnings {
        output::warn(warning);
    }
    for (index, layer) in running.layers.iter().enumerate() {
        output::info(&format!("layer {}: {}", index, layer.join(", ")));
    }
    output::success(&format!(
        "cluster '{}' running: {} container(s) in {} layer(s)",
        running.cluster,
        running.containers.len(),
        running.layers.len()
    ));
    Ok(())
}
