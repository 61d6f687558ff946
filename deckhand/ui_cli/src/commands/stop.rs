//! Stop command - stop and remove a cluster's containers.

use std::path::Path;

use clap::Args;

use deckhand_core::{Orchestrator, OrchestratorConfig};
use manifest_model::Manifest;

use crate::commands::make_runtime;
use crate::output;

/// Arguments for the stop command.
#[derive(Args)]
pub struct StopArgs {
    /// Cluster to tear down
    pub cluster: String,
}

pub async fn execute(args: StopArgs, config: &Path, mock: bool) -> anyhow::Result<()> {
    let manifest = Manifest::from_path(config).await?;
    let orchestrator = Orchestrator::new(make_runtime(mock), OrchestratorConfig::default());

    // Teardown addresses containers by manifest name so it works from a
    // fresh process, without the session that launched the cluster.
    let report = orchestrator
        .teardown_unmanaged(&manifest, &args.cluster)
        .await?;

    for error in &report.errors {
        output::warn(error);
    }
    if report.is_clean() {
        output::success(&format!(
            "cluster '{}' torn down: {}",
            report.cluster,
            report.torn_down.join(", ")
        ));
    } else {
        output::warn(&format!(
            "cluster '{}' torn down with {} error(s)",
            report.cluster,
            report.errors.len()
        ));
    }
    Ok(())
}
