//! Status command - show container states for one or all clusters.

use std::path::Path;

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use deckhand_core::{Orchestrator, OrchestratorConfig};
use manifest_model::Manifest;

use crate::commands::make_runtime;
use crate::output::{print_data, section};
use crate::OutputFormat;

/// Arguments for the status command.
#[derive(Args)]
pub struct StatusArgs {
    /// Cluster to inspect; all clusters when omitted
    pub cluster: Option<String>,
}

#[derive(Debug, Serialize, Tabled)]
struct StatusRow {
    #[tabled(rename = "CONTAINER")]
    name: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "STATE")]
    state: String,
}

pub async fn execute(
    args: StatusArgs,
    config: &Path,
    mock: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let manifest = Manifest::from_path(config).await?;
    let orchestrator = Orchestrator::new(make_runtime(mock), OrchestratorConfig::default());

    let clusters: Vec<String> = match args.cluster {
        Some(cluster) => vec![cluster],
        None => {
            let mut names: Vec<String> =
                manifest.cluster_names().map(str::to_string).collect();
            names.sort();
            names
        }
    };

    for cluster in clusters {
        let status = orchestrator.status_unmanaged(&manifest, &cluster).await?;
        let rows: Vec<StatusRow> = status
            .containers
            .iter()
            .map(|entry| StatusRow {
                name: entry.name.clone(),
                id: entry.id.chars().take(12).collect(),
                state: entry.state.clone(),
            })
            .collect();
        section(&status.cluster);
        print_data(&rows, format)?;
    }
    Ok(())
}
