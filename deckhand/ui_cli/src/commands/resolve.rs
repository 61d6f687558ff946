//! Resolve command - print the effective container specs for a cluster.

use std::path::Path;

use clap::Args;

use manifest_model::Manifest;

use crate::OutputFormat;

/// Arguments for the resolve command.
#[derive(Args)]
pub struct ResolveArgs {
    /// Cluster to resolve
    pub cluster: String,
}

pub async fn execute(args: ResolveArgs, config: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let manifest = Manifest::from_path(config).await?;
    let specs = deckhand_core::resolve(&args.cluster, &manifest)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&specs)?),
        // Effective specs are nested structures; a table does not fit them.
        OutputFormat::Table | OutputFormat::Yaml => {
            print!("{}", serde_yaml_ng::to_string(&specs)?)
        }
    }
    Ok(())
}
