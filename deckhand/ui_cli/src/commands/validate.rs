//! Validate command - load the manifest and report every issue.

use std::path::Path;

use manifest_model::Manifest;

use crate::output;

pub async fn execute(config: &Path) -> anyhow::Result<()> {
    let manifest = Manifest::from_path(config).await?;

    let containers = manifest.container_names().count();
    let clusters = manifest.cluster_names().count();
    output::success(&format!(
        "{} is valid: {} container(s), {} cluster(s)",
        config.display(),
        containers,
        clusters
    ));
    Ok(())
}
