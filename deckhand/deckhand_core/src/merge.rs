//! Override merger: turns base container definitions plus an optional group
//! overlay into effective, launch-ready container specs.
//!
//! Merge semantics are centralized here in one routine over the two field
//! kinds: scalar fields (network mode, privileged) are replaced by an
//! overlay value when present, list fields (ports, env, mounts) are
//! appended. Environment keys additionally shadow at lookup time
//! (last-write-wins) while the full ordered sequence is retained; see
//! [`ContainerSpec::env_value`]. Dependencies are a structural property of
//! the base definition and are never touched by overlays.

use thiserror::Error;

use deckhand_shared_types::{ContainerSpec, DeckhandError};
use manifest_model::{ContainerDef, Manifest, OverrideSet};

/// Errors from cluster resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("unknown cluster '{0}'")]
    UnknownCluster(String),

    /// A name reference that validation should have caught. Only reachable
    /// if a manifest bypassed `Manifest::from_str`.
    #[error("cluster '{cluster}' references unresolved name '{name}'")]
    UnresolvedName { cluster: String, name: String },
}

impl From<ResolveError> for DeckhandError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::UnknownCluster(name) => DeckhandError::ClusterNotFound(name),
            other => DeckhandError::Internal(other.to_string()),
        }
    }
}

/// Resolves a cluster into effective container specs, in the cluster's
/// declared container order. Deterministic and idempotent: the same
/// manifest and cluster always produce identical specs.
pub fn resolve(cluster_name: &str, manifest: &Manifest) -> Result<Vec<ContainerSpec>, ResolveError> {
    let cluster = manifest
        .cluster(cluster_name)
        .ok_or_else(|| ResolveError::UnknownCluster(cluster_name.to_string()))?;

    let group = match &cluster.group {
        Some(name) => Some(manifest.group(name).ok_or_else(|| {
            ResolveError::UnresolvedName {
                cluster: cluster_name.to_string(),
                name: name.clone(),
            }
        })?),
        None => None,
    };

    let mut specs = Vec::with_capacity(cluster.containers.len());
    for (position, name) in cluster.containers.iter().enumerate() {
        let def = manifest
            .container(name)
            .ok_or_else(|| ResolveError::UnresolvedName {
                cluster: cluster_name.to_string(),
                name: name.clone(),
            })?;

        let mut spec = base_spec(def, position);
        if let Some(group) = group {
            apply_overlay(&mut spec, &group.options);
            if let Some(overrides) = group.per_container.get(name) {
                // Per-container overrides always win over blanket options.
                apply_overlay(&mut spec, overrides);
            }
        }
        specs.push(spec);
    }
    Ok(specs)
}

/// The effective spec before any overlay: a copy of the base definition
/// with the stable sort key attached.
fn base_spec(def: &ContainerDef, position: usize) -> ContainerSpec {
    ContainerSpec {
        name: def.name.clone(),
        image: def.image.clone(),
        ports: def.ports.clone(),
        env: def.env.clone(),
        net: def.net.clone(),
        mounts: def.mounts.clone(),
        privileged: def.privileged,
        dependencies: def.dependencies.clone(),
        sort_key: position,
    }
}

/// Applies one override set onto a spec.
pub fn apply_overlay(spec: &mut ContainerSpec, overlay: &OverrideSet) {
    merge_list(&mut spec.ports, &overlay.ports);
    merge_list(&mut spec.env, &overlay.env);
    merge_list(&mut spec.mounts, &overlay.mounts);
    merge_scalar(&mut spec.net, overlay.net.as_ref());
    merge_scalar(&mut spec.privileged, overlay.privileged.as_ref());
    // No dependency merging: groups cannot change the dependency graph.
}

fn merge_scalar<T: Clone>(base: &mut T, overlay: Option<&T>) {
    if let Some(value) = overlay {
        *base = value.clone();
    }
}

fn merge_list<T: Clone>(base: &mut Vec<T>, overlay: &[T]) {
    base.extend_from_slice(overlay);
}
