//! Alias/network binding plans.
//!
//! Each dependency edge (dependent -> target, alias) becomes an alias
//! binding the orchestrator performs once the target is running and before
//! the dependent starts. Host-network dependents are the exception: they
//! share the host network namespace, so no network-scoped alias can exist
//! for them. That case produces a configuration warning instead of a
//! binding; the dependent must address the target via the host loopback
//! and the target's published host ports.

use tracing::warn;

use deckhand_shared_types::ContainerSpec;

/// One alias registration to perform before a dependent starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasBinding {
    pub dependent: String,
    pub alias: String,
    pub target: String,
}

/// Bindings and warnings derived from one container's dependency edges.
#[derive(Debug, Clone, Default)]
pub struct BindingPlan {
    pub bindings: Vec<AliasBinding>,
    pub warnings: Vec<String>,
}

/// Builds the binding plan for a spec. Emits a `warn!` per skipped edge so
/// host-mode fallback is never silent.
pub fn plan_for(spec: &ContainerSpec) -> BindingPlan {
    let mut plan = BindingPlan::default();
    for edge in &spec.dependencies {
        if spec.net.is_host() {
            let warning = format!(
                "container '{}' uses host network mode; alias '{}' for '{}' cannot be \
                 network-bound - address the target via the host loopback and its \
                 published ports",
                spec.name, edge.alias, edge.target
            );
            warn!(
                container = %spec.name,
                alias = %edge.alias,
                target = %edge.target,
                "host network mode prevents alias binding"
            );
            plan.warnings.push(warning);
        } else {
            plan.bindings.push(AliasBinding {
                dependent: spec.name.clone(),
                alias: edge.alias.clone(),
                target: edge.target.clone(),
            });
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    use deckhand_shared_types::{DependencyEdge, NetworkMode};

    fn spec(name: &str, net: NetworkMode, deps: &[(&str, &str)]) -> ContainerSpec {
        ContainerSpec {
            name: name.to_string(),
            image: format!("repo/{name}"),
            ports: vec![],
            env: vec![],
            net,
            mounts: vec![],
            privileged: false,
            dependencies: deps
                .iter()
                .map(|(target, alias)| DependencyEdge {
                    target: target.to_string(),
                    alias: alias.to_string(),
                })
                .collect(),
            sort_key: 0,
        }
    }

    #[test]
    fn bridge_dependent_gets_bindings() {
        let plan = plan_for(&spec(
            "web",
            NetworkMode::Bridge,
            &[("db", "db_alias"), ("cache", "cache_alias")],
        ));
        assert_eq!(plan.warnings.len(), 0);
        assert_eq!(
            plan.bindings,
            vec![
                AliasBinding {
                    dependent: "web".to_string(),
                    alias: "db_alias".to_string(),
                    target: "db".to_string()
                },
                AliasBinding {
                    dependent: "web".to_string(),
                    alias: "cache_alias".to_string(),
                    target: "cache".to_string()
                },
            ]
        );
    }

    #[test]
    fn host_dependent_yields_warnings_instead() {
        let plan = plan_for(&spec("web", NetworkMode::Host, &[("db", "db_alias")]));
        assert!(plan.bindings.is_empty());
        assert_eq!(plan.warnings.len(), 1);
        assert!(plan.warnings[0].contains("host network mode"));
        assert!(plan.warnings[0].contains("db_alias"));
    }

    #[test]
    fn no_dependencies_no_plan() {
        let plan = plan_for(&spec("solo", NetworkMode::Bridge, &[]));
        assert!(plan.bindings.is_empty());
        assert!(plan.warnings.is_empty());
    }
}
