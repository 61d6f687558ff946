//! Dependency resolver: topological layering of a cluster's containers.
//!
//! Builds a directed graph from each spec's dependency edges and computes
//! layers via in-degree tracking: layer 0 holds containers with no
//! dependencies, each subsequent layer holds containers whose dependencies
//! are all satisfied by prior layers. Ties within a layer are broken by
//! declaration order so launch behavior is reproducible across runs.

use std::collections::HashMap;

use thiserror::Error;

use deckhand_shared_types::{ContainerSpec, DeckhandError};

/// The dependency graph admits no topological order. Fatal: nothing is
/// started when this is returned.
#[derive(Debug, Error)]
#[error("dependency cycle among containers: {}", .unresolved.join(", "))]
pub struct CycleError {
    /// Containers whose dependencies could not be satisfied, in
    /// declaration order.
    pub unresolved: Vec<String>,
}

impl From<CycleError> for DeckhandError {
    fn from(err: CycleError) -> Self {
        DeckhandError::Cycle(err.to_string())
    }
}

/// Computes the layered launch order for a set of effective specs.
///
/// Edges to targets outside the given set are a validation-time error and
/// have been rejected before this point; they are ignored here rather than
/// treated as unsatisfiable.
pub fn build_layers(specs: &[ContainerSpec]) -> Result<Vec<Vec<String>>, CycleError> {
    let index: HashMap<&str, usize> = specs
        .iter()
        .enumerate()
        .map(|(i, spec)| (spec.name.as_str(), i))
        .collect();

    let mut remaining_deps: Vec<usize> = specs
        .iter()
        .map(|spec| {
            spec.dependencies
                .iter()
                .filter(|edge| index.contains_key(edge.target.as_str()))
                .count()
        })
        .collect();

    // dependents[i] lists the indices that depend on specs[i].
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); specs.len()];
    for (i, spec) in specs.iter().enumerate() {
        for edge in &spec.dependencies {
            if let Some(&target) = index.get(edge.target.as_str()) {
                dependents[target].push(i);
            }
        }
    }

    let mut placed = vec![false; specs.len()];
    let mut layers = Vec::new();
    let mut placed_count = 0;

    while placed_count < specs.len() {
        // Tie-break within a layer by the stable sort key attached at
        // resolution time, not by input or map iteration order.
        let mut layer: Vec<usize> = (0..specs.len())
            .filter(|&i| !placed[i] && remaining_deps[i] == 0)
            .collect();
        layer.sort_by_key(|&i| specs[i].sort_key);

        if layer.is_empty() {
            let unresolved = (0..specs.len())
                .filter(|&i| !placed[i])
                .map(|i| specs[i].name.clone())
                .collect();
            return Err(CycleError { unresolved });
        }

        for &i in &layer {
            placed[i] = true;
            placed_count += 1;
        }
        for &i in &layer {
            for &dependent in &dependents[i] {
                remaining_deps[dependent] -= 1;
            }
        }
        layers.push(layer.into_iter().map(|i| specs[i].name.clone()).collect());
    }

    Ok(layers)
}

#[cfg(test)]
mod tests {
    use super::*;

    use deckhand_shared_types::{DependencyEdge, NetworkMode};

    fn spec(name: &str, deps: &[(&str, &str)], sort_key: usize) -> ContainerSpec {
        ContainerSpec {
            name: name.to_string(),
            image: format!("repo/{name}"),
            ports: vec![],
            env: vec![],
            net: NetworkMode::default(),
            mounts: vec![],
            privileged: false,
            dependencies: deps
                .iter()
                .map(|(target, alias)| DependencyEdge {
                    target: target.to_string(),
                    alias: alias.to_string(),
                })
                .collect(),
            sort_key,
        }
    }

    #[test]
    fn example_layering_two_dependents_on_one_target() {
        let specs = vec![
            spec("alice", &[], 0),
            spec("bob1", &[("alice", "alias")], 1),
            spec("bob2", &[("alice", "alias")], 2),
        ];
        let layers = build_layers(&specs).unwrap();
        assert_eq!(layers, vec![vec!["alice"], vec!["bob1", "bob2"]]);
    }

    #[test]
    fn chain_produces_one_container_per_layer() {
        let specs = vec![
            spec("c", &[("b", "b")], 0),
            spec("b", &[("a", "a")], 1),
            spec("a", &[], 2),
        ];
        let layers = build_layers(&specs).unwrap();
        assert_eq!(layers, vec![vec!["a"], vec!["b"], vec!["c"]]);
    }

    #[test]
    fn diamond_dependencies() {
        let specs = vec![
            spec("top", &[("left", "l"), ("right", "r")], 0),
            spec("left", &[("base", "b")], 1),
            spec("right", &[("base", "b")], 2),
            spec("base", &[], 3),
        ];
        let layers = build_layers(&specs).unwrap();
        assert_eq!(
            layers,
            vec![vec!["base"], vec!["left", "right"], vec!["top"]]
        );
    }

    #[test]
    fn every_edge_crosses_layers_downward() {
        let specs = vec![
            spec("a", &[], 0),
            spec("b", &[("a", "a")], 1),
            spec("c", &[("a", "a"), ("b", "b")], 2),
            spec("d", &[("a", "a")], 3),
        ];
        let layers = build_layers(&specs).unwrap();
        let layer_of = |name: &str| {
            layers
                .iter()
                .position(|layer| layer.iter().any(|n| n == name))
                .unwrap()
        };
        for s in &specs {
            for edge in &s.dependencies {
                assert!(layer_of(&edge.target) < layer_of(&s.name));
            }
        }
    }

    #[test]
    fn tie_break_is_declaration_order() {
        let specs = vec![
            spec("zeta", &[], 0),
            spec("alpha", &[], 1),
            spec("mid", &[], 2),
        ];
        let layers = build_layers(&specs).unwrap();
        assert_eq!(layers, vec![vec!["zeta", "alpha", "mid"]]);
    }

    #[test]
    fn tie_break_uses_the_sort_key_not_input_order() {
        // Same containers handed over out of declaration order.
        let specs = vec![
            spec("mid", &[], 2),
            spec("zeta", &[], 0),
            spec("alpha", &[], 1),
        ];
        let layers = build_layers(&specs).unwrap();
        assert_eq!(layers, vec![vec!["zeta", "alpha", "mid"]]);
    }

    #[test]
    fn two_node_cycle_is_fatal() {
        let specs = vec![
            spec("a", &[("b", "b")], 0),
            spec("b", &[("a", "a")], 1),
        ];
        let err = build_layers(&specs).unwrap_err();
        assert_eq!(err.unresolved, vec!["a", "b"]);
    }

    #[test]
    fn cycle_reaches_only_the_stuck_containers() {
        let specs = vec![
            spec("ok", &[], 0),
            spec("x", &[("y", "y")], 1),
            spec("y", &[("x", "x")], 2),
        ];
        let err = build_layers(&specs).unwrap_err();
        assert_eq!(err.unresolved, vec!["x", "y"]);
    }

    #[test]
    fn empty_input_yields_no_layers() {
        let layers = build_layers(&[]).unwrap();
        assert!(layers.is_empty());
    }
}
