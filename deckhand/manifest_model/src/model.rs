//! Validated, read-only manifest model.
//!
//! A [`Manifest`] is the single source of truth for an orchestration
//! session: loaded once, validated as a whole, then shared immutably with
//! every component. All name references (image, container, cluster, group,
//! dependency target) are resolved during validation, so downstream code
//! can look names up without re-checking.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use tracing::debug;

use deckhand_shared_types::{DependencyEdge, EnvVar, MountSpec, NetworkMode, PortMapping};

use crate::error::{ManifestError, Result, ValidationError, ValidationIssue};
use crate::wire::{
    parse_dependency, parse_env, parse_mount, parse_port, RawCluster, RawManifest, RawOverrides,
};

/// A named image and where it builds from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDef {
    pub name: String,
    pub path: String,
}

/// Base definition of a container as declared in the manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerDef {
    pub name: String,
    pub image: String,
    pub ports: Vec<PortMapping>,
    pub env: Vec<EnvVar>,
    pub net: NetworkMode,
    pub mounts: Vec<MountSpec>,
    pub privileged: bool,
    pub dependencies: Vec<DependencyEdge>,
}

/// Overrides a group applies to container definitions.
///
/// Scalar fields replace the base value when present; list fields append.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverrideSet {
    pub ports: Vec<PortMapping>,
    pub env: Vec<EnvVar>,
    pub mounts: Vec<MountSpec>,
    pub net: Option<NetworkMode>,
    pub privileged: Option<bool>,
}

impl OverrideSet {
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
            && self.env.is_empty()
            && self.mounts.is_empty()
            && self.net.is_none()
            && self.privileged.is_none()
    }
}

/// A reusable overlay: blanket options plus per-container overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupDef {
    pub name: String,
    pub options: OverrideSet,
    pub per_container: HashMap<String, OverrideSet>,
}

/// A launchable, ordered set of containers, optionally paired with a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterDef {
    pub name: String,
    pub group: Option<String>,
    pub containers: Vec<String>,
}

/// The validated manifest. Read-only after construction.
#[derive(Debug)]
pub struct Manifest {
    images: HashMap<String, ImageDef>,
    containers: HashMap<String, ContainerDef>,
    clusters: HashMap<String, ClusterDef>,
    groups: HashMap<String, GroupDef>,
}

impl Manifest {
    /// Parse and validate a manifest document (YAML or JSON).
    pub fn from_str(raw: &str) -> Result<Self> {
        let raw: RawManifest = serde_yaml_ng::from_str(raw)?;
        Self::from_raw(raw)
    }

    /// Read, parse and validate a manifest file.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        debug!(path = %path.as_ref().display(), "loaded manifest file");
        Self::from_str(&raw)
    }

    fn from_raw(raw: RawManifest) -> Result<Self> {
        let mut issues = Vec::new();

        let images: HashMap<String, ImageDef> = raw
            .images
            .into_iter()
            .map(|(name, path)| {
                (
                    name.clone(),
                    ImageDef {
                        name,
                        path,
                    },
                )
            })
            .collect();

        let mut containers = HashMap::new();
        for (name, raw_container) in raw.containers {
            let mut def = ContainerDef {
                name: name.clone(),
                image: raw_container.image,
                ports: Vec::new(),
                env: Vec::new(),
                net: raw_container
                    .net
                    .map(NetworkMode::from)
                    .unwrap_or_default(),
                mounts: Vec::new(),
                privileged: raw_container.privileged,
                dependencies: Vec::new(),
            };
            collect_entries(
                &name,
                "port",
                &raw_container.port,
                parse_port,
                &mut def.ports,
                &mut issues,
            );
            collect_entries(
                &name,
                "env",
                &raw_container.env,
                parse_env,
                &mut def.env,
                &mut issues,
            );
            collect_entries(
                &name,
                "mount",
                &raw_container.mount,
                parse_mount,
                &mut def.mounts,
                &mut issues,
            );
            collect_entries(
                &name,
                "dependencies",
                &raw_container.dependencies,
                parse_dependency,
                &mut def.dependencies,
                &mut issues,
            );
            containers.insert(name, def);
        }

        let clusters: HashMap<String, ClusterDef> = raw
            .clusters
            .into_iter()
            .map(|(name, raw_cluster)| {
                let def = match raw_cluster {
                    RawCluster::Plain(members) => ClusterDef {
                        name: name.clone(),
                        group: None,
                        containers: members,
                    },
                    RawCluster::Grouped {
                        group,
                        containers,
                    } => ClusterDef {
                        name: name.clone(),
                        group: Some(group),
                        containers,
                    },
                };
                (name, def)
            })
            .collect();

        let mut groups = HashMap::new();
        for (name, raw_group) in raw.groups {
            let options = convert_overrides(&name, raw_group.options, &mut issues);
            let per_container = raw_group
                .containers
                .into_iter()
                .map(|(container, overrides)| {
                    let set = convert_overrides(&container, overrides, &mut issues);
                    (container, set)
                })
                .collect();
            groups.insert(
                name.clone(),
                GroupDef {
                    name,
                    options,
                    per_container,
                },
            );
        }

        let manifest = Self {
            images,
            containers,
            clusters,
            groups,
        };
        manifest.validate_references(&mut issues);

        if issues.is_empty() {
            debug!(
                images = manifest.images.len(),
                containers = manifest.containers.len(),
                clusters = manifest.clusters.len(),
                groups = manifest.groups.len(),
                "manifest validated"
            );
            Ok(manifest)
        } else {
            Err(ManifestError::Validation(ValidationError { issues }))
        }
    }

    /// Cross-reference checks over the whole manifest. Appends every
    /// violation found; never short-circuits.
    fn validate_references(&self, issues: &mut Vec<ValidationIssue>) {
        for container in self.containers.values() {
            if !self.images.contains_key(&container.image) {
                issues.push(ValidationIssue::UnknownImage {
                    container: container.name.clone(),
                    image: container.image.clone(),
                });
            }
            for edge in &container.dependencies {
                if edge.target == container.name {
                    issues.push(ValidationIssue::SelfDependency {
                        container: container.name.clone(),
                    });
                } else if !self.containers.contains_key(&edge.target) {
                    issues.push(ValidationIssue::UnknownDependencyTarget {
                        container: container.name.clone(),
                        target: edge.target.clone(),
                    });
                }
            }
        }

        for cluster in self.clusters.values() {
            let mut seen = HashSet::new();
            for member in &cluster.containers {
                if !seen.insert(member.as_str()) {
                    issues.push(ValidationIssue::DuplicateClusterMember {
                        cluster: cluster.name.clone(),
                        container: member.clone(),
                    });
                }
                if !self.containers.contains_key(member) {
                    issues.push(ValidationIssue::UnknownContainerInCluster {
                        cluster: cluster.name.clone(),
                        container: member.clone(),
                    });
                }
            }
            if let Some(group) = &cluster.group {
                if !self.groups.contains_key(group) {
                    issues.push(ValidationIssue::UnknownGroup {
                        cluster: cluster.name.clone(),
                        group: group.clone(),
                    });
                }
            }
            // A dependency that cannot be satisfied from within the launch
            // set would leave the dependent's alias unbound, so it is a hard
            // error rather than silently ignored.
            let member_set: HashSet<&str> =
                cluster.containers.iter().map(String::as_str).collect();
            for member in &cluster.containers {
                let Some(def) = self.containers.get(member) else {
                    continue;
                };
                for edge in &def.dependencies {
                    if edge.target != *member && !member_set.contains(edge.target.as_str()) {
                        issues.push(ValidationIssue::DependencyOutsideCluster {
                            cluster: cluster.name.clone(),
                            container: member.clone(),
                            target: edge.target.clone(),
                        });
                    }
                }
            }
        }

        for group in self.groups.values() {
            for container in group.per_container.keys() {
                if !self.containers.contains_key(container) {
                    issues.push(ValidationIssue::UnknownContainerInGroup {
                        group: group.name.clone(),
                        container: container.clone(),
                    });
                }
            }
        }
    }

    pub fn image(&self, name: &str) -> Option<&ImageDef> {
        self.images.get(name)
    }

    pub fn container(&self, name: &str) -> Option<&ContainerDef> {
        self.containers.get(name)
    }

    pub fn cluster(&self, name: &str) -> Option<&ClusterDef> {
        self.clusters.get(name)
    }

    pub fn group(&self, name: &str) -> Option<&GroupDef> {
        self.groups.get(name)
    }

    pub fn cluster_names(&self) -> impl Iterator<Item = &str> {
        self.clusters.keys().map(String::as_str)
    }

    pub fn container_names(&self) -> impl Iterator<Item = &str> {
        self.containers.keys().map(String::as_str)
    }
}

fn collect_entries<T>(
    container: &str,
    field: &'static str,
    entries: &[String],
    parse: impl Fn(&str) -> std::result::Result<T, String>,
    out: &mut Vec<T>,
    issues: &mut Vec<ValidationIssue>,
) {
    for entry in entries {
        match parse(entry) {
            Ok(value) => out.push(value),
            Err(reason) => issues.push(ValidationIssue::MalformedEntry {
                container: container.to_string(),
                field,
                entry: entry.clone(),
                reason,
            }),
        }
    }
}

fn convert_overrides(
    context: &str,
    raw: RawOverrides,
    issues: &mut Vec<ValidationIssue>,
) -> OverrideSet {
    let mut set = OverrideSet {
        net: raw.net.map(NetworkMode::from),
        privileged: raw.privileged,
        ..OverrideSet::default()
    };
    collect_entries(context, "port", &raw.port, parse_port, &mut set.ports, issues);
    collect_entries(context, "env", &raw.env, parse_env, &mut set.env, issues);
    collect_entries(context, "mount", &raw.mount, parse_mount, &mut set.mounts, issues);
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ManifestError;

    const EXAMPLE: &str = r#"
images:
  repo/alice: ./alice
  repo/bob: ./bob
containers:
  alice:
    image: repo/alice
    port: ["1234:2345"]
  bob1:
    image: repo/bob
    env: ["SOME_VAR='hello world'"]
    net: host
    dependencies: ["alice:alice_alias"]
    mount: ["./tmp/bob1:/tmp"]
  bob2:
    image: repo/bob
    port: ["2222:1111"]
    dependencies: ["alice:alice_alias"]
clusters:
  vanilla: ["alice", "bob1", "bob2"]
  with_group:
    group: additional_config
    containers: ["alice", "bob2"]
groups:
  additional_config:
    options:
      env: ["SOME_VAR='not world'"]
    containers:
      bob2:
        net: host
        privileged: true
"#;

    fn issues_of(raw: &str) -> Vec<ValidationIssue> {
        match Manifest::from_str(raw) {
            Err(ManifestError::Validation(err)) => err.issues,
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn loads_the_example_manifest() {
        let manifest = Manifest::from_str(EXAMPLE).unwrap();

        let alice = manifest.container("alice").unwrap();
        assert_eq!(alice.image, "repo/alice");
        assert_eq!(
            alice.ports,
            vec![PortMapping {
                host_port: 1234,
                container_port: 2345
            }]
        );

        let bob1 = manifest.container("bob1").unwrap();
        assert_eq!(bob1.net, NetworkMode::Host);
        assert_eq!(bob1.dependencies.len(), 1);
        assert_eq!(bob1.dependencies[0].target, "alice");
        assert_eq!(bob1.dependencies[0].alias, "alice_alias");
        assert_eq!(bob1.mounts[0].container_path, "/tmp");

        let vanilla = manifest.cluster("vanilla").unwrap();
        assert_eq!(vanilla.containers, vec!["alice", "bob1", "bob2"]);
        assert!(vanilla.group.is_none());

        let with_group = manifest.cluster("with_group").unwrap();
        assert_eq!(with_group.group.as_deref(), Some("additional_config"));

        let group = manifest.group("additional_config").unwrap();
        assert_eq!(group.options.env, vec![EnvVar::new("SOME_VAR", "'not world'")]);
        let bob2_overrides = &group.per_container["bob2"];
        assert_eq!(bob2_overrides.net, Some(NetworkMode::Host));
        assert_eq!(bob2_overrides.privileged, Some(true));
    }

    #[test]
    fn accepts_json_documents() {
        let manifest = Manifest::from_str(
            r#"{"images": {"repo/a": "./a"},
                "containers": {"a": {"image": "repo/a"}},
                "clusters": {"solo": ["a"]}}"#,
        )
        .unwrap();
        assert!(manifest.cluster("solo").is_some());
    }

    #[test]
    fn rejects_unknown_image() {
        let issues = issues_of(
            r#"
containers:
  a:
    image: repo/missing
"#,
        );
        assert_eq!(
            issues,
            vec![ValidationIssue::UnknownImage {
                container: "a".to_string(),
                image: "repo/missing".to_string()
            }]
        );
    }

    #[test]
    fn rejects_self_dependency() {
        let issues = issues_of(
            r#"
images:
  repo/a: ./a
containers:
  a:
    image: repo/a
    dependencies: ["a:self_alias"]
"#,
        );
        assert!(issues.contains(&ValidationIssue::SelfDependency {
            container: "a".to_string()
        }));
    }

    #[test]
    fn rejects_dependency_outside_cluster_launch_set() {
        let issues = issues_of(
            r#"
images:
  repo/a: ./a
containers:
  a:
    image: repo/a
  b:
    image: repo/a
    dependencies: ["a:a_alias"]
clusters:
  partial: ["b"]
"#,
        );
        assert!(issues.contains(&ValidationIssue::DependencyOutsideCluster {
            cluster: "partial".to_string(),
            container: "b".to_string(),
            target: "a".to_string()
        }));
    }

    #[test]
    fn rejects_unknown_cluster_member_and_group() {
        let issues = issues_of(
            r#"
images:
  repo/a: ./a
containers:
  a:
    image: repo/a
clusters:
  broken:
    group: nope
    containers: ["a", "ghost"]
"#,
        );
        assert!(issues.contains(&ValidationIssue::UnknownContainerInCluster {
            cluster: "broken".to_string(),
            container: "ghost".to_string()
        }));
        assert!(issues.contains(&ValidationIssue::UnknownGroup {
            cluster: "broken".to_string(),
            group: "nope".to_string()
        }));
    }

    #[test]
    fn rejects_unknown_container_in_group_overrides() {
        let issues = issues_of(
            r#"
images:
  repo/a: ./a
containers:
  a:
    image: repo/a
groups:
  extra:
    containers:
      phantom:
        privileged: true
"#,
        );
        assert!(issues.contains(&ValidationIssue::UnknownContainerInGroup {
            group: "extra".to_string(),
            container: "phantom".to_string()
        }));
    }

    #[test]
    fn rejects_duplicate_cluster_member() {
        let issues = issues_of(
            r#"
images:
  repo/a: ./a
containers:
  a:
    image: repo/a
clusters:
  twice: ["a", "a"]
"#,
        );
        assert!(issues.contains(&ValidationIssue::DuplicateClusterMember {
            cluster: "twice".to_string(),
            container: "a".to_string()
        }));
    }

    #[test]
    fn aggregates_multiple_issues_in_one_pass() {
        let issues = issues_of(
            r#"
containers:
  a:
    image: repo/missing
    port: ["nonsense"]
    dependencies: ["a:self_alias"]
"#,
        );
        assert_eq!(issues.len(), 3);
    }

    #[test]
    fn malformed_entries_are_reported_with_context() {
        let issues = issues_of(
            r#"
images:
  repo/a: ./a
containers:
  a:
    image: repo/a
    env: ["MISSING_EQUALS"]
"#,
        );
        match &issues[0] {
            ValidationIssue::MalformedEntry {
                container, field, ..
            } => {
                assert_eq!(container, "a");
                assert_eq!(*field, "env");
            }
            other => panic!("unexpected issue {other:?}"),
        }
    }
}
