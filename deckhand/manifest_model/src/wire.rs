//! Wire-format structs for the manifest document and the colon/equals
//! delimited entry syntax (`hostPort:containerPort`, `KEY=value`,
//! `name:alias`, `hostPath:containerPath`).

use std::collections::HashMap;

use serde::Deserialize;

use deckhand_shared_types::{DependencyEdge, EnvVar, MountSpec, PortMapping};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawManifest {
    #[serde(default)]
    pub images: HashMap<String, String>,
    pub containers: HashMap<String, RawContainer>,
    #[serde(default)]
    pub clusters: HashMap<String, RawCluster>,
    #[serde(default)]
    pub groups: HashMap<String, RawGroup>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawContainer {
    pub image: String,
    #[serde(default)]
    pub port: Vec<String>,
    #[serde(default)]
    pub env: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub net: Option<String>,
    #[serde(default)]
    pub mount: Vec<String>,
    #[serde(default)]
    pub privileged: bool,
}

/// A cluster is either a bare container-name list or a `{group, containers}`
/// pair.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawCluster {
    Plain(Vec<String>),
    Grouped {
        group: String,
        containers: Vec<String>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawGroup {
    #[serde(default)]
    pub options: RawOverrides,
    #[serde(default)]
    pub containers: HashMap<String, RawOverrides>,
}

/// Override fields a group may carry. Same shape as a container definition
/// minus `image` and `dependencies`, which groups can never change.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawOverrides {
    #[serde(default)]
    pub port: Vec<String>,
    #[serde(default)]
    pub env: Vec<String>,
    #[serde(default)]
    pub net: Option<String>,
    #[serde(default)]
    pub mount: Vec<String>,
    #[serde(default)]
    pub privileged: Option<bool>,
}

/// Splits `entry` on the first occurrence of `delimiter`.
fn split_pair<'a>(entry: &'a str, delimiter: char) -> Option<(&'a str, &'a str)> {
    let (left, right) = entry.split_once(delimiter)?;
    if left.is_empty() || right.is_empty() {
        return None;
    }
    Some((left, right))
}

pub fn parse_port(entry: &str) -> std::result::Result<PortMapping, String> {
    let (host, container) = split_pair(entry, ':')
        .ok_or_else(|| "expected 'hostPort:containerPort'".to_string())?;
    let host_port = host
        .parse::<u16>()
        .map_err(|_| format!("invalid host port '{host}'"))?;
    let container_port = container
        .parse::<u16>()
        .map_err(|_| format!("invalid container port '{container}'"))?;
    Ok(PortMapping {
        host_port,
        container_port,
    })
}

pub fn parse_env(entry: &str) -> std::result::Result<EnvVar, String> {
    // Values may themselves contain '='; only the first one delimits.
    let (key, value) = split_pair(entry, '=').ok_or_else(|| "expected 'KEY=value'".to_string())?;
    Ok(EnvVar::new(key, value))
}

pub fn parse_mount(entry: &str) -> std::result::Result<MountSpec, String> {
    let (host_path, container_path) =
        split_pair(entry, ':').ok_or_else(|| "expected 'hostPath:containerPath'".to_string())?;
    Ok(MountSpec {
        host_path: host_path.to_string(),
        container_path: container_path.to_string(),
    })
}

pub fn parse_dependency(entry: &str) -> std::result::Result<DependencyEdge, String> {
    let (target, alias) =
        split_pair(entry, ':').ok_or_else(|| "expected 'containerName:alias'".to_string())?;
    Ok(DependencyEdge {
        target: target.to_string(),
        alias: alias.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_port_entries() {
        let mapping = parse_port("1234:2345").unwrap();
        assert_eq!(mapping.host_port, 1234);
        assert_eq!(mapping.container_port, 2345);

        assert!(parse_port("1234").is_err());
        assert!(parse_port("notaport:80").is_err());
        assert!(parse_port("80:").is_err());
    }

    #[test]
    fn parse_env_entries() {
        let var = parse_env("SOME_VAR='hello world'").unwrap();
        assert_eq!(var.key, "SOME_VAR");
        assert_eq!(var.value, "'hello world'");

        // First '=' delimits, the rest belongs to the value.
        let var = parse_env("OPTS=a=b").unwrap();
        assert_eq!(var.value, "a=b");

        assert!(parse_env("NO_VALUE").is_err());
    }

    #[test]
    fn parse_mount_entries() {
        let mount = parse_mount("./tmp/bob1:/tmp").unwrap();
        assert_eq!(mount.host_path, "./tmp/bob1");
        assert_eq!(mount.container_path, "/tmp");

        assert!(parse_mount("/only-one-side").is_err());
    }

    #[test]
    fn parse_dependency_entries() {
        let edge = parse_dependency("alice:alice_alias").unwrap();
        assert_eq!(edge.target, "alice");
        assert_eq!(edge.alias, "alice_alias");

        assert!(parse_dependency("alice").is_err());
    }

    #[test]
    fn cluster_wire_forms() {
        let plain: RawCluster = serde_yaml_ng::from_str("[alice, bob1]").unwrap();
        assert!(matches!(plain, RawCluster::Plain(names) if names.len() == 2));

        let grouped: RawCluster =
            serde_yaml_ng::from_str("{group: extra, containers: [alice]}").unwrap();
        match grouped {
            RawCluster::Grouped { group, containers } => {
                assert_eq!(group, "extra");
                assert_eq!(containers, vec!["alice".to_string()]);
            }
            RawCluster::Plain(_) => panic!("expected grouped form"),
        }
    }
}
