use serde::Deserialize;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::node::{BastionSpec, Brand, NodeConnection, Role};

const DEFAULT_SSH_PORT: u16 = 22;
const DEFAULT_API_PORT: u16 = 8080;
const DEFAULT_VARADA_PORT: u16 = 8088;

/// Which nodes an operation fans out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Target {
    #[default]
    All,
    Coordinator,
    Workers,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::All => write!(f, "all"),
            Target::Coordinator => write!(f, "coordinator"),
            Target::Workers => write!(f, "workers"),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BastionSection {
    pub hostname: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct DistributionSection {
    #[serde(default = "default_brand")]
    pub brand: Brand,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for DistributionSection {
    fn default() -> Self {
        Self {
            brand: Brand::Trino,
            port: DEFAULT_API_PORT,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VaradaSection {
    #[serde(default = "default_varada_port")]
    pub port: u16,
}

impl Default for VaradaSection {
    fn default() -> Self {
        Self {
            port: DEFAULT_VARADA_PORT,
        }
    }
}

fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}

fn default_brand() -> Brand {
    Brand::Trino
}

fn default_api_port() -> u16 {
    DEFAULT_API_PORT
}

fn default_varada_port() -> u16 {
    DEFAULT_VARADA_PORT
}

/// Static cluster topology, loaded from the JSON config file.
///
/// Connection descriptors are derived from this on every resolve; the
/// topology itself is read-only for the lifetime of a command.
#[derive(Debug, Deserialize)]
pub struct Topology {
    pub coordinator: String,
    pub workers: Vec<String>,
    pub username: String,
    pub port: u16,
    #[serde(default)]
    pub bastion: Option<BastionSection>,
    #[serde(default)]
    pub distribution: DistributionSection,
    #[serde(default)]
    pub varada: VaradaSection,
}

impl Topology {
    pub fn parse(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::parse(&content)
    }

    /// A single-node cluster: the coordinator doubles as the sole worker.
    pub fn is_single(&self) -> bool {
        self.workers.len() == 1 && self.workers[0] == self.coordinator
    }

    pub fn number_of_nodes(&self) -> usize {
        if self.is_single() {
            1
        } else {
            self.workers.len() + 1
        }
    }

    fn connection(&self, hostname: &str, role: Role) -> NodeConnection {
        NodeConnection {
            hostname: hostname.to_string(),
            port: self.port,
            username: self.username.clone(),
            role,
            bastion: self.bastion.as_ref().map(|b| BastionSpec {
                hostname: b.hostname.clone(),
                port: b.port,
                username: b.username.clone(),
            }),
            brand: self.distribution.brand,
            api_port: self.distribution.port,
            varada_port: self.varada.port,
        }
    }

    pub fn coordinator_connection(&self) -> NodeConnection {
        self.connection(&self.coordinator, Role::Coordinator)
    }

    pub fn worker_connections(&self) -> Vec<NodeConnection> {
        if self.is_single() {
            return Vec::new();
        }
        self.workers
            .iter()
            .map(|w| self.connection(w, Role::Worker))
            .collect()
    }

    /// Resolve a target selection into connection descriptors, in topology
    /// order: coordinator first, then workers by position.
    pub fn resolve(&self, target: Target) -> Vec<NodeConnection> {
        match target {
            Target::Coordinator => vec![self.coordinator_connection()],
            Target::Workers => self.worker_connections(),
            Target::All => {
                let mut connections = vec![self.coordinator_connection()];
                connections.extend(self.worker_connections());
                connections
            }
        }
    }

    /// Look up a single node by name: `coordinator` or `node-<i>` where `i`
    /// is the 0-based worker position.
    pub fn connection_by_name(&self, name: &str) -> Result<NodeConnection> {
        if name == "coordinator" {
            return Ok(self.coordinator_connection());
        }
        let position = name
            .strip_prefix("node-")
            .and_then(|p| p.parse::<usize>().ok())
            .ok_or_else(|| Error::InvalidTarget(name.to_string()))?;
        if position >= self.workers.len() {
            return Err(Error::InvalidTarget(format!(
                "worker node out of range: got {name}, but there are only {} workers",
                self.workers.len()
            )));
        }
        Ok(self.connection(&self.workers[position], Role::Worker))
    }
}

/// Root directory for config and collected logs, `~/.trinoctl` unless
/// overridden via `TRINOCTL_DIR`.
pub fn config_dir() -> PathBuf {
    env::var_os("TRINOCTL_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".trinoctl")
        })
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

pub fn logs_dir() -> PathBuf {
    config_dir().join("logs")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn multi_node() -> Topology {
        Topology::parse(
            r#"{
                "coordinator": "coord.example.com",
                "workers": ["w0.example.com", "w1.example.com"],
                "username": "ops",
                "port": 22
            }"#,
        )
        .unwrap()
    }

    fn single_node() -> Topology {
        Topology::parse(
            r#"{
                "coordinator": "node.example.com",
                "workers": ["node.example.com"],
                "username": "ops",
                "port": 22
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn resolve_all_in_topology_order() {
        let topology = multi_node();
        let connections = topology.resolve(Target::All);
        let hosts: Vec<_> = connections.iter().map(|c| c.hostname.as_str()).collect();
        assert_eq!(hosts, ["coord.example.com", "w0.example.com", "w1.example.com"]);
        assert_eq!(connections[0].role, Role::Coordinator);
        assert_eq!(connections[1].role, Role::Worker);
        assert_eq!(topology.number_of_nodes(), 3);
    }

    #[test]
    fn single_node_cluster_has_no_workers() {
        let topology = single_node();
        assert!(topology.is_single());
        assert_eq!(topology.number_of_nodes(), 1);
        assert!(topology.resolve(Target::Workers).is_empty());
        assert_eq!(topology.resolve(Target::All).len(), 1);
    }

    #[test]
    fn connection_by_name() {
        let topology = multi_node();
        assert_eq!(
            topology.connection_by_name("coordinator").unwrap().hostname,
            "coord.example.com"
        );
        assert_eq!(
            topology.connection_by_name("node-1").unwrap().hostname,
            "w1.example.com"
        );
    }

    #[test]
    fn connection_by_name_rejects_unknown() {
        let topology = multi_node();
        assert!(matches!(
            topology.connection_by_name("node-2"),
            Err(Error::InvalidTarget(_))
        ));
        assert!(matches!(
            topology.connection_by_name("node-x"),
            Err(Error::InvalidTarget(_))
        ));
        assert!(matches!(
            topology.connection_by_name("gateway"),
            Err(Error::InvalidTarget(_))
        ));
    }

    #[test]
    fn bastion_applies_to_every_connection() {
        let topology = Topology::parse(
            r#"{
                "coordinator": "coord.internal",
                "workers": ["w0.internal"],
                "username": "ops",
                "port": 22,
                "bastion": {"hostname": "gw.example.com", "username": "jump"}
            }"#,
        )
        .unwrap();
        for connection in topology.resolve(Target::All) {
            let bastion = connection.bastion.expect("bastion expected");
            assert_eq!(bastion.hostname, "gw.example.com");
            assert_eq!(bastion.port, 22);
        }
    }

    #[test]
    fn partial_bastion_section_is_rejected() {
        let result = Topology::parse(
            r#"{
                "coordinator": "coord.internal",
                "workers": [],
                "username": "ops",
                "port": 22,
                "bastion": {"hostname": "gw.example.com"}
            }"#,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn load_reads_topology_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"coordinator": "c", "workers": [], "username": "ops", "port": 22}"#,
        )
        .unwrap();
        let topology = Topology::load(&path).unwrap();
        assert_eq!(topology.coordinator, "c");

        let missing = Topology::load(&dir.path().join("nope.json"));
        assert!(matches!(missing, Err(Error::Config(_))));
    }

    #[test]
    fn distribution_defaults() {
        let topology = multi_node();
        assert_eq!(topology.distribution.brand, Brand::Trino);
        assert_eq!(topology.distribution.port, 8080);
        assert_eq!(topology.varada.port, 8088);
    }
}
