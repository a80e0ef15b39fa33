use serde::{Deserialize, Serialize};
use std::fmt;

/// Cluster role of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Coordinator,
    Worker,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Coordinator => write!(f, "coordinator"),
            Role::Worker => write!(f, "worker"),
        }
    }
}

/// Engine distribution brand, which decides the user/session header names
/// the REST and statement protocols expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Brand {
    Trino,
    Presto,
}

impl Brand {
    pub fn user_header(&self) -> &'static str {
        match self {
            Brand::Trino => "X-Trino-User",
            Brand::Presto => "X-Presto-User",
        }
    }

    pub fn session_header(&self) -> &'static str {
        match self {
            Brand::Trino => "X-Trino-Session",
            Brand::Presto => "X-Presto-Session",
        }
    }

    /// systemd unit the engine runs as.
    pub fn service_name(&self) -> &'static str {
        match self {
            Brand::Trino => "trino",
            Brand::Presto => "presto",
        }
    }

    pub fn log_dir(&self) -> &'static str {
        match self {
            Brand::Trino => "/var/log/trino",
            Brand::Presto => "/var/log/presto",
        }
    }

    /// Name of the server JVM in `jps` listings.
    pub fn server_process(&self) -> &'static str {
        match self {
            Brand::Trino => "TrinoServer",
            Brand::Presto => "PrestoServer",
        }
    }
}

/// Bastion relay endpoint. All three fields are required: a connection
/// either relays through a bastion or it does not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BastionSpec {
    pub hostname: String,
    pub port: u16,
    pub username: String,
}

/// Resolved connection descriptor for one cluster member.
///
/// These are value objects rebuilt from the static topology on every
/// resolve; they are never mutated.
#[derive(Debug, Clone)]
pub struct NodeConnection {
    pub hostname: String,
    pub port: u16,
    pub username: String,
    pub role: Role,
    pub bastion: Option<BastionSpec>,
    pub brand: Brand,
    /// Engine HTTP API port (statement protocol and v1 endpoints).
    pub api_port: u16,
    /// Acceleration layer HTTP port (v1/ext/varada endpoints).
    pub varada_port: u16,
}

impl NodeConnection {
    pub fn with_bastion(&self) -> bool {
        self.bastion.is_some()
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }
}

impl fmt::Display for NodeConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}> ", self.role)?;
        if let Some(bastion) = &self.bastion {
            write!(
                f,
                "{}@{}:{} --> ",
                bastion.username, bastion.hostname, bastion.port
            )?;
        }
        write!(f, "{}@{}:{}", self.username, self.hostname, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn direct_node() -> NodeConnection {
        NodeConnection {
            hostname: "worker-0.example.com".to_string(),
            port: 22,
            username: "ops".to_string(),
            role: Role::Worker,
            bastion: None,
            brand: Brand::Trino,
            api_port: 8080,
            varada_port: 8088,
        }
    }

    #[test]
    fn display_without_bastion() {
        let node = direct_node();
        assert_eq!(node.to_string(), "<worker> ops@worker-0.example.com:22");
        assert!(!node.with_bastion());
    }

    #[test]
    fn display_with_bastion() {
        let mut node = direct_node();
        node.bastion = Some(BastionSpec {
            hostname: "gw.example.com".to_string(),
            port: 22,
            username: "jump".to_string(),
        });
        assert_eq!(
            node.to_string(),
            "<worker> jump@gw.example.com:22 --> ops@worker-0.example.com:22"
        );
        assert!(node.with_bastion());
    }

    #[test]
    fn brand_headers() {
        assert_eq!(Brand::Trino.user_header(), "X-Trino-User");
        assert_eq!(Brand::Presto.user_header(), "X-Presto-User");
        assert_eq!(Brand::Trino.session_header(), "X-Trino-Session");
    }
}
