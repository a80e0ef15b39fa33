use std::io;

/// Error taxonomy for cluster operations.
///
/// `Connection` failures are captured per node by the fan-out executor and
/// never abort sibling tasks; `InvalidTarget` and `Config` are raised before
/// any fan-out begins and abort the whole command.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested node name or index does not exist in the topology.
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// Failed to open a transport session (network, auth, or relay setup).
    #[error("connection to {host} failed: {source}")]
    Connection {
        host: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A REST call returned a non-OK status.
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    /// Query execution failed or the statement protocol was violated.
    #[error("query execution failed: {0}")]
    Protocol(String),

    /// The topology file is missing or malformed.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub fn connection(
        host: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Connection {
            host: host.into(),
            source: source.into(),
        }
    }

    /// Whether this error was raised while opening a session, as opposed to
    /// during the operation itself.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
