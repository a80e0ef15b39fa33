//! Remote shell execution sessions.

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::node::NodeConnection;
use crate::transport::Transport;

use super::auth::ConnectOptions;
use super::client::Client;

/// One live shell session against one node, possibly layered over a
/// bastion relay session.
pub struct ShellSession {
    host: String,
    client: Client,
    relay: Option<Client>,
}

impl ShellSession {
    pub async fn open(node: &NodeConnection, options: &ConnectOptions) -> Result<Self> {
        let auth = options
            .auth_method()
            .map_err(|e| Error::connection(&node.hostname, e))?;

        let (client, relay) = match &node.bastion {
            None => {
                let client = Client::connect(
                    &node.hostname,
                    node.port,
                    &node.username,
                    &auth,
                    options.connect_timeout,
                )
                .await
                .map_err(|e| Error::connection(&node.hostname, e))?;
                (client, None)
            }
            Some(bastion) => {
                let relay = Client::connect(
                    &bastion.hostname,
                    bastion.port,
                    &bastion.username,
                    &auth,
                    options.connect_timeout,
                )
                .await
                .map_err(|e| Error::connection(&node.hostname, e))?;

                match Client::connect_via(
                    &relay,
                    &node.hostname,
                    node.port,
                    &node.username,
                    &auth,
                    options.connect_timeout,
                )
                .await
                {
                    Ok(client) => (client, Some(relay)),
                    Err(e) => {
                        // The relay must not outlive a failed inner setup.
                        relay.disconnect().await;
                        return Err(Error::connection(&node.hostname, e));
                    }
                }
            }
        };

        Ok(Self {
            host: node.hostname.clone(),
            client,
            relay,
        })
    }

    /// Run a command and return its stdout. No exit-code policy is applied
    /// here; callers inspect the returned text.
    pub async fn execute(&self, command: &str) -> Result<String> {
        tracing::debug!("<{}> executing: {command}", self.host);
        let output = self
            .client
            .execute(command)
            .await
            .map_err(|e| Error::connection(&self.host, e))?;
        Ok(output.stdout)
    }

    pub(super) fn client(&self) -> &Client {
        &self.client
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Tear the session down: inner connection first, relay second.
    pub async fn close(self) {
        self.client.disconnect().await;
        if let Some(relay) = self.relay {
            relay.disconnect().await;
        }
    }
}

/// Shell variant of the transport contract.
#[derive(Clone)]
pub struct ShellTransport {
    options: ConnectOptions,
}

impl ShellTransport {
    pub fn new(options: ConnectOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Transport for ShellTransport {
    type Session = ShellSession;

    async fn open(&self, node: &NodeConnection) -> Result<ShellSession> {
        ShellSession::open(node, &self.options).await
    }

    async fn close(&self, session: ShellSession) {
        session.close().await;
    }
}
