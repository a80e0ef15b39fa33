//! Local TCP relay through a bastion host.
//!
//! HTTP-based transports cannot speak through an SSH channel directly, so
//! for bastion-relayed REST and query sessions we bind a local listener and
//! pipe every accepted connection through a fresh direct-tcpip channel on
//! the bastion session. The listener lives exactly as long as the session
//! that owns it.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::node::BastionSpec;

use super::auth::ConnectOptions;
use super::client::Client;

pub struct TcpRelay {
    client: Client,
    accept_task: JoinHandle<()>,
    local_addr: SocketAddr,
}

impl TcpRelay {
    /// Connect to the bastion and start forwarding `127.0.0.1:<ephemeral>`
    /// to `target_host:target_port` through it.
    pub async fn open(
        bastion: &BastionSpec,
        options: &ConnectOptions,
        target_host: &str,
        target_port: u16,
    ) -> Result<Self> {
        let auth = options.auth_method()?;
        let client = Client::connect(
            &bastion.hostname,
            bastion.port,
            &bastion.username,
            &auth,
            options.connect_timeout,
        )
        .await
        .with_context(|| format!("failed to reach bastion {}", bastion.hostname))?;

        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .context("failed to bind local relay listener")?;
        let local_addr = listener.local_addr()?;

        tracing::debug!(
            "relaying {local_addr} -> {}:{} via {}",
            target_host,
            target_port,
            bastion.hostname
        );

        let forward_client = client.clone();
        let host = target_host.to_string();
        let accept_task = tokio::spawn(async move {
            loop {
                let (mut stream, peer) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::warn!("relay accept failed: {e}");
                        break;
                    }
                };
                tracing::trace!("relay connection from {peer}");

                let client = forward_client.clone();
                let host = host.clone();
                tokio::spawn(async move {
                    match client.open_direct_tcpip(&host, target_port).await {
                        Ok(channel) => {
                            let mut tunnel = channel.into_stream();
                            if let Err(e) =
                                tokio::io::copy_bidirectional(&mut stream, &mut tunnel).await
                            {
                                tracing::trace!("relay stream to {host}:{target_port} ended: {e}");
                            }
                        }
                        Err(e) => {
                            tracing::warn!("relay channel to {host}:{target_port} failed: {e}");
                        }
                    }
                });
            }
        });

        Ok(Self {
            client,
            accept_task,
            local_addr,
        })
    }

    /// Local address the relayed service is reachable on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and tear the bastion session down. Must
    /// run after the session using the relay has closed.
    pub async fn close(self) {
        self.accept_task.abort();
        self.client.disconnect().await;
    }
}
