//! Thin asynchronous SSH client over russh.
//!
//! One `Client` wraps one authenticated session, either opened directly
//! against a node or layered over a direct-tcpip channel through a bastion.

use anyhow::{Context, Result};
use russh::client::{Config, Handle, Handler, Msg};
use russh::{Channel, Disconnect};
use std::sync::Arc;
use std::time::Duration;

use super::auth::{self, AuthMethod, KEEPALIVE_COUNT_MAX, KEEPALIVE_INTERVAL_SECS};

/// Captured output of one remote command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: Option<u32>,
}

#[derive(Clone)]
pub struct Client {
    handle: Arc<Handle<ClientHandler>>,
    host: String,
    port: u16,
}

impl Client {
    fn config() -> Arc<Config> {
        Arc::new(Config {
            keepalive_interval: Some(Duration::from_secs(KEEPALIVE_INTERVAL_SECS)),
            keepalive_max: KEEPALIVE_COUNT_MAX,
            ..Config::default()
        })
    }

    /// Open a direct connection and authenticate.
    pub async fn connect(
        host: &str,
        port: u16,
        username: &str,
        auth: &AuthMethod,
        connect_timeout: Duration,
    ) -> Result<Self> {
        tracing::debug!("connecting to {host}:{port}");
        let handler = ClientHandler;
        let mut handle = tokio::time::timeout(
            connect_timeout,
            russh::client::connect(Self::config(), (host, port), handler),
        )
        .await
        .with_context(|| {
            format!(
                "connection to {host}:{port} timed out after {}s",
                connect_timeout.as_secs()
            )
        })?
        .with_context(|| format!("failed to connect to {host}:{port}"))?;

        auth::authenticate(&mut handle, username, auth)
            .await
            .with_context(|| format!("authentication to {host}:{port} as {username} failed"))?;

        Ok(Self {
            handle: Arc::new(handle),
            host: host.to_string(),
            port,
        })
    }

    /// Open a connection to `host:port` tunneled through `relay`: a
    /// direct-tcpip channel is opened on the relay session and the SSH
    /// handshake to the target runs over that stream.
    pub async fn connect_via(
        relay: &Client,
        host: &str,
        port: u16,
        username: &str,
        auth: &AuthMethod,
        connect_timeout: Duration,
    ) -> Result<Self> {
        tracing::debug!(
            "connecting to {host}:{port} via relay {}:{}",
            relay.host,
            relay.port
        );
        let channel = relay
            .open_direct_tcpip(host, port)
            .await
            .with_context(|| format!("failed to open relay channel to {host}:{port}"))?;

        let handler = ClientHandler;
        let mut handle = tokio::time::timeout(
            connect_timeout,
            russh::client::connect_stream(Self::config(), channel.into_stream(), handler),
        )
        .await
        .with_context(|| {
            format!(
                "SSH handshake to {host}:{port} over relay timed out after {}s",
                connect_timeout.as_secs()
            )
        })?
        .with_context(|| format!("failed to establish SSH over relay to {host}:{port}"))?;

        auth::authenticate(&mut handle, username, auth)
            .await
            .with_context(|| format!("authentication to {host}:{port} as {username} failed"))?;

        Ok(Self {
            handle: Arc::new(handle),
            host: host.to_string(),
            port,
        })
    }

    /// Open a `direct-tcpip` forwarding channel to the given target.
    pub async fn open_direct_tcpip(&self, host: &str, port: u16) -> Result<Channel<Msg>> {
        self.handle
            .channel_open_direct_tcpip(host, u32::from(port), "127.0.0.1", 0)
            .await
            .with_context(|| format!("direct-tcpip channel to {host}:{port} refused"))
    }

    /// Execute a remote command and collect its output.
    ///
    /// Every invocation runs in a fresh shell context on the remote side.
    pub async fn execute(&self, command: &str) -> Result<CommandOutput> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .context("failed to open session channel")?;
        channel
            .exec(true, command)
            .await
            .context("failed to start remote command")?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_status = None;

        while let Some(msg) = channel.wait().await {
            match msg {
                russh::ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
                russh::ChannelMsg::ExtendedData { ref data, ext } => {
                    if ext == 1 {
                        stderr.extend_from_slice(data);
                    }
                }
                // The exit status can arrive before the last data frame, so
                // keep draining until the channel closes.
                russh::ChannelMsg::ExitStatus { exit_status: code } => exit_status = Some(code),
                _ => {}
            }
        }

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_status,
        })
    }

    /// Open an SFTP subsystem session on this connection.
    pub async fn open_sftp(&self) -> Result<russh_sftp::client::SftpSession> {
        let channel = self
            .handle
            .channel_open_session()
            .await
            .context("failed to open session channel for SFTP")?;
        channel
            .request_subsystem(true, "sftp")
            .await
            .context("SFTP subsystem request refused")?;
        russh_sftp::client::SftpSession::new(channel.into_stream())
            .await
            .context("SFTP handshake failed")
    }

    pub async fn disconnect(&self) {
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "")
            .await
        {
            tracing::debug!("disconnect from {}:{} failed: {e}", self.host, self.port);
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

/// Handler that accepts any server host key.
///
/// Cluster nodes are created and destroyed routinely, so host keys churn;
/// the original operator workflow runs with host key checking disabled.
#[derive(Debug, Clone)]
pub struct ClientHandler;

impl Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh::keys::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        Ok(true)
    }
}
