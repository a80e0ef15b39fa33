//! SFTP file transfer sessions, layered on the shell session machinery.

use async_trait::async_trait;
use std::io;
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::node::NodeConnection;
use crate::transport::Transport;

use super::auth::ConnectOptions;
use super::shell::ShellSession;

pub struct SftpSession {
    shell: ShellSession,
    sftp: russh_sftp::client::SftpSession,
}

impl SftpSession {
    pub async fn open(node: &NodeConnection, options: &ConnectOptions) -> Result<Self> {
        let shell = ShellSession::open(node, options).await?;
        let sftp = match shell.client().open_sftp().await {
            Ok(sftp) => sftp,
            Err(e) => {
                let err = Error::connection(shell.host(), e);
                shell.close().await;
                return Err(err);
            }
        };
        Ok(Self { shell, sftp })
    }

    /// Download a remote file, creating local parent directories as needed.
    pub async fn fetch(&mut self, remote_path: &str, local_path: &Path) -> Result<()> {
        tracing::debug!(
            "fetching {}:{remote_path} -> {}",
            self.shell.host(),
            local_path.display()
        );

        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut remote_file = self
            .sftp
            .open(remote_path)
            .await
            .map_err(|e| Error::Io(io::Error::other(format!("open {remote_path}: {e}"))))?;
        let mut buffer = Vec::new();
        remote_file
            .read_to_end(&mut buffer)
            .await
            .map_err(|e| Error::Io(io::Error::other(format!("read {remote_path}: {e}"))))?;

        tokio::fs::write(local_path, buffer).await?;
        Ok(())
    }

    /// Upload a local file to the remote path.
    pub async fn send(&mut self, local_path: &Path, remote_path: &str) -> Result<()> {
        tracing::debug!(
            "sending {} -> {}:{remote_path}",
            local_path.display(),
            self.shell.host()
        );

        let buffer = tokio::fs::read(local_path).await?;

        let mut remote_file = self
            .sftp
            .create(remote_path)
            .await
            .map_err(|e| Error::Io(io::Error::other(format!("create {remote_path}: {e}"))))?;
        remote_file
            .write_all(&buffer)
            .await
            .map_err(|e| Error::Io(io::Error::other(format!("write {remote_path}: {e}"))))?;
        remote_file
            .shutdown()
            .await
            .map_err(|e| Error::Io(io::Error::other(format!("flush {remote_path}: {e}"))))?;
        Ok(())
    }

    pub async fn close(self) {
        // Dropping the handle closes the SFTP channel; the SSH session
        // (and any relay under it) goes down after it.
        drop(self.sftp);
        self.shell.close().await;
    }
}

/// Data-transfer variant of the transport contract.
#[derive(Clone)]
pub struct SftpTransport {
    options: ConnectOptions,
}

impl SftpTransport {
    pub fn new(options: ConnectOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Transport for SftpTransport {
    type Session = SftpSession;

    async fn open(&self, node: &NodeConnection) -> Result<SftpSession> {
        SftpSession::open(node, &self.options).await
    }

    async fn close(&self, session: SftpSession) {
        session.close().await;
    }
}
