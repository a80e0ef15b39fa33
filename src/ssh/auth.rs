//! Authentication method selection for SSH connections.

use anyhow::{bail, Context, Result};
use russh::client::Handle;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use zeroize::Zeroizing;

use super::client::ClientHandler;

/// Fixed keepalive settings applied to every SSH connection, equivalent to
/// `ServerAliveInterval=150` / `ServerAliveCountMax=4`.
pub const KEEPALIVE_INTERVAL_SECS: u64 = 150;
pub const KEEPALIVE_COUNT_MAX: usize = 4;

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// How to authenticate against a node or bastion.
#[derive(Debug, Clone)]
pub enum AuthMethod {
    /// Try every identity the SSH agent offers.
    Agent,
    /// A specific private key file.
    KeyFile {
        path: PathBuf,
        passphrase: Option<Zeroizing<String>>,
    },
}

/// Connection settings shared by every session a command opens.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub key_path: Option<PathBuf>,
    pub use_agent: bool,
    pub connect_timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            key_path: None,
            use_agent: false,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

impl ConnectOptions {
    /// Determine the authentication method, in priority order:
    /// explicit key file, SSH agent (requested or auto-detected via
    /// `SSH_AUTH_SOCK`), then default key locations.
    pub fn auth_method(&self) -> Result<AuthMethod> {
        if let Some(path) = &self.key_path {
            return Ok(AuthMethod::KeyFile {
                path: path.clone(),
                passphrase: None,
            });
        }

        if self.use_agent || std::env::var_os("SSH_AUTH_SOCK").is_some() {
            return Ok(AuthMethod::Agent);
        }

        for candidate in default_key_paths() {
            if candidate.exists() {
                return Ok(AuthMethod::KeyFile {
                    path: candidate,
                    passphrase: None,
                });
            }
        }

        bail!(
            "no authentication method available: specify a key with -i, \
             run an SSH agent, or provide a default key in ~/.ssh"
        )
    }
}

fn default_key_paths() -> Vec<PathBuf> {
    let Some(home) = dirs::home_dir() else {
        return Vec::new();
    };
    let ssh_dir = home.join(".ssh");
    ["id_ed25519", "id_rsa", "id_ecdsa"]
        .iter()
        .map(|name| ssh_dir.join(name))
        .collect()
}

/// Authenticate an open SSH handle with the given method.
pub(super) async fn authenticate(
    handle: &mut Handle<ClientHandler>,
    username: &str,
    auth: &AuthMethod,
) -> Result<()> {
    match auth {
        AuthMethod::KeyFile { path, passphrase } => {
            let key = russh::keys::load_secret_key(path, passphrase.as_deref().map(|p| &**p))
                .with_context(|| format!("failed to load SSH key {}", path.display()))?;
            let hash_alg = handle.best_supported_rsa_hash().await?.flatten();
            let result = handle
                .authenticate_publickey(
                    username,
                    russh::keys::PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
                )
                .await?;
            if !result.success() {
                bail!("key {} was rejected by the server", path.display());
            }
        }
        AuthMethod::Agent => {
            let mut agent = russh::keys::agent::client::AgentClient::connect_env()
                .await
                .context("cannot connect to SSH agent; is SSH_AUTH_SOCK set?")?;
            let identities = agent
                .request_identities()
                .await
                .context("SSH agent refused to list identities")?;
            if identities.is_empty() {
                bail!("SSH agent has no identities; add one with ssh-add");
            }

            let mut authenticated = false;
            for identity in identities {
                let hash_alg = handle.best_supported_rsa_hash().await?.flatten();
                let result = handle
                    .authenticate_publickey_with(username, identity, hash_alg, &mut agent)
                    .await;
                if matches!(result, Ok(r) if r.success()) {
                    authenticated = true;
                    break;
                }
            }
            if !authenticated {
                bail!("SSH agent authentication failed for user {username}");
            }
        }
    }
    Ok(())
}
