//! SSH transport: russh-based client, bastion relaying, and the shell and
//! SFTP session variants used by the fan-out executor.

pub mod auth;
pub mod client;
pub mod relay;
pub mod sftp;
pub mod shell;

pub use auth::{AuthMethod, ConnectOptions};
pub use client::Client;
pub use relay::TcpRelay;
pub use sftp::{SftpSession, SftpTransport};
pub use shell::{ShellSession, ShellTransport};
