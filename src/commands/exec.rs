use anyhow::{anyhow, Result};

use crate::config::{Target, Topology};
use crate::executor::Fanout;

/// Fixed arguments for interactive sessions, matching the keepalive and
/// host-key behavior of the managed transports.
const SSH_ARGS: [&str; 10] = [
    "-o",
    "StrictHostKeyChecking=no",
    "-o",
    "UserKnownHostsFile=/dev/null",
    "-o",
    "TCPKeepAlive=yes",
    "-o",
    "ServerAliveInterval=150",
    "-o",
    "ServerAliveCountMax=4",
];

/// Run a shell command on the selected nodes and print each node's output.
pub async fn exec(fanout: &Fanout, target: Target, command: &[String]) -> Result<()> {
    let command = command.join(" ");
    let results = fanout.run_command(target, &command).await;
    for result in &results {
        result.print_output();
    }
    Ok(())
}

/// Replace this process with an interactive `ssh` session to one node.
pub fn connect(topology: &Topology, node: &str) -> Result<()> {
    let connection = topology.connection_by_name(node)?;
    tracing::info!("connecting to {connection}");

    let mut command = std::process::Command::new("ssh");
    command
        .arg(format!("{}@{}", connection.username, connection.hostname))
        .arg("-p")
        .arg(connection.port.to_string())
        .args(SSH_ARGS);
    if let Some(bastion) = &connection.bastion {
        command
            .arg("-J")
            .arg(format!("{}@{}:{}", bastion.username, bastion.hostname, bastion.port));
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        let err = command.exec();
        Err(anyhow!("failed to exec ssh: {err}"))
    }
    #[cfg(not(unix))]
    {
        let status = command.status()?;
        if status.success() {
            Ok(())
        } else {
            Err(anyhow!("ssh exited with {status}"))
        }
    }
}
