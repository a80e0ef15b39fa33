use anyhow::Result;
use std::path::PathBuf;

use crate::config::{self, Target};
use crate::executor::Fanout;

/// Staging area on each node for collected diagnostics.
const STAGE_DIR: &str = "/tmp/trinoctl_logs";
const STAGE_ARCHIVE: &str = "/tmp/trinoctl_logs.tar.gz";

/// Stage fresh diagnostics on every node and download the archives into
/// `<destination>/<role>-<host>/`.
pub async fn collect(fanout: &Fanout, destination: Option<PathBuf>) -> Result<()> {
    let destination = destination.unwrap_or_else(|| {
        config::logs_dir().join(format!(
            "collect_{}",
            chrono::Utc::now().format("%Y%m%d_%H%M%S")
        ))
    });

    let brand = fanout.topology().distribution.brand;
    let log_dir = brand.log_dir();
    let server_process = brand.server_process();
    let stage = [
        format!("sudo rm -rf {STAGE_DIR}"),
        format!("mkdir {STAGE_DIR}"),
        format!("sudo dmesg > {STAGE_DIR}/dmesg"),
        format!("sudo jps > {STAGE_DIR}/jps"),
        format!("grep {server_process} {STAGE_DIR}/jps | cut -d\" \" -f1 > {STAGE_DIR}/server.pid || true"),
        format!("sudo jstack $(cat {STAGE_DIR}/server.pid) > {STAGE_DIR}/jstack.txt || true"),
        format!("cp {log_dir}/* {STAGE_DIR}/ || true"),
        format!("sudo cp /var/log/messages {STAGE_DIR}/ || true"),
        format!("sudo tar -C {STAGE_DIR} -zcf {STAGE_ARCHIVE} ."),
        format!("sudo chmod 777 {STAGE_ARCHIVE}"),
    ]
    .join(" ; ");

    for result in &fanout.run_command(Target::All, &stage).await {
        result.print_status("diagnostics staged");
    }

    let results = fanout.download(Target::All, STAGE_ARCHIVE, &destination).await;
    for result in &results {
        match &result.outcome {
            Ok(path) => println!("{}: saved {}", result.hostname(), path.display()),
            Err(_) => result.print_status(""),
        }
    }
    Ok(())
}

/// Delete engine logs on every node.
pub async fn clear(fanout: &Fanout) -> Result<()> {
    let log_dir = fanout.topology().distribution.brand.log_dir();
    let results = fanout
        .run_command(Target::All, &format!("sudo rm -rf {log_dir}/*"))
        .await;
    for result in &results {
        result.print_status("logs cleared");
    }
    Ok(())
}

/// Write a marker line into every node's debug log.
pub async fn send(fanout: &Fanout, message: &[String]) -> Result<()> {
    let message = message.join(" ");
    let results = fanout.send_debug_log(Target::All, &message).await;
    for result in &results {
        result.print_status("marker written");
    }
    Ok(())
}
