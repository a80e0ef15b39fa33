use anyhow::Result;
use std::path::PathBuf;

use crate::config::{self, Target};
use crate::executor::Fanout;
use crate::rest::EngineRest;

/// Print `v1/info` of one node.
pub async fn info(fanout: &Fanout, node: &str) -> Result<()> {
    let connection = fanout.topology().connection_by_name(node)?;
    let engine = EngineRest::open(&connection, fanout.options()).await?;
    let outcome = engine.info().await;
    engine.close().await;
    println!("{}", serde_json::to_string_pretty(&outcome?)?);
    Ok(())
}

/// Collect thread dumps from the selected nodes into
/// `<destination>/jstack_<host>.json`.
pub async fn jstack(fanout: &Fanout, target: Target, destination: Option<PathBuf>) -> Result<()> {
    let destination = destination.unwrap_or_else(config::logs_dir);
    std::fs::create_dir_all(&destination)?;

    let results = fanout.thread_dumps(target).await;
    for result in &results {
        match &result.outcome {
            Ok(dump) => {
                let path = destination.join(format!("jstack_{}.json", result.hostname()));
                std::fs::write(&path, serde_json::to_string_pretty(dump)?)?;
                println!("{}: saved {}", result.hostname(), path.display());
            }
            Err(_) => result.print_status(""),
        }
    }
    Ok(())
}

/// Scan the tail of each node's launcher log for PANIC and ERROR lines.
pub async fn panic_scan(fanout: &Fanout) -> Result<()> {
    let log_dir = fanout.topology().distribution.brand.log_dir();
    for (pattern, label) in [("PANIC", "panic"), ("ERROR", "error")] {
        let command = format!("tail -n 30 {log_dir}/launcher.log | grep {pattern} | wc -l");
        let results = fanout.run_command(Target::All, &command).await;
        for result in &results {
            match &result.outcome {
                Ok(count) => {
                    if count.trim().parse::<u64>().unwrap_or(0) > 0 {
                        println!("found {label} in {}", result.hostname());
                    } else {
                        println!("no {label} found in {}", result.hostname());
                    }
                }
                Err(_) => result.print_status(""),
            }
        }
    }
    Ok(())
}
