//! Per-node outcome of one fanned-out operation.

use owo_colors::OwoColorize;

use crate::error::Result;
use crate::node::NodeConnection;

/// Pairing of a node and the outcome of its task. Failures are carried as
/// values, never re-raised, so the caller can report per-node status.
#[derive(Debug)]
pub struct TaskResult<T> {
    pub node: NodeConnection,
    pub outcome: Result<T>,
}

impl<T> TaskResult<T> {
    pub fn hostname(&self) -> &str {
        &self.node.hostname
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Print a one-line status for this node: a green dot and the given
    /// verb on success, a red dot and the error chain on failure.
    pub fn print_status(&self, success_verb: &str) {
        match &self.outcome {
            Ok(_) => {
                println!(
                    "{} {}: {}",
                    "●".green(),
                    self.hostname().bold(),
                    success_verb.green()
                );
            }
            Err(e) => {
                println!("{} {}: {}", "●".red(), self.hostname().bold(), "failed".red());
                for line in format!("{e:#}").lines() {
                    println!("    {}", line.dimmed());
                }
            }
        }
    }
}

impl TaskResult<String> {
    /// Print the captured command output under the node's name.
    pub fn print_output(&self) {
        match &self.outcome {
            Ok(text) => {
                println!("{}: {}", self.hostname().bold(), text.trim_end());
            }
            Err(e) => {
                println!("{}: {}", self.hostname().bold(), format!("{e:#}").red());
            }
        }
    }
}
