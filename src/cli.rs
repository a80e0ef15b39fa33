use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Target;

#[derive(Parser, Debug)]
#[command(
    name = "trinoctl",
    version,
    about = "Manage a Trino/Presto cluster with a Varada acceleration layer",
    long_about = "trinoctl administers a query-engine cluster (one coordinator plus workers,\n\
                  optionally behind a bastion host): service lifecycle, parallel command\n\
                  execution, log collection, warm-up rules, and query running.\n\
                  The cluster topology is read from ~/.trinoctl/config.json\n\
                  (override the directory with TRINOCTL_DIR)."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        short = 'v',
        long,
        action = clap::ArgAction::Count,
        global = true,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,

    #[arg(long, global = true, help = "Topology file path [default: ~/.trinoctl/config.json]")]
    pub config: Option<PathBuf>,

    #[arg(
        short = 'i',
        long,
        global = true,
        help = "SSH private key file path (defaults to agent, then ~/.ssh keys)"
    )]
    pub identity: Option<PathBuf>,

    #[arg(short = 'A', long, global = true, help = "Authenticate via the SSH agent")]
    pub use_agent: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(subcommand, about = "Engine service lifecycle")]
    Server(ServerCommand),

    #[command(about = "Run a shell command on the selected nodes")]
    Exec {
        #[arg(short = 't', long, value_enum, default_value_t = Target::All)]
        target: Target,
        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },

    #[command(about = "Open an interactive SSH session to one node (coordinator, node-0, ...)")]
    Connect {
        #[arg(default_value = "coordinator")]
        node: String,
    },

    #[command(about = "Upload a local file to the selected nodes")]
    Upload {
        local: PathBuf,
        remote: String,
        #[arg(short = 't', long, value_enum, default_value_t = Target::All)]
        target: Target,
    },

    #[command(about = "Download a remote file from the selected nodes")]
    Download {
        remote: String,
        #[arg(
            short = 'd',
            long,
            help = "Destination directory [default: ~/.trinoctl/logs]"
        )]
        destination: Option<PathBuf>,
        #[arg(short = 't', long, value_enum, default_value_t = Target::All)]
        target: Target,
    },

    #[command(subcommand, about = "Log management")]
    Logs(LogsCommand),

    #[command(subcommand, about = "Warm-up rule management")]
    Rules(RulesCommand),

    #[command(subcommand, about = "Query execution")]
    Query(QueryCommand),

    #[command(subcommand, about = "Warm-up validation")]
    Warmup(WarmupCommand),

    #[command(about = "Show v1/info of one node")]
    Info {
        #[arg(default_value = "coordinator")]
        node: String,
    },

    #[command(about = "Collect thread stack dumps from the selected nodes")]
    Jstack {
        #[arg(short = 't', long, value_enum, default_value_t = Target::All)]
        target: Target,
        #[arg(
            short = 'd',
            long,
            help = "Destination directory [default: ~/.trinoctl/logs]"
        )]
        destination: Option<PathBuf>,
    },

    #[command(about = "Scan launcher logs for PANIC and ERROR lines")]
    Panic,
}

#[derive(Subcommand, Debug)]
pub enum ServerCommand {
    #[command(about = "Start the engine service on every node")]
    Start,
    #[command(about = "Stop the engine service on every node")]
    Stop,
    #[command(about = "Restart the engine service on every node")]
    Restart,
    #[command(about = "Check that all nodes are registered with the coordinator")]
    Status,
}

#[derive(Subcommand, Debug)]
pub enum LogsCommand {
    #[command(about = "Stage diagnostics on each node and download the archives")]
    Collect {
        #[arg(
            short = 'd',
            long,
            help = "Destination directory [default: ~/.trinoctl/logs/<timestamp>]"
        )]
        destination: Option<PathBuf>,
    },
    #[command(about = "Delete engine logs on every node")]
    Clear,
    #[command(about = "Write a marker line into every node's debug log")]
    Send {
        #[arg(trailing_var_arg = true, required = true)]
        message: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum RulesCommand {
    #[command(about = "Apply warm-up rules from a JSON or CSV file")]
    Apply {
        #[arg(short = 'j', long, help = "JSON file with a rule object or array")]
        json: Option<PathBuf>,
        #[arg(
            short = 'c',
            long,
            help = "CSV file with one rule per row \
                    (schema,table,colNameId,colWarmUpType,priority,ttl,predicates)"
        )]
        csv: Option<PathBuf>,
    },
    #[command(about = "Fetch warm-up rules, optionally filtered by table/column")]
    Get {
        #[arg(short = 't', long)]
        table: Option<String>,
        #[arg(short = 'l', long)]
        column: Option<String>,
        #[arg(short = 'd', long, help = "Save to <dir>/rules.json instead of printing")]
        destination: Option<PathBuf>,
    },
    #[command(about = "Delete warm-up rules by id, or all of them")]
    Delete {
        #[arg(long, value_delimiter = ',', help = "Rule id(s) to delete")]
        ids: Vec<i64>,
        #[arg(long, help = "Delete every rule on the cluster")]
        all: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum QueryCommand {
    #[command(
        about = "Run queries through the coordinator",
        long_about = "Run queries from a JSON file (a {\"name\": \"sql\"} dictionary) or a\n\
                      text file of ';'-separated statements. Positional arguments select\n\
                      series: names (or 0-based indices for text files) joined by commas\n\
                      run serially, separate arguments run as concurrent series."
    )]
    Run {
        #[arg(short = 'j', long, help = "JSON file mapping query names to SQL")]
        json: Option<PathBuf>,
        #[arg(short = 'f', long, help = "Text file of ';'-separated SQL statements")]
        file: Option<PathBuf>,
        #[arg(short = 'n', long, default_value_t = 1, help = "Number of iterations")]
        iterations: u32,
        #[arg(
            short = 's',
            long,
            default_value_t = 0,
            help = "Seconds to sleep between iterations"
        )]
        sleep: u64,
        #[arg(
            short = 'p',
            long,
            help = "Session properties: key=value[,key=value...]"
        )]
        session_properties: Option<String>,
        #[arg(
            short = 'g',
            long,
            help = "Fetch and print query results (up to 10 rows each when running \
                    more than one query)"
        )]
        results: bool,
        #[arg(help = "Query series to run, e.g. q1,q2 q3")]
        series: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum WarmupCommand {
    #[command(about = "Prime warm queries and poll until warming settles")]
    Validate {
        #[arg(
            short = 'j',
            long,
            help = "JSON file with {\"warm_queries\": [\"sql\", ...]}"
        )]
        queries: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_exec_with_target() {
        let cli = Cli::parse_from(["trinoctl", "exec", "-t", "workers", "uptime"]);
        match cli.command {
            Commands::Exec { target, command } => {
                assert_eq!(target, Target::Workers);
                assert_eq!(command, ["uptime"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parses_rules_delete_ids() {
        let cli = Cli::parse_from(["trinoctl", "rules", "delete", "--ids", "3,5"]);
        match cli.command {
            Commands::Rules(RulesCommand::Delete { ids, all }) => {
                assert_eq!(ids, [3, 5]);
                assert!(!all);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
