use anyhow::Result;
use clap::Parser;

use trinoctl::cli::{Cli, Commands, LogsCommand, QueryCommand, RulesCommand, ServerCommand, WarmupCommand};
use trinoctl::commands::{debug, exec, logs, query, rules, server, warmup};
use trinoctl::config::{self, Topology};
use trinoctl::executor::Fanout;
use trinoctl::logging::init_logging;
use trinoctl::ssh::ConnectOptions;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.config.clone().unwrap_or_else(config::config_path);
    let topology = Topology::load(&config_path)?;
    let options = ConnectOptions {
        key_path: cli.identity.clone(),
        use_agent: cli.use_agent,
        ..Default::default()
    };
    let fanout = Fanout::new(topology, options);

    match cli.command {
        Commands::Server(command) => match command {
            ServerCommand::Start => server::start(&fanout).await?,
            ServerCommand::Stop => server::stop(&fanout).await?,
            ServerCommand::Restart => server::restart(&fanout).await?,
            ServerCommand::Status => server::status(&fanout).await?,
        },

        Commands::Exec { target, command } => exec::exec(&fanout, target, &command).await?,

        Commands::Connect { node } => exec::connect(fanout.topology(), &node)?,

        Commands::Upload {
            local,
            remote,
            target,
        } => {
            for result in &fanout.upload(target, &local, &remote).await {
                result.print_status("file uploaded");
            }
        }

        Commands::Download {
            remote,
            destination,
            target,
        } => {
            let destination = destination.unwrap_or_else(config::logs_dir);
            for result in &fanout.download(target, &remote, &destination).await {
                match &result.outcome {
                    Ok(path) => println!("{}: saved {}", result.hostname(), path.display()),
                    Err(_) => result.print_status(""),
                }
            }
        }

        Commands::Logs(command) => match command {
            LogsCommand::Collect { destination } => logs::collect(&fanout, destination).await?,
            LogsCommand::Clear => logs::clear(&fanout).await?,
            LogsCommand::Send { message } => logs::send(&fanout, &message).await?,
        },

        Commands::Rules(command) => match command {
            RulesCommand::Apply { json, csv } => {
                rules::apply(&fanout, json.as_deref(), csv.as_deref()).await?
            }
            RulesCommand::Get {
                table,
                column,
                destination,
            } => rules::get(&fanout, table.as_deref(), column.as_deref(), destination).await?,
            RulesCommand::Delete { ids, all } => rules::delete(&fanout, &ids, all).await?,
        },

        Commands::Query(QueryCommand::Run {
            json,
            file,
            iterations,
            sleep,
            session_properties,
            results,
            series,
        }) => {
            query::run(
                &fanout,
                query::RunParams {
                    json,
                    file,
                    iterations,
                    sleep,
                    session_properties,
                    results,
                    series,
                },
            )
            .await?
        }

        Commands::Warmup(WarmupCommand::Validate { queries }) => {
            warmup::validate(&fanout, &queries).await?
        }

        Commands::Info { node } => debug::info(&fanout, &node).await?,

        Commands::Jstack {
            target,
            destination,
        } => debug::jstack(&fanout, target, destination).await?,

        Commands::Panic => debug::panic_scan(&fanout).await?,
    }

    Ok(())
}
