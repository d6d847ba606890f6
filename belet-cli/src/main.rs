mod cli;
mod commands;
mod config;
mod output;

use std::{io, process};

use anyhow::Result;
use belet_api::{BeletClient, HomepageQuery};
use clap::{CommandFactory, Parser};
use colored::*;
use tracing::{debug, error};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::{
    cli::{Args, Commands, OutputFormat},
    commands::CommandExecutor,
    output::OutputManager,
};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let format = args.format;

    if let Err(e) = run(args).await {
        match format {
            OutputFormat::Json => {
                let error_json = serde_json::json!({
                    "status": "error",
                    "message": format!("{e:#}"),
                });
                println!("{error_json}");
            }
            OutputFormat::Pretty => {
                error!("Application error: {e:#}");
                eprintln!("{} {:#}", "Error:".red().bold(), e);
                let relogin = e
                    .downcast_ref::<belet_api::Error>()
                    .is_some_and(belet_api::Error::requires_relogin);
                if relogin {
                    eprintln!("{}", "Run `belet login <phone>` to sign in again.".yellow());
                }
            }
        }
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    if let Commands::Completions { shell } = args.command {
        clap_complete::generate(shell, &mut Args::command(), "belet", &mut io::stdout());
        return Ok(());
    }

    init_logging(args.verbose, args.quiet);

    let mut config = config::load(args.config.as_deref())?;
    if let Some(data_file) = args.data_file {
        config.data_file = data_file;
    }
    debug!(?config, "Loaded configuration");

    let client = BeletClient::new(config).await?;
    let executor = CommandExecutor::new(client, OutputManager::new(args.format));

    match args.command {
        Commands::Login { phone, code } => executor.login(&phone, code).await,
        Commands::Logout => executor.logout().await,
        Commands::Status => executor.status().await,
        Commands::Item { id, season } => executor.item(&id, season).await,
        Commands::Home {
            offset,
            limit,
            home_limit,
            type_id,
        } => {
            executor
                .home(HomepageQuery {
                    offset,
                    limit,
                    home_limit,
                    type_id,
                })
                .await
        }
        Commands::Search {
            text,
            page,
            order,
            filters,
            sort,
        } => {
            executor
                .search(&text, page, order, &filters, sort.as_deref())
                .await
        }
        Commands::Filters => executor.filters().await,
        Commands::Download { source, output } => {
            executor.download(&source, output.as_deref()).await
        }
        Commands::Watch {
            item,
            seconds,
            season,
        } => executor.watch(&item, seconds, season).await,
        Commands::Completions { .. } => Ok(()),
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_target(false)
                .with_level(verbose),
        )
        .init();
}
