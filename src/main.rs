//! AutoPromptr - durable sequential prompt-batch execution engine
//!
//! Main entry point for the AutoPromptr server and its client commands.

mod cli;
mod commands;
mod server;

use clap::Parser;
use tracing::warn;

use autopromptr_config::{ConfigLoader, ConfigValidator};

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    server::init_tracing()?;

    let cli = Cli::parse();
    let mut config = ConfigLoader::load_or_default(&cli.config)?;
    for warning in ConfigValidator::validate(&config).into_result()? {
        warn!("Config {}: {}", warning.path, warning.message);
    }
    if let Some(url) = cli.url {
        config.client.base_url = url;
    }

    match cli.command {
        None => server::run_server(config).await,
        Some(Commands::Run { host, port }) => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            server::run_server(config).await
        }
        Some(Commands::Client(command)) => commands::run(&config, command).await,
    }
}
