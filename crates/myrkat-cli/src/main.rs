use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;

use myrkat_cli::{cli::Cli, commands, logging};
use myrkat_config::ConfigLoader;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config =
        ConfigLoader::load(cli.config.as_deref()).context("Failed to load configuration")?;

    if let Some(data_dir) = &cli.data_dir {
        config.storage.data_dir = data_dir.clone();
    }

    logging::init(cli.log_filter(&config.logging.level));
    debug!("Using data directory {}", config.storage.data_dir.display());

    commands::execute(cli.command, config).await
}
