//! Strategy simulation CLI application.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use trading_config::load_config;
use trading_monitor::setup_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Strategies = cli.command {
        return cli::commands::strategies::run().await;
    }

    let config = load_config(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    config.validate().context("Invalid configuration")?;

    // Setup logging
    let level = cli
        .log_level
        .map(|l| l.as_str().to_string())
        .unwrap_or_else(|| config.logging.level.clone());
    let json = cli.json_logs || config.logging.is_json();
    let _log_guard = setup_logging(&level, json, config.logging.file.as_deref().map(Path::new))
        .context("Failed to initialise logging")?;

    // Execute command
    match cli.command {
        Commands::Backtest(args) => cli::commands::backtest::run(args, &config).await,
        Commands::Optimize(args) => cli::commands::optimize::run(args, &config).await,
        Commands::Strategies => Ok(()),
        Commands::ValidateConfig => cli::commands::validate::run(&cli.config, &config).await,
    }
}
