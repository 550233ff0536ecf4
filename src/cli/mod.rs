//! CLI definitions.

pub mod commands;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "trading-sim")]
#[command(author, version, about = "Strategy simulation and execution engine")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Log level, overrides the configured one
    #[arg(short, long)]
    pub log_level: Option<LogLevel>,

    /// Enable JSON log format
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replay one strategy over historical candles
    Backtest(BacktestArgs),
    /// Sweep strategy parameters and rank the results
    Optimize(OptimizeArgs),
    /// List available strategies and their parameters
    Strategies,
    /// Validate configuration
    ValidateConfig,
}

/// Options shared by every command that replays candles.
#[derive(clap::Args)]
pub struct ReplayArgs {
    /// Strategy to run
    #[arg(short, long)]
    pub strategy: String,

    /// Strategy parameters as a JSON object
    #[arg(short, long)]
    pub params: Option<String>,

    /// Candle CSV file, overrides run.data_file
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// First bar to replay (RFC 3339)
    #[arg(long)]
    pub from: Option<DateTime<Utc>>,

    /// End of the replay, exclusive (RFC 3339)
    #[arg(long)]
    pub to: Option<DateTime<Utc>>,

    /// Seed for synthetic ticks, overrides run.seed
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(clap::Args)]
pub struct BacktestArgs {
    #[command(flatten)]
    pub replay: ReplayArgs,

    /// Run identifier used in events and logs
    #[arg(long)]
    pub id: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Save the JSON report to file
    #[arg(long)]
    pub save: Option<PathBuf>,

    /// Save the equity curve as CSV
    #[arg(long)]
    pub equity_csv: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct OptimizeArgs {
    #[command(flatten)]
    pub replay: ReplayArgs,

    /// Parameters to sweep (comma-separated)
    #[arg(long, value_delimiter = ',', required = true)]
    pub sweep: Vec<String>,

    /// Concurrent trials, overrides optimization.max_concurrency
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Trial limit, overrides optimization.max_trials
    #[arg(long)]
    pub max_trials: Option<usize>,

    /// Number of ranked trials to print
    #[arg(long, default_value = "10")]
    pub top: usize,

    /// Save the full JSON report to file
    #[arg(long)]
    pub save: Option<PathBuf>,
}
