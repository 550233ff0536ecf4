//! Backtest command implementation.

use anyhow::{Context, Result};
use trading_config::AppConfig;
use trading_core::types::StopReason;
use trading_engine::{build_backtest, RunReport};
use trading_strategies::StrategyRegistry;
use tracing::{info, warn};
use uuid::Uuid;

use super::support::{backtest_spec, candle_source, parse_params, Publisher};
use crate::cli::{BacktestArgs, OutputFormat};

pub async fn run(args: BacktestArgs, config: &AppConfig) -> Result<()> {
    let replay = &args.replay;
    info!("Starting backtest for strategy: {}", replay.strategy);

    let registry = StrategyRegistry::new();
    let params = parse_params(replay.params.as_deref())?;
    let strategy = registry
        .create(&replay.strategy, &params)
        .context("Failed to create strategy")?;

    let id = args
        .id
        .clone()
        .unwrap_or_else(|| format!("{}-{}", replay.strategy, &Uuid::new_v4().simple().to_string()[..8]));
    let spec = backtest_spec(config, replay, id)?;
    let source = candle_source(config, replay)?;
    let publisher = Publisher::from_config(config);

    let executor = build_backtest(&spec, source, strategy, publisher.shared());
    executor.initialise().await.context("Strategy failed to start")?;

    let handle = executor.handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping the run");
            handle.stop(StopReason::requested("interrupted")).await;
        }
    });
    let summary = executor.run().await.context("Backtest did not run")?;
    interrupt.abort();
    publisher.flush().await;

    let report = RunReport::new(&replay.strategy, &spec.instrument.symbol, spec.period, summary);
    match args.output {
        OutputFormat::Json => println!("{}", report.to_json()?),
        OutputFormat::Text => println!("{}", report.summary()),
    }

    if let Some(save_path) = &args.save {
        std::fs::write(save_path, report.to_json()?)
            .with_context(|| format!("Failed to write {}", save_path.display()))?;
        info!("Results saved to {:?}", save_path);
    }
    if let Some(csv_path) = &args.equity_csv {
        std::fs::write(csv_path, report.equity_to_csv()?)
            .with_context(|| format!("Failed to write {}", csv_path.display()))?;
        info!("Equity curve saved to {:?}", csv_path);
    }

    anyhow::ensure!(
        report.stop_reason.as_ref().map_or(true, |r| !r.is_failure()),
        "Backtest failed: {}",
        report.status
    );
    Ok(())
}
