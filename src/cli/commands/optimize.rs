//! Parameter sweep command.

use anyhow::{Context, Result};
use std::sync::Arc;
use trading_config::AppConfig;
use trading_engine::{OptimizationConfig, Optimizer};
use trading_strategies::StrategyRegistry;
use tracing::info;

use super::support::{backtest_spec, candle_source, parse_params};
use crate::cli::OptimizeArgs;

pub async fn run(args: OptimizeArgs, config: &AppConfig) -> Result<()> {
    let replay = &args.replay;
    let spec = backtest_spec(config, replay, format!("{}-sweep", replay.strategy))?;
    let source = candle_source(config, replay)?;
    let optimizer = Optimizer::new(Arc::new(StrategyRegistry::new()), source, spec);

    let request = OptimizationConfig {
        strategy: replay.strategy.clone(),
        base_params: parse_params(replay.params.as_deref())?,
        parameters: args.sweep.clone(),
        max_concurrency: args.concurrency.unwrap_or(config.optimization.max_concurrency),
        max_trials: args.max_trials.unwrap_or(config.optimization.max_trials),
    };
    let report = optimizer.run(&request).await.context("Optimisation rejected")?;

    println!("Optimisation: {} over {}", report.strategy, args.sweep.join(", "));
    println!("═══════════════════════════════════════════════════════════");
    println!(
        "  Trials: {}    Failed: {}",
        report.trials.len(),
        report.failed()
    );
    println!();
    for (rank, trial) in report.trials.iter().take(args.top).enumerate() {
        match &trial.error {
            None => println!("  #{:<3} profit {:>12.2}  {}", rank + 1, trial.net_profit, trial.params),
            Some(e) => println!("  #{:<3} failed              {}  ({})", rank + 1, trial.params, e),
        }
    }

    if let Some(save_path) = &args.save {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(save_path, json).with_context(|| format!("Failed to write {}", save_path.display()))?;
        info!("Results saved to {:?}", save_path);
    }
    Ok(())
}
