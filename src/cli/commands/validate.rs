//! Validate configuration command.

use anyhow::Result;
use std::path::Path;
use trading_config::AppConfig;

/// `config` has already been loaded and validated; print what it resolves to.
pub async fn run(config_path: &Path, config: &AppConfig) -> Result<()> {
    println!("Validating configuration: {:?}", config_path);
    println!("Configuration is valid!");
    println!();
    println!("App: {}", config.app.name);
    println!("Environment: {}", config.app.environment);
    println!("Log level: {}", config.logging.level);
    println!("Instrument: {} {}", config.run.instrument.symbol, config.run.period);
    println!("Initial balance: {}", config.run.initial_balance);
    println!("Spread: {} pips", config.run.spread_pips);
    println!("Tick density: {:?}", config.run.density);
    println!("Event delivery: {:?}", config.events.mode);
    println!(
        "Trading day: {} {}",
        config.risk.day_start, config.risk.timezone
    );
    let limit = |v: Option<rust_decimal::Decimal>| v.map_or("none".to_string(), |v| v.to_string());
    println!("Max daily loss: {}", limit(config.risk.max_daily_loss));
    println!("Account loss limit: {}", limit(config.risk.account_loss_limit));
    println!("Profit target: {}", limit(config.risk.profit_target));

    Ok(())
}
