//! Configuration management.

mod settings;

pub use settings::{
    AnalysisSettings, AppConfig, AppSettings, EventDeliveryMode, EventSettings, InstrumentSettings, LoggingConfig,
    OptimizationSettings, RiskSettings, RunSettings, SettingsError,
};

use config::{Config, ConfigError, Environment, File, FileFormat};
use std::path::Path;

/// Load configuration from file and environment.
///
/// Environment variables prefixed `TRADING` override the file, with `__`
/// separating nested keys (`TRADING__RUN__SEED=7`).
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from(path).required(true))
        .add_source(
            Environment::with_prefix("TRADING")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    config.try_deserialize()
}

/// Parse configuration from TOML text, without environment overrides.
pub fn parse_config(toml: &str) -> Result<AppConfig, ConfigError> {
    Config::builder()
        .add_source(File::from_str(toml, FileFormat::Toml))
        .build()?
        .try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use trading_core::types::Timeframe;
    use trading_data::TickDensity;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = parse_config(
            r#"
            [run]
            period = "15m"
            spread_pips = 1.5

            [run.density]
            mode = "range"
            min = 2
            max = 12

            [risk]
            account_loss_limit = 500
            timezone = "America/New_York"
            day_start = "17:00"

            [events]
            mode = "async"
            "#,
        )
        .unwrap();

        assert_eq!(config.run.period, Timeframe::Minute15);
        assert_eq!(config.run.tick_density(), TickDensity::Range { min: 2, max: 12 });
        assert_eq!(config.run.spread(), dec!(0.00015));
        assert_eq!(config.run.initial_balance, dec!(10000));
        assert_eq!(config.risk.account_loss_limit, Some(dec!(500)));
        assert_eq!(config.events.mode, EventDeliveryMode::Async);
        assert_eq!(config.events.batch_size, 64);
        assert_eq!(config.optimization.max_concurrency, 4);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_bundled_default_file_is_valid() {
        let config = parse_config(include_str!("../../../config/default.toml")).unwrap();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.run.instrument().symbol, "EUR_USD");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(load_config(Path::new("does/not/exist.toml")).is_err());
    }
}
