//! Configuration structures.

use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use trading_core::types::{Instrument, Timeframe, TradingCalendar};
use trading_data::TickDensity;
use trading_risk::RiskProfile;

/// A configuration value outside its allowed range.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error("invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("invalid day start '{0}', expected HH:MM")]
    InvalidDayStart(String),
}

fn invalid(field: &'static str, reason: impl Into<String>) -> SettingsError {
    SettingsError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub run: RunSettings,
    #[serde(default)]
    pub risk: RiskSettings,
    #[serde(default)]
    pub events: EventSettings,
    #[serde(default)]
    pub optimization: OptimizationSettings,
    #[serde(default)]
    pub analysis: AnalysisSettings,
}

impl AppConfig {
    /// Check ranges and names that serde cannot.
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.logging.validate()?;
        self.run.validate()?;
        self.risk.validate()?;
        self.events.validate()?;
        self.optimization.validate()?;
        self.analysis.validate()
    }
}

/// General app settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    pub name: String,
    pub environment: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "trading-sim".to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
    pub file: Option<String>,
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format == "json"
    }

    fn validate(&self) -> Result<(), SettingsError> {
        match self.format.as_str() {
            "pretty" | "json" => Ok(()),
            other => Err(invalid("logging.format", format!("expected pretty or json, got '{}'", other))),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file: None,
        }
    }
}

/// Instrument metadata as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentSettings {
    pub symbol: String,
    pub pip_size: Decimal,
    pub price_precision: u32,
    pub quantity_precision: u32,
}

impl Default for InstrumentSettings {
    fn default() -> Self {
        Self {
            symbol: "EUR_USD".to_string(),
            pip_size: dec!(0.0001),
            price_precision: 5,
            quantity_precision: 0,
        }
    }
}

/// What to replay and how.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    pub instrument: InstrumentSettings,
    pub period: Timeframe,
    /// CSV candle file for backtests
    pub data_file: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub initial_balance: Decimal,
    /// Full bid/ask spread in pips
    pub spread_pips: Decimal,
    pub density: TickDensity,
    pub seed: u64,
    pub window_capacity: usize,
    pub close_on_stop: bool,
}

impl RunSettings {
    pub fn instrument(&self) -> Instrument {
        Instrument::new(
            self.instrument.symbol.clone(),
            self.instrument.pip_size,
            self.instrument.price_precision,
            self.instrument.quantity_precision,
        )
    }

    /// Spread in price units.
    pub fn spread(&self) -> Decimal {
        self.instrument().pips_to_price(self.spread_pips)
    }

    pub fn tick_density(&self) -> TickDensity {
        self.density
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.instrument.symbol.trim().is_empty() {
            return Err(invalid("run.instrument.symbol", "must not be empty"));
        }
        if self.instrument.pip_size <= Decimal::ZERO {
            return Err(invalid("run.instrument.pip_size", "must be positive"));
        }
        if self.initial_balance <= Decimal::ZERO {
            return Err(invalid("run.initial_balance", "must be positive"));
        }
        if self.spread_pips < Decimal::ZERO {
            return Err(invalid("run.spread_pips", "must not be negative"));
        }
        if self.window_capacity == 0 {
            return Err(invalid("run.window_capacity", "must be at least 1"));
        }
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from >= to {
                return Err(invalid("run.to", "must be after run.from"));
            }
        }
        match self.density {
            TickDensity::Fixed { ticks } if ticks == 0 => Err(invalid("run.density.ticks", "must be at least 1")),
            TickDensity::Range { min, max } if min == 0 || min > max => {
                Err(invalid("run.density", format!("bad range {}..={}", min, max)))
            }
            _ => Ok(()),
        }
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            instrument: InstrumentSettings::default(),
            period: Timeframe::Hour1,
            data_file: None,
            from: None,
            to: None,
            initial_balance: dec!(10000),
            spread_pips: dec!(1),
            density: TickDensity::Fixed { ticks: 4 },
            seed: 42,
            window_capacity: 500,
            close_on_stop: true,
        }
    }
}

/// Risk limits and the broker trading day.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskSettings {
    pub max_daily_loss: Option<Decimal>,
    pub account_loss_limit: Option<Decimal>,
    pub safety_buffer: Decimal,
    pub profit_target: Option<Decimal>,
    /// IANA name of the broker timezone
    pub timezone: String,
    /// Broker-local start of the trading day, `HH:MM`
    pub day_start: String,
}

impl RiskSettings {
    pub fn calendar(&self) -> Result<TradingCalendar, SettingsError> {
        let timezone: Tz = self
            .timezone
            .parse()
            .map_err(|_| SettingsError::UnknownTimezone(self.timezone.clone()))?;
        let day_start = NaiveTime::parse_from_str(&self.day_start, "%H:%M")
            .map_err(|_| SettingsError::InvalidDayStart(self.day_start.clone()))?;
        Ok(TradingCalendar::new(timezone, day_start))
    }

    pub fn risk_profile(&self) -> Result<RiskProfile, SettingsError> {
        Ok(RiskProfile {
            max_daily_loss: self.max_daily_loss,
            account_loss_limit: self.account_loss_limit,
            safety_buffer: self.safety_buffer,
            profit_target: self.profit_target,
            calendar: self.calendar()?,
        })
    }

    fn validate(&self) -> Result<(), SettingsError> {
        let positive = [
            ("risk.max_daily_loss", self.max_daily_loss),
            ("risk.account_loss_limit", self.account_loss_limit),
            ("risk.profit_target", self.profit_target),
        ];
        for (field, value) in positive {
            if matches!(value, Some(v) if v <= Decimal::ZERO) {
                return Err(invalid(field, "must be positive when set"));
            }
        }
        if self.safety_buffer < Decimal::ZERO {
            return Err(invalid("risk.safety_buffer", "must not be negative"));
        }
        if let Some(limit) = self.account_loss_limit {
            if self.safety_buffer >= limit {
                return Err(invalid("risk.safety_buffer", "must be below the account loss limit"));
            }
        }
        self.calendar().map(|_| ())
    }
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            max_daily_loss: None,
            account_loss_limit: None,
            safety_buffer: Decimal::ZERO,
            profit_target: None,
            timezone: "UTC".to_string(),
            day_start: "00:00".to_string(),
        }
    }
}

/// How events reach listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventDeliveryMode {
    /// Listeners run inline on the publishing task
    #[default]
    Sync,
    /// Events queue up for a background delivery task
    Async,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventSettings {
    pub mode: EventDeliveryMode,
    pub queue_capacity: usize,
    pub batch_size: usize,
}

impl EventSettings {
    fn validate(&self) -> Result<(), SettingsError> {
        if self.mode == EventDeliveryMode::Async && (self.queue_capacity == 0 || self.batch_size == 0) {
            return Err(invalid("events", "queue_capacity and batch_size must be at least 1"));
        }
        Ok(())
    }
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            mode: EventDeliveryMode::Sync,
            queue_capacity: 1024,
            batch_size: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationSettings {
    pub max_concurrency: usize,
    pub max_trials: usize,
}

impl OptimizationSettings {
    fn validate(&self) -> Result<(), SettingsError> {
        if self.max_concurrency == 0 {
            return Err(invalid("optimization.max_concurrency", "must be at least 1"));
        }
        if self.max_trials == 0 {
            return Err(invalid("optimization.max_trials", "must be at least 1"));
        }
        Ok(())
    }
}

impl Default for OptimizationSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            max_trials: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Annual rate, as a fraction
    pub risk_free_rate: f64,
}

impl AnalysisSettings {
    fn validate(&self) -> Result<(), SettingsError> {
        if !self.risk_free_rate.is_finite() || !(0.0..1.0).contains(&self.risk_free_rate) {
            return Err(invalid("analysis.risk_free_rate", "must be in [0, 1)"));
        }
        Ok(())
    }
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self { risk_free_rate: 0.0 }
    }
}
