//! Backtest assembly: candle source, tick generator, simulated trade manager
//! and executor wired for one historical run.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use trading_broker::SimulatedTradeManager;
use trading_core::error::TradingError;
use trading_core::traits::{CandleRequest, CandleSource, DataProvider, EventPublisher, Strategy};
use trading_core::types::{Instrument, Timeframe};
use trading_data::{BacktestDataProvider, TickDensity, TickGenerator};
use trading_risk::RiskProfile;

use crate::executor::{ExecutorConfig, RunSummary, StrategyExecutor};

/// Everything needed to replay one strategy over historical candles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestSpec {
    pub strategy_id: String,
    pub instrument: Instrument,
    pub period: Timeframe,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub initial_balance: Decimal,
    pub spread: Decimal,
    pub density: TickDensity,
    /// Seed for synthetic tick paths; equal seeds replay identically
    pub seed: u64,
    pub risk: RiskProfile,
    pub risk_free_rate: f64,
    pub window_capacity: usize,
    pub close_on_stop: bool,
}

impl BacktestSpec {
    pub fn new(
        strategy_id: impl Into<String>,
        instrument: Instrument,
        period: Timeframe,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Self {
        Self {
            strategy_id: strategy_id.into(),
            instrument,
            period,
            from,
            to,
            initial_balance: dec!(10000),
            spread: Decimal::ZERO,
            density: TickDensity::Fixed { ticks: 4 },
            seed: 42,
            risk: RiskProfile::unlimited(),
            risk_free_rate: 0.0,
            window_capacity: 500,
            close_on_stop: true,
        }
    }

    pub fn request(&self) -> CandleRequest {
        CandleRequest::new(self.instrument.symbol.clone(), self.period, self.from, self.to)
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            window_capacity: self.window_capacity,
            spread: self.spread,
            bar_level_exits: matches!(self.density, TickDensity::BarOnly),
            close_on_stop: self.close_on_stop,
            risk_free_rate: self.risk_free_rate,
            risk: self.risk.clone(),
            ..ExecutorConfig::new(self.strategy_id.clone(), self.instrument.clone(), self.period)
        }
    }
}

/// Build an executor that replays `spec` from `source`.
pub fn build_backtest(
    spec: &BacktestSpec,
    source: Arc<dyn CandleSource>,
    strategy: Box<dyn Strategy>,
    publisher: Arc<dyn EventPublisher>,
) -> StrategyExecutor {
    let generator = TickGenerator::new(&spec.instrument, spec.spread, spec.density, spec.seed);
    let provider: Arc<dyn DataProvider> = Arc::new(BacktestDataProvider::new(source, spec.request(), generator));
    let trade_manager = SimulatedTradeManager::new(spec.strategy_id.clone(), spec.initial_balance);
    StrategyExecutor::new(
        spec.executor_config(),
        strategy,
        Box::new(trade_manager),
        provider,
        publisher,
    )
}

/// Initialise and run a backtest to completion.
///
/// Only a strategy that fails to start or executor misuse is an error; a
/// run that fails midway returns its summary with a `Failed` status.
pub async fn run_backtest(
    spec: &BacktestSpec,
    source: Arc<dyn CandleSource>,
    strategy: Box<dyn Strategy>,
    publisher: Arc<dyn EventPublisher>,
) -> Result<RunSummary, TradingError> {
    let executor = build_backtest(spec, source, strategy, publisher);
    executor.initialise().await?;
    Ok(executor.run().await?)
}
