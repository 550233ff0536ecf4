//! Moving Average Crossover Strategy.
//!
//! Goes long when the fast MA crosses above the slow MA and short when it
//! crosses below, reversing any position held in the other direction.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use trading_core::{
    error::StrategyError,
    traits::{Strategy, StrategyContext, StrategyState},
    types::{Bar, Direction},
};

use crate::indicators::{Ema, Indicator, Sma};
use crate::params::{risk_sizing, risk_specs, ParameterSpec};

/// Parameters for the MA Crossover strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MaCrossoverParams {
    pub fast_period: usize,
    pub slow_period: usize,
    /// Use EMA instead of SMA
    pub use_ema: bool,
    pub risk_percent: Decimal,
    pub stop_pips: Decimal,
    pub reward_ratio: Decimal,
}

impl MaCrossoverParams {
    pub fn specs() -> Vec<ParameterSpec> {
        let mut specs = vec![
            ParameterSpec::integer("fast_period", "Fast moving average period", 12, 2, 100, 2),
            ParameterSpec::integer("slow_period", "Slow moving average period", 26, 3, 300, 5),
        ];
        specs.extend(risk_specs());
        specs
    }

    pub fn validate(&self) -> Result<(), StrategyError> {
        if self.fast_period == 0 {
            return Err(StrategyError::InvalidParameter {
                name: "fast_period".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.fast_period >= self.slow_period {
            return Err(StrategyError::InvalidParameter {
                name: "fast_period".into(),
                reason: "must be less than slow_period".into(),
            });
        }
        if self.risk_percent <= Decimal::ZERO || self.stop_pips <= Decimal::ZERO {
            return Err(StrategyError::InvalidConfig(
                "risk_percent and stop_pips must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl Default for MaCrossoverParams {
    fn default() -> Self {
        Self {
            fast_period: 12,
            slow_period: 26,
            use_ema: true,
            risk_percent: Decimal::ONE,
            stop_pips: Decimal::from(20),
            reward_ratio: Decimal::from(2),
        }
    }
}

pub struct MaCrossoverStrategy {
    params: MaCrossoverParams,
    prev: Option<(Decimal, Decimal)>,
    bars_processed: usize,
    signals_generated: usize,
}

impl MaCrossoverStrategy {
    pub fn new(params: MaCrossoverParams) -> Result<Self, StrategyError> {
        params.validate()?;
        Ok(Self {
            params,
            prev: None,
            bars_processed: 0,
            signals_generated: 0,
        })
    }

    pub fn params(&self) -> &MaCrossoverParams {
        &self.params
    }

    fn average(&self, closes: &[Decimal], period: usize) -> Option<Decimal> {
        if self.params.use_ema {
            Ema::new(period).latest(closes)
        } else {
            Sma::new(period).latest(closes)
        }
    }

    fn enter(&mut self, direction: Direction, ctx: &mut StrategyContext<'_>) {
        let stale: Vec<_> = ctx
            .open_trades
            .iter()
            .filter(|t| t.direction != direction)
            .map(|t| t.id.clone())
            .collect();
        for id in stale {
            ctx.close(id);
        }
        if !ctx.has_open(direction) {
            let sizing = risk_sizing(
                ctx.instrument,
                self.params.risk_percent,
                self.params.stop_pips,
                self.params.reward_ratio,
            );
            debug!(direction = %direction, "Moving average crossover entry");
            ctx.open(direction, sizing);
            self.signals_generated += 1;
        }
    }
}

impl Strategy for MaCrossoverStrategy {
    fn name(&self) -> &str {
        "ma_crossover"
    }

    fn description(&self) -> &str {
        "Trades fast/slow moving average crossovers"
    }

    fn warmup_period(&self) -> usize {
        self.params.slow_period
    }

    fn on_bar_close(&mut self, _bar: &Bar, ctx: &mut StrategyContext<'_>) -> Result<(), StrategyError> {
        self.bars_processed += 1;
        if !self.is_warmed_up(ctx.bars.len()) {
            return Ok(());
        }

        let closes = ctx.bars.closes();
        let (Some(fast), Some(slow)) = (
            self.average(&closes, self.params.fast_period),
            self.average(&closes, self.params.slow_period),
        ) else {
            return Ok(());
        };
        ctx.indicator("fast_ma", fast);
        ctx.indicator("slow_ma", slow);

        if let Some((prev_fast, prev_slow)) = self.prev {
            if prev_fast <= prev_slow && fast > slow {
                self.enter(Direction::Long, ctx);
            } else if prev_fast >= prev_slow && fast < slow {
                self.enter(Direction::Short, ctx);
            }
        }
        self.prev = Some((fast, slow));
        Ok(())
    }

    fn state(&self) -> StrategyState {
        let mut indicators = std::collections::HashMap::new();
        if let Some((fast, slow)) = self.prev {
            indicators.insert("fast_ma".to_string(), fast);
            indicators.insert("slow_ma".to_string(), slow);
        }
        StrategyState {
            name: self.name().to_string(),
            is_warmed_up: self.prev.is_some(),
            bars_processed: self.bars_processed,
            signals_generated: self.signals_generated,
            indicators,
        }
    }
}
