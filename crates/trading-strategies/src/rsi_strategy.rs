//! RSI-based Trading Strategy.
//!
//! Buys when RSI crosses back above the oversold level and exits longs at
//! the overbought exit level. With `allow_short`, the mirror image applies.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use trading_core::{
    error::StrategyError,
    traits::{Strategy, StrategyContext, StrategyState},
    types::{Bar, Direction},
};

use crate::indicators::{Indicator, Rsi};
use crate::params::{risk_sizing, risk_specs, ParameterSpec};

/// Parameters for the RSI strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RsiParams {
    pub period: usize,
    pub overbought: Decimal,
    pub oversold: Decimal,
    /// Level at which longs are closed
    pub exit_overbought: Decimal,
    /// Level at which shorts are closed
    pub exit_oversold: Decimal,
    pub allow_short: bool,
    pub risk_percent: Decimal,
    pub stop_pips: Decimal,
    pub reward_ratio: Decimal,
}

impl Default for RsiParams {
    fn default() -> Self {
        Self {
            period: 14,
            overbought: Decimal::from(70),
            oversold: Decimal::from(30),
            exit_overbought: Decimal::from(70),
            exit_oversold: Decimal::from(30),
            allow_short: false,
            risk_percent: Decimal::ONE,
            stop_pips: Decimal::from(20),
            reward_ratio: Decimal::from(2),
        }
    }
}

impl RsiParams {
    pub fn specs() -> Vec<ParameterSpec> {
        let mut specs = vec![
            ParameterSpec::integer("period", "RSI lookback period", 14, 2, 100, 2),
            ParameterSpec::decimal("overbought", "Short entry level", 70.0, 50.0, 100.0, 5.0),
            ParameterSpec::decimal("oversold", "Long entry level", 30.0, 0.0, 50.0, 5.0),
            ParameterSpec::decimal("exit_overbought", "Long exit level", 70.0, 50.0, 100.0, 5.0),
            ParameterSpec::decimal("exit_oversold", "Short exit level", 30.0, 0.0, 50.0, 5.0),
        ];
        specs.extend(risk_specs());
        specs
    }

    pub fn validate(&self) -> Result<(), StrategyError> {
        if self.period < 2 {
            return Err(StrategyError::InvalidParameter {
                name: "period".into(),
                reason: "must be at least 2".into(),
            });
        }
        if self.overbought <= self.oversold {
            return Err(StrategyError::InvalidConfig(
                "overbought must be greater than oversold".into(),
            ));
        }
        let hundred = Decimal::from(100);
        if self.overbought > hundred || self.oversold < Decimal::ZERO {
            return Err(StrategyError::InvalidConfig(
                "RSI thresholds must be between 0 and 100".into(),
            ));
        }
        if self.risk_percent <= Decimal::ZERO || self.stop_pips <= Decimal::ZERO {
            return Err(StrategyError::InvalidConfig(
                "risk_percent and stop_pips must be positive".into(),
            ));
        }
        Ok(())
    }
}

pub struct RsiStrategy {
    params: RsiParams,
    rsi: Rsi,
    prev_rsi: Option<Decimal>,
    bars_processed: usize,
    signals_generated: usize,
}

impl RsiStrategy {
    pub fn new(params: RsiParams) -> Result<Self, StrategyError> {
        params.validate()?;
        Ok(Self {
            rsi: Rsi::new(params.period),
            params,
            prev_rsi: None,
            bars_processed: 0,
            signals_generated: 0,
        })
    }

    fn close_direction(direction: Direction, ctx: &mut StrategyContext<'_>) {
        let ids: Vec<_> = ctx
            .open_trades
            .iter()
            .filter(|t| t.direction == direction)
            .map(|t| t.id.clone())
            .collect();
        for id in ids {
            ctx.close(id);
        }
    }

    fn open(&mut self, direction: Direction, ctx: &mut StrategyContext<'_>) {
        let sizing = risk_sizing(
            ctx.instrument,
            self.params.risk_percent,
            self.params.stop_pips,
            self.params.reward_ratio,
        );
        debug!(direction = %direction, rsi = ?self.prev_rsi, "RSI entry");
        ctx.open(direction, sizing);
        self.signals_generated += 1;
    }
}

impl Strategy for RsiStrategy {
    fn name(&self) -> &str {
        "rsi"
    }

    fn description(&self) -> &str {
        "Trades RSI overbought/oversold reversals"
    }

    fn warmup_period(&self) -> usize {
        self.rsi.period()
    }

    fn on_bar_close(&mut self, _bar: &Bar, ctx: &mut StrategyContext<'_>) -> Result<(), StrategyError> {
        self.bars_processed += 1;
        if !self.is_warmed_up(ctx.bars.len()) {
            return Ok(());
        }
        let Some(rsi) = self.rsi.latest(&ctx.bars.closes()) else {
            return Ok(());
        };
        ctx.indicator("rsi", rsi);

        let long = ctx.has_open(Direction::Long);
        let short = ctx.has_open(Direction::Short);
        if long && rsi >= self.params.exit_overbought {
            Self::close_direction(Direction::Long, ctx);
        }
        if short && rsi <= self.params.exit_oversold {
            Self::close_direction(Direction::Short, ctx);
        }

        if let Some(prev) = self.prev_rsi {
            if !long && prev <= self.params.oversold && rsi > self.params.oversold {
                self.open(Direction::Long, ctx);
            } else if self.params.allow_short
                && !short
                && prev >= self.params.overbought
                && rsi < self.params.overbought
            {
                self.open(Direction::Short, ctx);
            }
        }
        self.prev_rsi = Some(rsi);
        Ok(())
    }

    fn state(&self) -> StrategyState {
        StrategyState {
            name: self.name().to_string(),
            is_warmed_up: self.prev_rsi.is_some(),
            bars_processed: self.bars_processed,
            signals_generated: self.signals_generated,
            indicators: self.prev_rsi.map(|v| ("rsi".to_string(), v)).into_iter().collect(),
        }
    }
}
