//! Strategy trait definitions.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::trade_manager::PositionSizing;
use crate::error::StrategyError;
use crate::events::LogLevel;
use crate::types::{Account, Bar, BarWindow, Direction, Instrument, StopReason, Tick, Trade, TradeId};

/// A request made by a strategy during a callback.
///
/// Actions are applied by the executor after the callback returns, in the
/// order they were emitted.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyAction {
    Open { direction: Direction, sizing: PositionSizing },
    Close { trade_id: TradeId },
    CloseAll,
    Indicator { name: String, value: Decimal },
    Log { level: LogLevel, message: String },
    Stop { reason: String },
}

/// Read-only view of the run plus an outbox for actions.
pub struct StrategyContext<'a> {
    pub instrument: &'a Instrument,
    pub bars: &'a BarWindow,
    pub account: &'a Account,
    pub open_trades: &'a [Trade],
    /// Simulation (or wall-clock) time of the callback
    pub now: DateTime<Utc>,
    actions: Vec<StrategyAction>,
}

impl<'a> StrategyContext<'a> {
    pub fn new(
        instrument: &'a Instrument,
        bars: &'a BarWindow,
        account: &'a Account,
        open_trades: &'a [Trade],
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            instrument,
            bars,
            account,
            open_trades,
            now,
            actions: Vec::new(),
        }
    }

    pub fn open(&mut self, direction: Direction, sizing: PositionSizing) {
        self.actions.push(StrategyAction::Open { direction, sizing });
    }

    pub fn open_long(&mut self, sizing: PositionSizing) {
        self.open(Direction::Long, sizing);
    }

    pub fn open_short(&mut self, sizing: PositionSizing) {
        self.open(Direction::Short, sizing);
    }

    pub fn close(&mut self, trade_id: TradeId) {
        self.actions.push(StrategyAction::Close { trade_id });
    }

    pub fn close_all(&mut self) {
        self.actions.push(StrategyAction::CloseAll);
    }

    /// Publish an indicator value alongside the run's events.
    pub fn indicator(&mut self, name: impl Into<String>, value: Decimal) {
        self.actions.push(StrategyAction::Indicator {
            name: name.into(),
            value,
        });
    }

    pub fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        self.actions.push(StrategyAction::Log {
            level,
            message: message.into(),
        });
    }

    /// Ask the executor to end the run after this callback.
    pub fn stop(&mut self, reason: impl Into<String>) {
        self.actions.push(StrategyAction::Stop { reason: reason.into() });
    }

    /// Whether any trade is currently open in `direction`.
    pub fn has_open(&self, direction: Direction) -> bool {
        self.open_trades.iter().any(|t| t.direction == direction)
    }

    pub fn actions(&self) -> &[StrategyAction] {
        &self.actions
    }

    pub fn into_actions(self) -> Vec<StrategyAction> {
        self.actions
    }
}

/// State of a strategy for monitoring and reports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyState {
    pub name: String,
    /// Whether the strategy has seen enough bars to act
    pub is_warmed_up: bool,
    pub bars_processed: usize,
    pub signals_generated: usize,
    /// Latest indicator values
    pub indicators: HashMap<String, Decimal>,
}

/// Core strategy trait.
///
/// Strategies receive lifecycle and market callbacks from the executor and
/// respond by pushing actions onto the [`StrategyContext`]. Returning an error
/// from any callback fails the run.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Number of closed bars needed before the strategy acts.
    fn warmup_period(&self) -> usize {
        0
    }

    fn is_warmed_up(&self, bars_available: usize) -> bool {
        bars_available >= self.warmup_period()
    }

    /// Called once when the executor is initialised.
    fn on_start(&mut self, _ctx: &mut StrategyContext<'_>) -> Result<(), StrategyError> {
        Ok(())
    }

    fn on_tick(&mut self, _tick: &Tick, _ctx: &mut StrategyContext<'_>) -> Result<(), StrategyError> {
        Ok(())
    }

    fn on_bar_close(&mut self, _bar: &Bar, _ctx: &mut StrategyContext<'_>) -> Result<(), StrategyError> {
        Ok(())
    }

    /// Called on the first tick of each broker trading day.
    fn on_new_day(&mut self, _day_start: DateTime<Utc>, _ctx: &mut StrategyContext<'_>) -> Result<(), StrategyError> {
        Ok(())
    }

    /// Called once when the run stops, before open trades are liquidated.
    fn on_deinit(&mut self, _reason: &StopReason, _ctx: &mut StrategyContext<'_>) -> Result<(), StrategyError> {
        Ok(())
    }

    fn state(&self) -> StrategyState;
}
