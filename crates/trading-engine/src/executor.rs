//! Strategy executor: drives one strategy over one data feed.
//!
//! The executor wires a [`DataProvider`] to a [`DataManager`] and routes the
//! resulting callbacks through the trade manager, risk manager, strategy and
//! performance analyser, publishing events as it goes. Everything a run
//! mutates lives behind a single `tokio::sync::Mutex`, so callbacks and the
//! stop path are strictly serialised.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use trading_core::error::{ExecutorError, StrategyError, TradeError, TradingError};
use trading_core::events::{Event, EventPayload, LogLevel, TradeAction};
use trading_core::traits::{
    CloseAllOutcome, DataListener, DataProvider, DataProviderListener, EventPublisher, PositionSizing, Strategy,
    StrategyAction, StrategyContext, TradeManager,
};
use trading_core::types::{
    Account, Bar, BarWindow, CloseReason, Direction, Instrument, StopReason, Tick, Timeframe, Trade, TradeStatistics,
};
use trading_data::DataManager;
use trading_risk::{RiskManager, RiskProfile, RiskViolation};

use crate::performance::{EquityPoint, PerformanceAnalyser};

/// Static settings of one run.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Tags every event of the run
    pub strategy_id: String,
    pub instrument: Instrument,
    pub period: Timeframe,
    /// Closed bars kept for strategies
    pub window_capacity: usize,
    /// Spread assumed by bar-level exit checks
    pub spread: Decimal,
    /// Evaluate stops and targets against bar extremes as well as ticks
    pub bar_level_exits: bool,
    /// Liquidate open trades when the run stops
    pub close_on_stop: bool,
    pub risk_free_rate: f64,
    /// Limits, and the calendar used for trading days
    pub risk: RiskProfile,
}

impl ExecutorConfig {
    pub fn new(strategy_id: impl Into<String>, instrument: Instrument, period: Timeframe) -> Self {
        Self {
            strategy_id: strategy_id.into(),
            instrument,
            period,
            window_capacity: 500,
            spread: Decimal::ZERO,
            bar_level_exits: false,
            close_on_stop: true,
            risk_free_rate: 0.0,
            risk: RiskProfile::unlimited(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorState {
    Created,
    Initialised,
    Running,
    Stopped,
    Failed,
}

impl ExecutorState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutorState::Stopped | ExecutorState::Failed)
    }
}

impl fmt::Display for ExecutorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutorState::Created => "created",
            ExecutorState::Initialised => "initialised",
            ExecutorState::Running => "running",
            ExecutorState::Stopped => "stopped",
            ExecutorState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Outcome of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub strategy_id: String,
    pub status: ExecutorState,
    pub stop_reason: Option<StopReason>,
    pub account: Account,
    pub closed_trades: Vec<Trade>,
    /// Present once the run has stopped and statistics were finalised
    pub statistics: Option<TradeStatistics>,
    pub equity_curve: Vec<EquityPoint>,
    pub ticks_processed: u64,
    pub ticks_dropped: u64,
}

/// Per-run collaborators and bookkeeping. Receives data manager callbacks.
struct RunContext {
    config: ExecutorConfig,
    state: ExecutorState,
    strategy: Box<dyn Strategy>,
    trade_manager: Box<dyn TradeManager>,
    risk: RiskManager,
    analyser: PerformanceAnalyser,
    publisher: Arc<dyn EventPublisher>,
    violation: Option<RiskViolation>,
    /// Stop requested by the strategy, applied once the callback returns
    pending_stop: Option<StopReason>,
    stop_reason: Option<StopReason>,
    statistics: Option<TradeStatistics>,
    /// Time of the most recent tick
    now: Option<DateTime<Utc>>,
    /// Candle the current ticks were synthesised from, for bar-level exits
    source_candle: Option<Bar>,
}

impl RunContext {
    fn clock(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }

    fn id(&self) -> &str {
        &self.config.strategy_id
    }

    fn publish(&self, payload: EventPayload, timestamp: DateTime<Utc>) {
        self.publisher
            .publish(Event::new(self.config.strategy_id.clone(), timestamp, payload));
    }

    fn publish_log(&self, level: LogLevel, message: impl Into<String>, timestamp: DateTime<Utc>) {
        self.publisher.publish(Event::log(self.id(), level, message, timestamp));
    }

    fn publish_closed(&self, trades: &[Trade], now: DateTime<Utc>) {
        for trade in trades {
            let ts = trade.close_time.unwrap_or(now);
            self.publisher.publish(Event::trade(self.id(), TradeAction::Closed, trade, ts));
        }
    }

    fn publish_account(&self, timestamp: DateTime<Utc>) {
        self.publisher
            .publish(Event::account(self.id(), self.trade_manager.account(), timestamp));
    }

    fn publish_outcome(&self, outcome: &CloseAllOutcome, now: DateTime<Utc>) {
        self.publish_closed(&outcome.closed, now);
        for (trade_id, err) in &outcome.failures {
            warn!(strategy_id = %self.id(), trade_id = %trade_id, error = %err, "Failed to close trade");
            self.publish_log(LogLevel::Warn, format!("failed to close trade {}: {}", trade_id, err), now);
        }
    }

    /// Trade-local failures are reported and the run continues, except for
    /// sizing arithmetic, which is fatal.
    fn trade_failed(&self, err: TradeError, now: DateTime<Utc>) -> Result<(), TradingError> {
        if let TradeError::Arithmetic(cause) = err {
            return Err(cause.into());
        }
        warn!(strategy_id = %self.id(), error = %err, "Trade request failed");
        self.publish_log(LogLevel::Warn, err.to_string(), now);
        Ok(())
    }

    /// Run one strategy callback against a fresh context and return its
    /// actions.
    fn strategy_actions<F>(&mut self, bars: &BarWindow, now: DateTime<Utc>, callback: F) -> Result<Vec<StrategyAction>, StrategyError>
    where
        F: FnOnce(&mut dyn Strategy, &mut StrategyContext<'_>) -> Result<(), StrategyError>,
    {
        let mut ctx = StrategyContext::new(
            &self.config.instrument,
            bars,
            self.trade_manager.account(),
            self.trade_manager.open_trades(),
            now,
        );
        callback(self.strategy.as_mut(), &mut ctx)?;
        Ok(ctx.into_actions())
    }

    async fn apply_actions(&mut self, actions: Vec<StrategyAction>, now: DateTime<Utc>) -> Result<(), TradingError> {
        for action in actions {
            match action {
                StrategyAction::Open { direction, sizing } => self.open_trade(direction, &sizing, now).await?,
                StrategyAction::Close { trade_id } => match self.trade_manager.close_position(&trade_id).await {
                    Ok(trade) => self.publish_closed(std::slice::from_ref(&trade), now),
                    Err(e) => self.trade_failed(e, now)?,
                },
                StrategyAction::CloseAll => {
                    let outcome = self.trade_manager.close_all(CloseReason::Manual).await;
                    self.publish_outcome(&outcome, now);
                }
                StrategyAction::Indicator { name, value } => {
                    self.publish(EventPayload::Indicator { name, value }, now);
                }
                StrategyAction::Log { level, message } => self.publish_log(level, message, now),
                StrategyAction::Stop { reason } => {
                    if self.pending_stop.is_none() {
                        self.pending_stop = Some(StopReason::Requested(reason));
                    }
                }
            }
        }
        Ok(())
    }

    async fn open_trade(&mut self, direction: Direction, sizing: &PositionSizing, now: DateTime<Utc>) -> Result<(), TradingError> {
        if self.state.is_terminal() {
            debug!(strategy_id = %self.id(), "Entry ignored, run has stopped");
            return Ok(());
        }
        if self.violation.is_some() || !self.risk.can_trade(now, self.trade_manager.account()) {
            debug!(strategy_id = %self.id(), direction = %direction, "Entry refused by risk limits");
            return Ok(());
        }
        let instrument = self.config.instrument.clone();
        match self.trade_manager.open_position(&instrument, direction, sizing).await {
            Ok(trade) => {
                self.publisher.publish(Event::trade(self.id(), TradeAction::Opened, &trade, now));
                Ok(())
            }
            Err(e) => self.trade_failed(e, now),
        }
    }

    /// Evaluate risk limits; a breach liquidates every open trade.
    async fn enforce_risk(&mut self, now: DateTime<Utc>) -> Result<(), TradingError> {
        let assessed = self.risk.assess_risk(now, self.trade_manager.account());
        let Some(violation) = assessed else {
            if self.violation.take().is_some() {
                info!(strategy_id = %self.id(), "Risk limits clear, entries allowed again");
            }
            return Ok(());
        };
        if self.violation.is_none() {
            self.publish_log(LogLevel::Warn, format!("risk limit breached: {}", violation), now);
        }
        self.violation = Some(violation);
        if !self.trade_manager.open_trades().is_empty() {
            let outcome = self.trade_manager.close_all(CloseReason::RiskViolation).await;
            self.publish_outcome(&outcome, now);
        }
        Ok(())
    }

    /// The single stop path. Later calls are no-ops.
    async fn finish(&mut self, reason: StopReason, bars: &BarWindow) {
        if self.state.is_terminal() {
            return;
        }
        self.state = if reason.is_failure() {
            ExecutorState::Failed
        } else {
            ExecutorState::Stopped
        };
        let now = self.clock();

        let deinit = self.strategy_actions(bars, now, |strategy, ctx| strategy.on_deinit(&reason, ctx));
        match deinit {
            Ok(actions) => {
                if let Err(e) = self.apply_actions(actions, now).await {
                    error!(strategy_id = %self.id(), error = %e, "Deinit actions failed");
                }
            }
            Err(e) => error!(strategy_id = %self.id(), error = %e, "Strategy deinit failed"),
        }

        if self.config.close_on_stop && !self.trade_manager.open_trades().is_empty() {
            let outcome = self.trade_manager.close_all(CloseReason::EndOfRun).await;
            self.publish_outcome(&outcome, now);
        }

        let initial = self.trade_manager.account().initial_balance;
        match self
            .analyser
            .calculate_statistics(self.trade_manager.closed_trades(), initial)
        {
            Ok(statistics) => {
                self.publish(
                    EventPayload::Analysis {
                        statistics: statistics.clone(),
                    },
                    now,
                );
                self.statistics = Some(statistics);
            }
            Err(e) => warn!(strategy_id = %self.id(), error = %e, "Statistics not recalculated"),
        }

        self.publish_account(now);
        info!(
            strategy_id = %self.id(),
            reason = %reason,
            balance = %self.trade_manager.account().balance,
            trades = self.trade_manager.closed_trades().len(),
            "Strategy run stopped"
        );
        self.publisher.publish(Event::strategy_stop(self.id(), reason.clone(), now));
        self.stop_reason = Some(reason);
    }

    async fn fail(&mut self, err: TradingError, bars: &BarWindow) {
        if self.state.is_terminal() {
            return;
        }
        error!(strategy_id = %self.id(), kind = err.kind(), error = %err, "Strategy run failed");
        self.publisher.publish_error(self.id(), &err, self.clock());
        self.finish(StopReason::Failed(err.to_string()), bars).await;
    }
}

#[async_trait]
impl DataListener for RunContext {
    async fn on_new_day(&mut self, day_start: DateTime<Utc>, tick: &Tick, bars: &BarWindow) -> Result<(), TradingError> {
        self.now = Some(tick.timestamp);
        if self.risk.roll_day(tick.timestamp, self.trade_manager.account()) {
            debug!(strategy_id = %self.id(), day_start = %day_start, "New trading day");
        }
        let actions = self.strategy_actions(bars, tick.timestamp, |strategy, ctx| strategy.on_new_day(day_start, ctx))?;
        self.apply_actions(actions, tick.timestamp).await
    }

    async fn on_tick(&mut self, tick: &Tick, bars: &BarWindow) -> Result<(), TradingError> {
        let now = tick.timestamp;
        self.now = Some(now);

        match self.trade_manager.on_tick(tick).await {
            Ok(closed) => self.publish_closed(&closed, now),
            Err(e) => self.trade_failed(e, now)?,
        }
        self.enforce_risk(now).await?;

        let actions = self.strategy_actions(bars, now, |strategy, ctx| strategy.on_tick(tick, ctx))?;
        self.apply_actions(actions, now).await?;

        self.analyser.update_on_tick(self.trade_manager.account().equity);
        Ok(())
    }

    async fn on_bar_close(&mut self, bar: &Bar, bars: &BarWindow) -> Result<(), TradingError> {
        let now = bar.close_time;

        if self.config.bar_level_exits {
            // The sealed bar only spans the synthetic ticks; the source
            // candle carries the real extremes
            let candle = self
                .source_candle
                .take()
                .filter(|c| c.open_time == bar.open_time && c.instrument == bar.instrument);
            match self.trade_manager.update_on_bar(candle.as_ref().unwrap_or(bar), self.config.spread).await {
                Ok(closed) => self.publish_closed(&closed, now),
                Err(e) => self.trade_failed(e, now)?,
            }
        }
        self.enforce_risk(now).await?;
        self.publisher.publish(Event::bar(self.id(), bar));

        let actions = self.strategy_actions(bars, now, |strategy, ctx| strategy.on_bar_close(bar, ctx))?;
        self.apply_actions(actions, now).await?;

        self.analyser.update_on_bar(self.trade_manager.account().equity, now);
        self.publish_account(now);
        Ok(())
    }
}

struct PipelineState {
    data: DataManager,
    run: RunContext,
}

/// Listener registered with the data provider.
struct Pipeline {
    strategy_id: String,
    state: Mutex<PipelineState>,
    provider: Weak<dyn DataProvider>,
}

impl Pipeline {
    /// Ask the provider to stop. Must be called without the state lock held:
    /// an idle provider notifies its listeners synchronously.
    async fn stop_provider(&self, reason: StopReason) {
        if let Some(provider) = self.provider.upgrade() {
            provider.stop(reason).await;
        }
    }
}

#[async_trait]
impl DataProviderListener for Pipeline {
    async fn on_tick(&self, tick: &Tick) -> Result<(), TradingError> {
        let stop = {
            let mut guard = self.state.lock().await;
            let PipelineState { data, run } = &mut *guard;
            if run.state != ExecutorState::Running {
                return Ok(());
            }
            if let Err(e) = data.on_tick(tick, &mut *run).await {
                run.fail(e.clone(), data.window()).await;
                return Err(e);
            }
            match run.pending_stop.take() {
                Some(reason) => {
                    run.finish(reason.clone(), data.window()).await;
                    Some(reason)
                }
                None => None,
            }
        };
        if let Some(reason) = stop {
            self.stop_provider(reason).await;
        }
        Ok(())
    }

    async fn on_candle(&self, candle: &Bar) -> Result<(), TradingError> {
        let mut guard = self.state.lock().await;
        if guard.run.state == ExecutorState::Running {
            guard.run.source_candle = Some(candle.clone());
        }
        Ok(())
    }

    async fn on_stop(&self, reason: &StopReason) {
        let mut guard = self.state.lock().await;
        let PipelineState { data, run } = &mut *guard;
        if run.state.is_terminal() {
            return;
        }
        if run.state == ExecutorState::Running && *reason == StopReason::Completed {
            if let Err(e) = data.flush(&mut *run).await {
                run.fail(e, data.window()).await;
                return;
            }
        }
        let reason = run.pending_stop.take().unwrap_or_else(|| reason.clone());
        run.finish(reason, data.window()).await;
    }

    async fn on_error(&self, error: &TradingError) {
        let mut guard = self.state.lock().await;
        let PipelineState { data, run } = &mut *guard;
        run.fail(error.clone(), data.window()).await;
    }
}

/// Cloneable control handle for a run.
#[derive(Clone)]
pub struct ExecutorHandle {
    pipeline: Arc<Pipeline>,
    provider: Arc<dyn DataProvider>,
}

impl ExecutorHandle {
    pub fn strategy_id(&self) -> &str {
        &self.pipeline.strategy_id
    }

    /// Stop the run. Idempotent; waits for the callback in progress.
    pub async fn stop(&self, reason: StopReason) {
        {
            let mut guard = self.pipeline.state.lock().await;
            let PipelineState { data, run } = &mut *guard;
            run.finish(reason.clone(), data.window()).await;
        }
        self.provider.stop(reason).await;
    }

    pub async fn state(&self) -> ExecutorState {
        self.pipeline.state.lock().await.run.state
    }

    pub async fn is_terminated(&self) -> bool {
        self.state().await.is_terminal()
    }
}

impl fmt::Debug for ExecutorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorHandle")
            .field("strategy_id", &self.pipeline.strategy_id)
            .field("provider", &self.provider.name())
            .finish()
    }
}

/// Runs one strategy over one data provider.
pub struct StrategyExecutor {
    pipeline: Arc<Pipeline>,
    provider: Arc<dyn DataProvider>,
}

impl StrategyExecutor {
    pub fn new(
        config: ExecutorConfig,
        strategy: Box<dyn Strategy>,
        trade_manager: Box<dyn TradeManager>,
        provider: Arc<dyn DataProvider>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        let data = DataManager::new(config.period, config.risk.calendar, config.window_capacity);
        let run = RunContext {
            risk: RiskManager::new(config.risk.clone()),
            analyser: PerformanceAnalyser::new(config.risk_free_rate),
            config,
            state: ExecutorState::Created,
            strategy,
            trade_manager,
            publisher,
            violation: None,
            pending_stop: None,
            stop_reason: None,
            statistics: None,
            now: None,
            source_candle: None,
        };
        let pipeline = Arc::new(Pipeline {
            strategy_id: run.config.strategy_id.clone(),
            state: Mutex::new(PipelineState { data, run }),
            provider: Arc::downgrade(&provider),
        });
        Self { pipeline, provider }
    }

    pub fn strategy_id(&self) -> &str {
        &self.pipeline.strategy_id
    }

    pub fn handle(&self) -> ExecutorHandle {
        ExecutorHandle {
            pipeline: self.pipeline.clone(),
            provider: self.provider.clone(),
        }
    }

    pub async fn state(&self) -> ExecutorState {
        self.pipeline.state.lock().await.run.state
    }

    /// Register with the data provider and start the strategy.
    ///
    /// A strategy that fails to start ends the run as `Failed`.
    pub async fn initialise(&self) -> Result<(), TradingError> {
        let stop = {
            let mut guard = self.pipeline.state.lock().await;
            let PipelineState { data, run } = &mut *guard;
            match run.state {
                ExecutorState::Created => {}
                ExecutorState::Initialised | ExecutorState::Running => {
                    return Err(ExecutorError::AlreadyInitialised.into())
                }
                ExecutorState::Stopped | ExecutorState::Failed => {
                    return Err(ExecutorError::AlreadyTerminated.into())
                }
            }

            self.provider.add_listener(self.pipeline.clone());
            let now = run.clock();
            let started = match run.strategy_actions(data.window(), now, |strategy, ctx| strategy.on_start(ctx)) {
                Ok(actions) => run.apply_actions(actions, now).await,
                Err(e) => Err(e.into()),
            };
            if let Err(e) = started {
                run.fail(e.clone(), data.window()).await;
                return Err(e);
            }
            run.state = ExecutorState::Initialised;
            info!(
                strategy_id = %run.id(),
                strategy = %run.strategy.name(),
                provider = %self.provider.name(),
                "Strategy initialised"
            );

            match run.pending_stop.take() {
                Some(reason) => {
                    run.finish(reason.clone(), data.window()).await;
                    Some(reason)
                }
                None => None,
            }
        };
        if let Some(reason) = stop {
            self.provider.stop(reason).await;
        }
        Ok(())
    }

    /// Feed the strategy until the provider finishes or the run is stopped.
    ///
    /// A run that fails still returns its summary; only lifecycle misuse is
    /// an error.
    pub async fn run(&self) -> Result<RunSummary, ExecutorError> {
        {
            let mut guard = self.pipeline.state.lock().await;
            let state = guard.run.state;
            match state {
                ExecutorState::Initialised => guard.run.state = ExecutorState::Running,
                ExecutorState::Created => return Err(ExecutorError::NotInitialised(state.to_string())),
                ExecutorState::Running => return Err(ExecutorError::AlreadyRunning),
                ExecutorState::Stopped | ExecutorState::Failed => return Err(ExecutorError::AlreadyTerminated),
            }
            info!(strategy_id = %guard.run.id(), "Strategy run started");
        }

        self.provider.start().await;

        {
            let mut guard = self.pipeline.state.lock().await;
            let PipelineState { data, run } = &mut *guard;
            if !run.state.is_terminal() {
                debug!(strategy_id = %run.id(), "Provider returned without stopping the run");
                run.finish(StopReason::Completed, data.window()).await;
            }
        }
        Ok(self.summary().await)
    }

    /// Snapshot of the run so far.
    pub async fn summary(&self) -> RunSummary {
        let guard = self.pipeline.state.lock().await;
        let PipelineState { data, run } = &*guard;
        RunSummary {
            strategy_id: run.config.strategy_id.clone(),
            status: run.state,
            stop_reason: run.stop_reason.clone(),
            account: run.trade_manager.account().clone(),
            closed_trades: run.trade_manager.closed_trades().to_vec(),
            statistics: run.statistics.clone(),
            equity_curve: run.analyser.equity_curve().to_vec(),
            ticks_processed: data.ticks_processed(),
            ticks_dropped: data.ticks_dropped(),
        }
    }
}
