//! End-to-end backtests over in-memory candles.

mod common;

use chrono::Duration;
use common::{hourly_bars, spec, start, wave, Alternating, Collector, VecCandleSource, SYMBOL};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::Arc;
use trading_core::error::StrategyError;
use trading_core::events::{Event, EventPayload, TradeAction};
use trading_core::traits::{
    CandleSource, EventListener, EventPublisher, ListenerError, PositionSizing, Strategy, StrategyContext, StrategyState,
};
use trading_core::types::{Bar, CloseReason, StopReason, Timeframe, Trade};
use trading_data::TickDensity;
use trading_engine::{run_backtest, ExecutorState, RunSummary};
use trading_monitor::{AsyncEventPublisher, SyncEventPublisher};
use trading_strategies::StrategyRegistry;

async fn crossover_run(bars: usize) -> (RunSummary, Arc<Collector>) {
    let source: Arc<dyn CandleSource> = Arc::new(VecCandleSource::new(hourly_bars(&wave(bars))));
    let strategy = StrategyRegistry::new()
        .create(
            "ma_crossover",
            &json!({"fast_period": 3, "slow_period": 8, "use_ema": false, "stop_pips": 30.0}),
        )
        .unwrap();
    let publisher = Arc::new(SyncEventPublisher::new());
    let collector = Arc::new(Collector::default());
    publisher.add_listener(collector.clone());

    let summary = run_backtest(&spec("crossover", bars), source, strategy, publisher)
        .await
        .unwrap();
    (summary, collector)
}

fn realized(trades: &[Trade]) -> Decimal {
    trades.iter().map(|t| t.profit).sum()
}

#[tokio::test]
async fn test_crossover_backtest_end_to_end() {
    let (summary, events) = crossover_run(160).await;

    assert_eq!(summary.status, ExecutorState::Stopped);
    assert_eq!(summary.stop_reason, Some(StopReason::Completed));
    assert_eq!(summary.ticks_processed, 160 * 4);
    assert!(!summary.closed_trades.is_empty());
    assert!(summary.closed_trades.iter().all(|t| t.close_reason.is_some()));

    // Everything was liquidated, so balance is initial plus realized profit
    assert_eq!(summary.account.balance, dec!(10000) + realized(&summary.closed_trades));
    assert_eq!(summary.account.equity, summary.account.balance);

    let stats = summary.statistics.as_ref().unwrap();
    assert_eq!(stats.total_trades, summary.closed_trades.len());
    assert_eq!(stats.final_balance, summary.account.balance);
    assert_eq!(stats.total_ticks, 160 * 4);
    assert_eq!(summary.equity_curve.len(), 160);

    assert_eq!(events.count("bar"), 160);
    assert_eq!(events.count("analysis"), 1);
    assert_eq!(events.count("strategy_stop"), 1);
    assert_eq!(events.tags().last(), Some(&"strategy_stop"));
    assert!(events.count("indicator") > 0);

    let (mut opened, mut closed) = (0, 0);
    for event in events.events() {
        match &event.payload {
            EventPayload::Trade { action: TradeAction::Opened, .. } => opened += 1,
            EventPayload::Trade { action: TradeAction::Closed, .. } => closed += 1,
            EventPayload::Account { account } => {
                assert_eq!(account.equity, account.balance + account.open_position_value);
            }
            _ => {}
        }
    }
    assert_eq!(opened, closed);
    assert_eq!(closed, summary.closed_trades.len());
}

#[tokio::test]
async fn test_same_seed_replays_identically() {
    let (first, _) = crossover_run(96).await;
    let (second, _) = crossover_run(96).await;

    assert_eq!(first.closed_trades, second.closed_trades);
    assert_eq!(first.account, second.account);
    assert_eq!(first.statistics, second.statistics);
}

#[tokio::test]
async fn test_bar_only_density_evaluates_exits_per_bar() {
    let bars = 48;
    let source: Arc<dyn CandleSource> = Arc::new(VecCandleSource::new(hourly_bars(&wave(bars))));
    let mut spec = spec("bar-only", bars);
    spec.density = TickDensity::BarOnly;
    let publisher: Arc<dyn EventPublisher> = Arc::new(SyncEventPublisher::new());

    let summary = run_backtest(&spec, source, Box::new(Alternating::new(dec!(1000))), publisher)
        .await
        .unwrap();

    assert_eq!(summary.status, ExecutorState::Stopped);
    assert_eq!(summary.ticks_processed, bars as u64);
    assert_eq!(summary.account.balance, dec!(10000) + realized(&summary.closed_trades));
}

/// Delegates to a collector after a short pause per event.
struct Sluggish(Arc<Collector>);

impl EventListener for Sluggish {
    fn on_event(&self, event: &Event) -> Result<(), ListenerError> {
        std::thread::sleep(std::time::Duration::from_micros(200));
        self.0.on_event(event)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_saturated_async_queue_still_reports_the_end_of_the_run() {
    let bars = 3000;
    let source: Arc<dyn CandleSource> = Arc::new(VecCandleSource::new(hourly_bars(&wave(bars))));
    let publisher = Arc::new(AsyncEventPublisher::default());
    let collector = Arc::new(Collector::default());
    publisher.add_listener(Arc::new(Sluggish(collector.clone())));

    let summary = run_backtest(
        &spec("saturated", bars),
        source,
        Box::new(Alternating::new(dec!(1000))),
        publisher.clone(),
    )
    .await
    .unwrap();
    publisher.drained().await;

    assert_eq!(summary.status, ExecutorState::Stopped);
    assert!(publisher.dropped() > 0);
    assert_eq!(collector.count("analysis"), 1);
    assert_eq!(collector.count("strategy_stop"), 1);
    assert_eq!(collector.tags().last(), Some(&"strategy_stop"));
}

/// Buys once on the first bar with a fixed bracket.
struct BracketOnce {
    opened: bool,
}

impl Strategy for BracketOnce {
    fn name(&self) -> &str {
        "bracket_once"
    }

    fn on_bar_close(&mut self, _bar: &Bar, ctx: &mut StrategyContext<'_>) -> Result<(), StrategyError> {
        if !self.opened {
            self.opened = true;
            ctx.open_long(PositionSizing::Fixed {
                quantity: dec!(10),
                stop_loss: Some(dec!(95)),
                take_profit: Some(dec!(110)),
            });
        }
        Ok(())
    }

    fn state(&self) -> StrategyState {
        StrategyState::default()
    }
}

fn candle(hour: i64, open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Bar {
    Bar::new(SYMBOL, Timeframe::Hour1, start() + Duration::hours(hour), open, high, low, close, dec!(100))
}

async fn bracket_run(second: Bar) -> RunSummary {
    let bars = vec![
        candle(0, dec!(100), dec!(100), dec!(100), dec!(100)),
        second,
        candle(2, dec!(100), dec!(100), dec!(100), dec!(100)),
    ];
    let source: Arc<dyn CandleSource> = Arc::new(VecCandleSource::new(bars));
    let mut spec = spec("bracket", 3);
    spec.density = TickDensity::BarOnly;
    spec.spread = Decimal::ZERO;
    let publisher: Arc<dyn EventPublisher> = Arc::new(SyncEventPublisher::new());

    run_backtest(&spec, source, Box::new(BracketOnce { opened: false }), publisher)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_bar_only_stop_fills_at_candle_low() {
    // Closes back at the entry price, but the candle traded through the stop
    let summary = bracket_run(candle(1, dec!(100), dec!(100), dec!(94), dec!(100))).await;

    assert_eq!(summary.closed_trades.len(), 1);
    let trade = &summary.closed_trades[0];
    assert_eq!(trade.close_reason, Some(CloseReason::StopLoss));
    assert_eq!(trade.close_price, Some(dec!(94)));
    assert_eq!(summary.account.balance, dec!(9940));
}

#[tokio::test]
async fn test_bar_only_target_fills_at_candle_high() {
    let summary = bracket_run(candle(1, dec!(100), dec!(112), dec!(99), dec!(101))).await;

    assert_eq!(summary.closed_trades.len(), 1);
    let trade = &summary.closed_trades[0];
    assert_eq!(trade.close_reason, Some(CloseReason::TakeProfit));
    assert_eq!(trade.close_price, Some(dec!(112)));
    assert_eq!(summary.account.balance, dec!(10120));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_flat_account_conserves_balance(
        pips in prop::collection::vec(-40i64..40, 8..40),
        quantity in 1u32..50_000,
    ) {
        let closes: Vec<Decimal> = pips.iter().map(|p| Decimal::new(11000 + p, 4)).collect();
        let bars = closes.len();
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let summary = runtime.block_on(async {
            let source: Arc<dyn CandleSource> = Arc::new(VecCandleSource::new(hourly_bars(&closes)));
            let publisher: Arc<dyn EventPublisher> = Arc::new(SyncEventPublisher::new());
            let strategy = Alternating::new(Decimal::from(quantity));
            run_backtest(&spec("prop", bars), source, Box::new(strategy), publisher).await.unwrap()
        });

        prop_assert_eq!(summary.status, ExecutorState::Stopped);
        prop_assert_eq!(summary.account.balance, dec!(10000) + realized(&summary.closed_trades));
        prop_assert_eq!(summary.account.open_position_value, Decimal::ZERO);
    }
}
