//! Shared fixtures for the engine integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use std::sync::Mutex;
use tokio::sync::Notify;
use trading_core::error::{DataError, StrategyError};
use trading_core::events::{Event, EventPayload};
use trading_core::traits::{
    CandleRequest, CandleSink, CandleSource, EventListener, ListenerError, PositionSizing, Strategy, StrategyContext,
    StrategyState,
};
use trading_core::types::{Bar, Instrument, Timeframe};
use trading_engine::BacktestSpec;

pub const SYMBOL: &str = "EUR_USD";

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
}

/// Hourly bars with the given closes; each bar opens at the previous close.
pub fn hourly_bars(closes: &[Decimal]) -> Vec<Bar> {
    let mut open = closes.first().copied().unwrap_or(Decimal::ONE);
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let high = open.max(close) + Decimal::new(5, 4);
            let low = open.min(close) - Decimal::new(5, 4);
            let bar = Bar::new(SYMBOL, Timeframe::Hour1, start() + Duration::hours(i as i64), open, high, low, close, Decimal::from(100));
            open = close;
            bar
        })
        .collect()
}

/// A gentle sine-like series so crossover strategies trade in both directions.
pub fn wave(count: usize) -> Vec<Decimal> {
    let pattern = [0i64, 8, 15, 20, 22, 20, 15, 8, 0, -8, -15, -20, -22, -20, -15, -8];
    (0..count)
        .map(|i| Decimal::new(11000 + pattern[i % pattern.len()] * 3 + (i as i64 / 16), 4))
        .collect()
}

pub fn spec(id: &str, bars: usize) -> BacktestSpec {
    let mut spec = BacktestSpec::new(
        id,
        Instrument::forex(SYMBOL),
        Timeframe::Hour1,
        start(),
        start() + Duration::hours(bars as i64),
    );
    spec.spread = Decimal::new(2, 4);
    spec
}

/// Candles held in memory, optionally failing after `fail_after` candles.
pub struct VecCandleSource {
    bars: Vec<Bar>,
    fail_after: Option<usize>,
}

impl VecCandleSource {
    pub fn new(bars: Vec<Bar>) -> Self {
        Self { bars, fail_after: None }
    }

    pub fn failing_after(bars: Vec<Bar>, n: usize) -> Self {
        Self {
            bars,
            fail_after: Some(n),
        }
    }
}

#[async_trait]
impl CandleSource for VecCandleSource {
    async fn fetch_candles(&self, request: &CandleRequest) -> Result<Vec<Bar>, DataError> {
        Ok(self
            .bars
            .iter()
            .filter(|b| b.instrument == request.instrument && request.contains(b.open_time))
            .cloned()
            .collect())
    }

    async fn stream_candles(&self, request: &CandleRequest, sink: &mut dyn CandleSink) -> Result<usize, DataError> {
        let mut delivered = 0;
        for bar in self.fetch_candles(request).await? {
            if self.fail_after == Some(delivered) {
                return Err(DataError::ConnectionError("candle feed dropped".into()));
            }
            delivered += 1;
            if !sink.on_candle(bar).await {
                break;
            }
            tokio::task::yield_now().await;
        }
        Ok(delivered)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Records every event; optionally signals once `notify_after_bars` bars
/// have been seen.
#[derive(Default)]
pub struct Collector {
    events: Mutex<Vec<Event>>,
    notify_after_bars: Option<usize>,
    pub notify: Notify,
}

impl Collector {
    pub fn notifying_after(bars: usize) -> Self {
        Self {
            notify_after_bars: Some(bars),
            ..Default::default()
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn tags(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.type_tag()).collect()
    }

    pub fn count(&self, tag: &str) -> usize {
        self.tags().iter().filter(|t| **t == tag).count()
    }
}

impl EventListener for Collector {
    fn on_event(&self, event: &Event) -> Result<(), ListenerError> {
        let mut events = self.events.lock().unwrap();
        events.push(event.clone());
        if let Some(n) = self.notify_after_bars {
            let bars = events.iter().filter(|e| matches!(e.payload, EventPayload::Bar { .. })).count();
            if bars == n {
                self.notify.notify_one();
            }
        }
        Ok(())
    }
}

/// Opens a fixed-size long on every `every`-th bar and closes it on the
/// next one; optionally fails on bar `fail_on_bar`.
pub struct Alternating {
    pub quantity: Decimal,
    pub every: usize,
    pub fail_on_bar: Option<usize>,
    bars: usize,
}

impl Alternating {
    pub fn new(quantity: Decimal) -> Self {
        Self {
            quantity,
            every: 2,
            fail_on_bar: None,
            bars: 0,
        }
    }
}

impl Strategy for Alternating {
    fn name(&self) -> &str {
        "alternating"
    }

    fn on_bar_close(&mut self, _bar: &Bar, ctx: &mut StrategyContext<'_>) -> Result<(), StrategyError> {
        self.bars += 1;
        if self.fail_on_bar == Some(self.bars) {
            return Err(StrategyError::Internal(format!("refusing bar {}", self.bars)));
        }
        if ctx.open_trades.is_empty() {
            if self.bars % self.every == 0 {
                ctx.open_long(PositionSizing::fixed(self.quantity));
            }
        } else {
            ctx.close_all();
        }
        Ok(())
    }

    fn state(&self) -> StrategyState {
        StrategyState {
            name: self.name().to_string(),
            bars_processed: self.bars,
            ..Default::default()
        }
    }
}
