//! OHLCV bars and the bounded window of closed bars.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::{Tick, Timeframe};

/// OHLCV aggregate over one period.
///
/// `close_time` is inclusive: it is the timestamp of the last price that
/// belongs to the bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    pub instrument: String,
    pub period: Timeframe,
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Bar {
    /// Create a bar covering a whole period starting at `open_time`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        instrument: impl Into<String>,
        period: Timeframe,
        open_time: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            instrument: instrument.into(),
            period,
            open_time,
            close_time: period.close_time(open_time),
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Start a bar from its first tick; the bucket start becomes the open time.
    pub fn from_tick(tick: &Tick, period: Timeframe) -> Self {
        Self {
            instrument: tick.instrument.clone(),
            period,
            open_time: period.bucket_start(tick.timestamp),
            close_time: tick.timestamp,
            open: tick.mid,
            high: tick.mid,
            low: tick.mid,
            close: tick.mid,
            volume: Decimal::ONE,
        }
    }

    /// Fold a tick into an in-progress bar.
    pub fn absorb(&mut self, tick: &Tick) {
        self.high = self.high.max(tick.mid);
        self.low = self.low.min(tick.mid);
        self.close = tick.mid;
        self.close_time = tick.timestamp;
        self.volume += Decimal::ONE;
    }

    #[inline]
    pub fn range(&self) -> Decimal {
        self.high - self.low
    }

    #[inline]
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// High/low bounds hold and contain open and close.
    pub fn is_well_formed(&self) -> bool {
        self.low <= self.high
            && self.open >= self.low
            && self.open <= self.high
            && self.close >= self.low
            && self.close <= self.high
            && self.open_time <= self.close_time
    }
}

/// Fixed-capacity sliding window of closed bars, oldest first.
#[derive(Debug, Clone)]
pub struct BarWindow {
    bars: VecDeque<Bar>,
    capacity: usize,
}

impl BarWindow {
    /// Create a window holding at most `capacity` bars (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            bars: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a bar, evicting the oldest when full.
    pub fn push(&mut self, bar: Bar) {
        if self.bars.len() >= self.capacity {
            self.bars.pop_front();
        }
        self.bars.push_back(bar);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.back()
    }

    /// Bar by index, 0 = oldest.
    pub fn get(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    /// The most recent `n` bars, oldest first.
    pub fn last_n(&self, n: usize) -> impl Iterator<Item = &Bar> {
        let start = self.bars.len().saturating_sub(n);
        self.bars.iter().skip(start)
    }

    pub fn closes(&self) -> Vec<Decimal> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bar> {
        self.bars.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn bar(minute: i64, close: Decimal) -> Bar {
        let open_time = Utc.timestamp_millis_opt(minute * 60_000).unwrap();
        Bar::new("EUR_USD", Timeframe::Minute1, open_time, close, close, close, close, dec!(1))
    }

    #[test]
    fn test_bar_close_time_is_inclusive() {
        let b = bar(1, dec!(1.1));
        assert_eq!(b.close_time.timestamp_millis(), 119_999);
        assert!(b.is_well_formed());
    }

    #[test]
    fn test_bar_absorbs_ticks() {
        let ts = Utc.timestamp_millis_opt(60_500).unwrap();
        let mut b = Bar::from_tick(&Tick::from_mid("EUR_USD", dec!(1.1), dec!(0), ts), Timeframe::Minute1);
        assert_eq!(b.open_time.timestamp_millis(), 60_000);

        let later = Utc.timestamp_millis_opt(61_000).unwrap();
        b.absorb(&Tick::from_mid("EUR_USD", dec!(1.2), dec!(0), later));
        b.absorb(&Tick::from_mid("EUR_USD", dec!(1.05), dec!(0), later));
        assert_eq!(b.high, dec!(1.2));
        assert_eq!(b.low, dec!(1.05));
        assert_eq!(b.close, dec!(1.05));
        assert_eq!(b.volume, dec!(3));
        assert_eq!(b.close_time, later);
    }

    #[test]
    fn test_window_evicts_oldest() {
        let mut window = BarWindow::new(3);
        for i in 0..4 {
            window.push(bar(i, Decimal::from(i)));
        }
        assert_eq!(window.len(), 3);
        assert_eq!(window.get(0).unwrap().close, dec!(1));
        assert_eq!(window.closes(), vec![dec!(1), dec!(2), dec!(3)]);
        assert_eq!(window.last_n(2).count(), 2);
    }
}
