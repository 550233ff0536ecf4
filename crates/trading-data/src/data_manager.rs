//! Aggregates ticks into bars and trading days.

use chrono::{DateTime, Utc};
use tracing::debug;
use trading_core::error::TradingError;
use trading_core::traits::DataListener;
use trading_core::types::{Bar, BarWindow, Tick, Timeframe, TradingCalendar};

/// Turns a tick stream into `on_new_day`, `on_tick` and `on_bar_close`
/// callbacks for a single [`DataListener`].
///
/// A bar is sealed either when a tick arrives in a later period bucket or
/// when a tick lands on the last millisecond of its bucket. A sealed bar's
/// close time is the timestamp of its last tick.
pub struct DataManager {
    period: Timeframe,
    calendar: TradingCalendar,
    window: BarWindow,
    pending: Option<Bar>,
    last_timestamp: Option<DateTime<Utc>>,
    current_day: Option<DateTime<Utc>>,
    ticks_processed: u64,
    ticks_dropped: u64,
}

impl DataManager {
    pub fn new(period: Timeframe, calendar: TradingCalendar, window_capacity: usize) -> Self {
        Self {
            period,
            calendar,
            window: BarWindow::new(window_capacity),
            pending: None,
            last_timestamp: None,
            current_day: None,
            ticks_processed: 0,
            ticks_dropped: 0,
        }
    }

    pub async fn on_tick(&mut self, tick: &Tick, listener: &mut dyn DataListener) -> Result<(), TradingError> {
        if let Some(last) = self.last_timestamp {
            if tick.timestamp < last {
                self.ticks_dropped += 1;
                debug!(
                    instrument = %tick.instrument,
                    timestamp = %tick.timestamp,
                    last = %last,
                    "Dropping out-of-order tick"
                );
                return Ok(());
            }
        }
        self.last_timestamp = Some(tick.timestamp);
        self.ticks_processed += 1;

        let bucket = self.period.bucket_start(tick.timestamp);
        if self.pending.as_ref().is_some_and(|bar| bar.open_time < bucket) {
            self.seal(listener).await?;
        }

        let day_start = self.calendar.day_start(tick.timestamp);
        if self.current_day.map_or(true, |current| day_start > current) {
            self.current_day = Some(day_start);
            listener.on_new_day(day_start, tick, &self.window).await?;
        }

        match self.pending.as_mut() {
            Some(bar) => bar.absorb(tick),
            None => self.pending = Some(Bar::from_tick(tick, self.period)),
        }
        listener.on_tick(tick, &self.window).await?;

        if tick.timestamp == self.period.bucket_end(tick.timestamp) {
            self.seal(listener).await?;
        }
        Ok(())
    }

    /// Seal the in-progress bar, if any, at the end of a feed.
    pub async fn flush(&mut self, listener: &mut dyn DataListener) -> Result<Option<Bar>, TradingError> {
        self.seal(listener).await
    }

    async fn seal(&mut self, listener: &mut dyn DataListener) -> Result<Option<Bar>, TradingError> {
        let Some(bar) = self.pending.take() else {
            return Ok(None);
        };
        self.window.push(bar.clone());
        listener.on_bar_close(&bar, &self.window).await?;
        Ok(Some(bar))
    }

    pub fn window(&self) -> &BarWindow {
        &self.window
    }

    pub fn pending(&self) -> Option<&Bar> {
        self.pending.as_ref()
    }

    pub fn period(&self) -> Timeframe {
        self.period
    }

    pub fn ticks_processed(&self) -> u64 {
        self.ticks_processed
    }

    pub fn ticks_dropped(&self) -> u64 {
        self.ticks_dropped
    }
}
