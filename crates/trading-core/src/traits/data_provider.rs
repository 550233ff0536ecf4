//! Market data feed seams.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::error::TradingError;
use crate::types::{Bar, BarWindow, StopReason, Tick};

/// Receives ticks from a [`DataProvider`].
#[async_trait]
pub trait DataProviderListener: Send + Sync {
    /// An error ends the feed: the provider reports it through `on_error`
    /// and then stops.
    async fn on_tick(&self, tick: &Tick) -> Result<(), TradingError>;

    /// The source candle the following ticks are synthesised from. Only
    /// historical feeds call this, before the candle's first tick.
    async fn on_candle(&self, _candle: &Bar) -> Result<(), TradingError> {
        Ok(())
    }

    /// Called exactly once per feed, after any `on_error`.
    async fn on_stop(&self, reason: &StopReason);

    async fn on_error(&self, error: &TradingError);
}

/// A source of ticks, historical or live.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Run the feed to completion. A no-op while running or once finished.
    async fn start(&self);

    /// Request the feed to stop. Observed between ticks; idempotent.
    async fn stop(&self, reason: StopReason);

    fn add_listener(&self, listener: Arc<dyn DataProviderListener>);

    fn is_running(&self) -> bool;

    fn name(&self) -> &str;
}

/// Receives aggregated callbacks from a data manager.
///
/// Per tick the order is `on_new_day`, `on_tick`, then `on_bar_close` when
/// the tick completes a bar.
#[async_trait]
pub trait DataListener: Send {
    async fn on_new_day(&mut self, day_start: DateTime<Utc>, tick: &Tick, bars: &BarWindow) -> Result<(), TradingError>;

    async fn on_tick(&mut self, tick: &Tick, bars: &BarWindow) -> Result<(), TradingError>;

    /// `bars` already contains `bar` as its newest element.
    async fn on_bar_close(&mut self, bar: &Bar, bars: &BarWindow) -> Result<(), TradingError>;
}
