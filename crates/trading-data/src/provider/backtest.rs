//! Historical replay: candles → synthetic ticks → listeners.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use trading_core::error::TradingError;
use trading_core::traits::{CandleRequest, CandleSink, CandleSource, DataProvider, DataProviderListener};
use trading_core::types::{Bar, StopReason};

use super::{ProviderCore, StopAction};
use crate::tick_generator::TickGenerator;

/// Candles read ahead of the tick consumer.
const CANDLE_BUFFER: usize = 256;

/// Forwards streamed candles to the consumer, waiting while the buffer is full.
struct ChannelSink<'a> {
    core: &'a ProviderCore,
    tx: mpsc::Sender<Bar>,
}

#[async_trait]
impl<'a> CandleSink for ChannelSink<'a> {
    async fn on_candle(&mut self, bar: Bar) -> bool {
        self.core.should_continue() && self.tx.send(bar).await.is_ok()
    }
}

/// Streams candles for a date range and expands each into ticks.
pub struct BacktestDataProvider {
    core: ProviderCore,
    source: Arc<dyn CandleSource>,
    request: CandleRequest,
    generator: TickGenerator,
}

impl BacktestDataProvider {
    pub fn new(source: Arc<dyn CandleSource>, request: CandleRequest, generator: TickGenerator) -> Self {
        Self {
            core: ProviderCore::new(format!("backtest:{}", source.name())),
            source,
            request,
            generator,
        }
    }

    pub fn request(&self) -> &CandleRequest {
        &self.request
    }

    pub fn generator(&self) -> &TickGenerator {
        &self.generator
    }

    /// Replay until the candles run out, a listener fails or a stop is
    /// requested. Returns the tick count and the error that ended the feed.
    async fn replay(&self) -> (u64, Option<TradingError>) {
        let (tx, mut rx) = mpsc::channel::<Bar>(CANDLE_BUFFER);
        let core = &self.core;

        let producer = async {
            let mut sink = ChannelSink { core, tx };
            self.source.stream_candles(&self.request, &mut sink).await
        };

        let consumer = async move {
            let mut ticks = 0u64;
            while let Some(bar) = rx.recv().await {
                if !core.should_continue() {
                    return (ticks, None);
                }
                if let Err(e) = core.dispatch_candle(&bar).await {
                    return (ticks, Some(e));
                }
                for tick in self.generator.ticks(&bar) {
                    if !core.should_continue() {
                        return (ticks, None);
                    }
                    if let Err(e) = core.dispatch_tick(&tick).await {
                        return (ticks, Some(e));
                    }
                    ticks += 1;
                }
            }
            (ticks, None)
        };

        let (produced, (ticks, listener_error)) = tokio::join!(producer, consumer);
        let error = match (listener_error, produced) {
            (Some(e), _) => Some(e),
            (None, Err(e)) => Some(e.into()),
            (None, Ok(0)) => {
                warn!(
                    instrument = %self.request.instrument,
                    from = %self.request.from,
                    to = %self.request.to,
                    "No candles in the requested range"
                );
                None
            }
            (None, Ok(_)) => None,
        };
        (ticks, error)
    }
}

#[async_trait]
impl DataProvider for BacktestDataProvider {
    async fn start(&self) {
        if !self.core.try_begin() {
            return;
        }
        info!(
            provider = %self.core.name(),
            instrument = %self.request.instrument,
            period = %self.request.period,
            "Starting backtest feed"
        );
        let (ticks, error) = self.replay().await;
        info!(provider = %self.core.name(), ticks, "Backtest feed drained");
        self.core.finish(error).await;
    }

    async fn stop(&self, reason: StopReason) {
        if self.core.request_stop(reason) == StopAction::FinishNow {
            self.core.finish(None).await;
        }
    }

    fn add_listener(&self, listener: Arc<dyn DataProviderListener>) {
        self.core.add_listener(listener);
    }

    fn is_running(&self) -> bool {
        self.core.is_running()
    }

    fn name(&self) -> &str {
        self.core.name()
    }
}
