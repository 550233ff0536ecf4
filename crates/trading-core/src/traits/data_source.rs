//! Data source trait definitions.

use crate::error::{BrokerError, DataError};
use crate::types::{Bar, Tick, Timeframe};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// A half-open range `[from, to)` of candles for one instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandleRequest {
    pub instrument: String,
    pub period: Timeframe,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl CandleRequest {
    pub fn new(instrument: impl Into<String>, period: Timeframe, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            instrument: instrument.into(),
            period,
            from,
            to,
        }
    }

    pub fn contains(&self, open_time: DateTime<Utc>) -> bool {
        open_time >= self.from && open_time < self.to
    }
}

/// Push-side consumer of streamed candles. Returning `false` cancels the
/// stream; a slow sink holds the source back.
#[async_trait]
pub trait CandleSink: Send {
    async fn on_candle(&mut self, bar: Bar) -> bool;
}

#[async_trait]
impl<F> CandleSink for F
where
    F: FnMut(Bar) -> bool + Send,
{
    async fn on_candle(&mut self, bar: Bar) -> bool {
        self(bar)
    }
}

/// Historical candle source.
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Fetch candles ordered from oldest to newest.
    async fn fetch_candles(&self, request: &CandleRequest) -> Result<Vec<Bar>, DataError>;

    /// Push candles into `sink` until exhausted or cancelled. Returns the
    /// number of candles delivered.
    async fn stream_candles(&self, request: &CandleRequest, sink: &mut dyn CandleSink) -> Result<usize, DataError> {
        let bars = self.fetch_candles(request).await?;
        let mut delivered = 0;
        for bar in bars {
            delivered += 1;
            if !sink.on_candle(bar).await {
                break;
            }
        }
        Ok(delivered)
    }

    fn name(&self) -> &str;
}

/// A real-time price message from a broker stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub instrument: String,
    pub bid: Decimal,
    pub ask: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl PriceUpdate {
    pub fn to_tick(&self) -> Tick {
        Tick::from_quote(self.instrument.clone(), self.bid, self.ask, self.timestamp)
    }
}

/// Live price streaming collaborator.
#[async_trait]
pub trait PriceStream: Send + Sync {
    /// Subscribe to prices. The channel closes when the stream ends.
    async fn stream_prices(
        &self,
        instruments: &[String],
    ) -> Result<mpsc::Receiver<Result<PriceUpdate, BrokerError>>, BrokerError>;

    fn name(&self) -> &str;
}
