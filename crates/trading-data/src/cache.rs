//! Candle caching.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use trading_core::error::DataError;
use trading_core::traits::{CandleRequest, CandleSink, CandleSource};
use trading_core::types::{Bar, Timeframe};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    instrument: String,
    period: Timeframe,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

impl From<&CandleRequest> for CacheKey {
    fn from(request: &CandleRequest) -> Self {
        Self {
            instrument: request.instrument.clone(),
            period: request.period,
            from: request.from,
            to: request.to,
        }
    }
}

/// Keeps fetched candle ranges in memory so repeated runs over the same
/// range (optimisation trials) hit the underlying source once.
pub struct CachedCandleSource<S> {
    inner: S,
    cache: RwLock<HashMap<CacheKey, Arc<Vec<Bar>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<S: CandleSource> CachedCandleSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    async fn load(&self, request: &CandleRequest) -> Result<Arc<Vec<Bar>>, DataError> {
        let key = CacheKey::from(request);
        if let Some(bars) = self.cache.read().await.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(bars.clone());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let bars = Arc::new(self.inner.fetch_candles(request).await?);
        debug!(
            instrument = %request.instrument,
            period = %request.period,
            bars = bars.len(),
            "Cached candle range"
        );
        self.cache.write().await.insert(key, bars.clone());
        Ok(bars)
    }

    /// Drop every cached range for `instrument`.
    pub async fn invalidate(&self, instrument: &str) {
        self.cache.write().await.retain(|k, _| k.instrument != instrument);
    }

    pub async fn clear(&self) {
        self.cache.write().await.clear();
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl<S: CandleSource> CandleSource for CachedCandleSource<S> {
    async fn fetch_candles(&self, request: &CandleRequest) -> Result<Vec<Bar>, DataError> {
        Ok(self.load(request).await?.as_ref().clone())
    }

    async fn stream_candles(
        &self,
        request: &CandleRequest,
        sink: &mut dyn CandleSink,
    ) -> Result<usize, DataError> {
        let bars = self.load(request).await?;
        let mut delivered = 0;
        for bar in bars.iter() {
            delivered += 1;
            if !sink.on_candle(bar.clone()).await {
                break;
            }
        }
        Ok(delivered)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    struct CountingSource {
        calls: AtomicU64,
    }

    #[async_trait]
    impl CandleSource for CountingSource {
        async fn fetch_candles(&self, request: &CandleRequest) -> Result<Vec<Bar>, DataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Bar::new(
                request.instrument.clone(),
                request.period,
                request.from,
                dec!(1),
                dec!(1),
                dec!(1),
                dec!(1),
                dec!(1),
            )])
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn request(instrument: &str) -> CandleRequest {
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        CandleRequest::new(instrument, Timeframe::Hour1, from, from + chrono::Duration::days(1))
    }

    #[tokio::test]
    async fn test_second_fetch_hits_cache() {
        let cached = CachedCandleSource::new(CountingSource { calls: AtomicU64::new(0) });

        cached.fetch_candles(&request("EUR_USD")).await.unwrap();
        let mut count = 0;
        let mut sink = |_bar: Bar| {
            count += 1;
            true
        };
        cached.stream_candles(&request("EUR_USD"), &mut sink).await.unwrap();

        assert_eq!(count, 1);
        assert_eq!(cached.misses(), 1);
        assert_eq!(cached.hits(), 1);
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let cached = CachedCandleSource::new(CountingSource { calls: AtomicU64::new(0) });
        cached.fetch_candles(&request("EUR_USD")).await.unwrap();
        cached.fetch_candles(&request("GBP_USD")).await.unwrap();

        cached.invalidate("EUR_USD").await;
        cached.fetch_candles(&request("EUR_USD")).await.unwrap();
        cached.fetch_candles(&request("GBP_USD")).await.unwrap();

        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 3);
    }
}
