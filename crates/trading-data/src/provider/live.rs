//! Live price streaming.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};
use trading_core::error::{BrokerError, DataError, TradingError};
use trading_core::traits::{DataProvider, DataProviderListener, PriceStream};
use trading_core::types::StopReason;

use super::{ProviderCore, StopAction};

#[derive(Debug, Clone)]
pub struct LiveFeedConfig {
    pub instruments: Vec<String>,
    /// Bound on establishing the subscription
    pub subscribe_timeout: Duration,
    /// Longest gap between two price messages
    pub idle_timeout: Duration,
}

impl LiveFeedConfig {
    pub fn new(instruments: Vec<String>) -> Self {
        Self {
            instruments,
            subscribe_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(30),
        }
    }
}

/// Forwards broker price updates to listeners as ticks.
///
/// A subscription failure, stream error, closed stream or idle timeout is
/// reported through `on_error` and ends the feed. Reconnecting is left to the
/// caller.
pub struct LiveDataProvider {
    core: ProviderCore,
    stream: Arc<dyn PriceStream>,
    config: LiveFeedConfig,
}

impl LiveDataProvider {
    pub fn new(stream: Arc<dyn PriceStream>, config: LiveFeedConfig) -> Self {
        Self {
            core: ProviderCore::new(format!("live:{}", stream.name())),
            stream,
            config,
        }
    }

    async fn pump(&self) -> Option<TradingError> {
        let subscribe = timeout(
            self.config.subscribe_timeout,
            self.stream.stream_prices(&self.config.instruments),
        );
        let mut rx = match subscribe.await {
            Ok(Ok(rx)) => rx,
            Ok(Err(e)) => return Some(DataError::Stream(e).into()),
            Err(_) => return Some(DataError::Timeout(self.config.subscribe_timeout.as_millis() as u64).into()),
        };
        info!(provider = %self.core.name(), instruments = ?self.config.instruments, "Subscribed to prices");

        loop {
            if !self.core.should_continue() {
                return None;
            }
            let message = tokio::select! {
                _ = self.core.stopped() => return None,
                message = timeout(self.config.idle_timeout, rx.recv()) => message,
            };
            let update = match message {
                Err(_) => {
                    warn!(provider = %self.core.name(), "No price received within idle timeout");
                    return Some(DataError::Timeout(self.config.idle_timeout.as_millis() as u64).into());
                }
                Ok(None) => {
                    return Some(DataError::Stream(BrokerError::StreamClosed("price stream ended".into())).into());
                }
                Ok(Some(Err(e))) => return Some(DataError::Stream(e).into()),
                Ok(Some(Ok(update))) => update,
            };
            if let Err(e) = self.core.dispatch_tick(&update.to_tick()).await {
                return Some(e);
            }
        }
    }
}

#[async_trait]
impl DataProvider for LiveDataProvider {
    async fn start(&self) {
        if !self.core.try_begin() {
            return;
        }
        let error = self.pump().await;
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
