//! Data providers: backtest replay and live streaming.

mod backtest;
mod live;

pub use backtest::BacktestDataProvider;
pub use live::{LiveDataProvider, LiveFeedConfig};

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::Notify;
use tracing::{debug, info};
use trading_core::error::TradingError;
use trading_core::traits::DataProviderListener;
use trading_core::types::{Bar, StopReason, Tick};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Running,
    Stopping,
    Finished,
}

/// What the caller of [`ProviderCore::request_stop`] must do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StopAction {
    /// The feed never started; finish it now
    FinishNow,
    /// The running feed will observe the request and finish itself
    Wait,
    /// Already stopping or finished
    Ignore,
}

struct CoreState {
    phase: Phase,
    stop_reason: Option<StopReason>,
}

/// Lifecycle and listener fan-out shared by provider implementations.
///
/// All finalisation goes through [`finish`](Self::finish), which notifies
/// listeners exactly once: `on_error` (if any) and then `on_stop`.
pub(crate) struct ProviderCore {
    name: String,
    state: Mutex<CoreState>,
    listeners: RwLock<Vec<Arc<dyn DataProviderListener>>>,
    stop_signal: Notify,
}

impl ProviderCore {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(CoreState {
                phase: Phase::Idle,
                stop_reason: None,
            }),
            listeners: RwLock::new(Vec::new()),
            stop_signal: Notify::new(),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Move from idle to running. False if the feed already ran or is running.
    pub(crate) fn try_begin(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.phase != Phase::Idle {
            debug!(provider = %self.name, "Start ignored, feed is not idle");
            return false;
        }
        state.phase = Phase::Running;
        true
    }

    /// Record the stop reason (first one wins) and signal the feed loop.
    pub(crate) fn request_stop(&self, reason: StopReason) -> StopAction {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.stop_reason.is_none() {
            state.stop_reason = Some(reason);
        }
        let action = match state.phase {
            Phase::Idle => StopAction::FinishNow,
            Phase::Running => StopAction::Wait,
            Phase::Stopping | Phase::Finished => StopAction::Ignore,
        };
        if state.phase == Phase::Running || state.phase == Phase::Idle {
            state.phase = Phase::Stopping;
        }
        drop(state);
        self.stop_signal.notify_one();
        action
    }

    /// Checked by feed loops between ticks.
    pub(crate) fn should_continue(&self) -> bool {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).phase == Phase::Running
    }

    pub(crate) fn is_running(&self) -> bool {
        self.should_continue()
    }

    /// Resolves once a stop has been requested.
    pub(crate) async fn stopped(&self) {
        self.stop_signal.notified().await
    }

    pub(crate) fn add_listener(&self, listener: Arc<dyn DataProviderListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    fn snapshot(&self) -> Vec<Arc<dyn DataProviderListener>> {
        self.listeners.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Deliver a tick to every listener; the first error aborts delivery.
    pub(crate) async fn dispatch_tick(&self, tick: &Tick) -> Result<(), TradingError> {
        for listener in self.snapshot() {
            listener.on_tick(tick).await?;
        }
        Ok(())
    }

    pub(crate) async fn dispatch_candle(&self, candle: &Bar) -> Result<(), TradingError> {
        for listener in self.snapshot() {
            listener.on_candle(candle).await?;
        }
        Ok(())
    }

    /// Single finalisation path. Later calls are no-ops.
    ///
    /// The reason is the recorded stop request if there was one, otherwise
    /// `Failed` when `error` is set, otherwise `Completed`.
    pub(crate) async fn finish(&self, error: Option<TradingError>) {
        let reason = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if state.phase == Phase::Finished {
                return;
            }
            state.phase = Phase::Finished;
            match (state.stop_reason.take(), &error) {
                (Some(requested), _) => requested,
                (None, Some(err)) => StopReason::Failed(err.to_string()),
                (None, None) => StopReason::Completed,
            }
        };

        info!(provider = %self.name, reason = %reason, "Data feed finished");
        let listeners = self.snapshot();
        if let Some(err) = &error {
            for listener in &listeners {
                listener.on_error(err).await;
            }
        }
        for listener in &listeners {
            listener.on_stop(&reason).await;
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use async_trait::async_trait;

    /// Records everything a provider tells it.
    #[derive(Default)]
    pub struct RecordingListener {
        pub ticks: Mutex<Vec<Tick>>,
        pub candles: Mutex<Vec<Bar>>,
        pub events: Mutex<Vec<String>>,
        pub fail_after: Option<usize>,
    }

    impl RecordingListener {
        pub fn failing_after(n: usize) -> Self {
            Self {
                fail_after: Some(n),
                ..Default::default()
            }
        }

        pub fn tick_count(&self) -> usize {
            self.ticks.lock().unwrap().len()
        }

        pub fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DataProviderListener for RecordingListener {
        async fn on_tick(&self, tick: &Tick) -> Result<(), TradingError> {
            let mut ticks = self.ticks.lock().unwrap();
            if self.fail_after.is_some_and(|n| ticks.len() >= n) {
                return Err(TradingError::Internal("listener refused tick".into()));
            }
            ticks.push(tick.clone());
            Ok(())
        }

        async fn on_candle(&self, candle: &Bar) -> Result<(), TradingError> {
            self.candles.lock().unwrap().push(candle.clone());
            Ok(())
        }

        async fn on_stop(&self, reason: &StopReason) {
            self.events.lock().unwrap().push(format!("stop: {}", reason));
        }

        async fn on_error(&self, error: &TradingError) {
            self.events.lock().unwrap().push(format!("error: {}", error));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::RecordingListener;
    use super::*;

    #[tokio::test]
    async fn test_finish_notifies_once_error_first() {
        let core = ProviderCore::new("test");
        let listener = Arc::new(RecordingListener::default());
        core.add_listener(listener.clone());
        assert!(core.try_begin());

        core.finish(Some(TradingError::Internal("boom".into()))).await;
        core.finish(None).await;

        let events = listener.events();
        assert_eq!(events.len(), 2);
        assert!(events[0].starts_with("error:"));
        assert!(events[1].starts_with("stop: failed"));
    }

    #[tokio::test]
    async fn test_requested_reason_wins() {
        let core = ProviderCore::new("test");
        let listener = Arc::new(RecordingListener::default());
        core.add_listener(listener.clone());
        assert!(core.try_begin());

        assert_eq!(core.request_stop(StopReason::requested("user")), StopAction::Wait);
        assert!(!core.should_continue());
        assert_eq!(core.request_stop(StopReason::requested("again")), StopAction::Ignore);
        core.finish(None).await;

        assert_eq!(listener.events(), vec!["stop: stop requested: user".to_string()]);
        assert!(!core.try_begin());
    }

    #[tokio::test]
    async fn test_stop_before_start_finishes_immediately() {
        let core = ProviderCore::new("test");
        assert_eq!(core.request_stop(StopReason::requested("early")), StopAction::FinishNow);
        core.finish(None).await;
        assert!(!core.try_begin());
    }
}
