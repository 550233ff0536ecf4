//! Setup shared by the replay commands.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use trading_config::{AppConfig, EventDeliveryMode};
use trading_core::events::{Event, EventPayload, LogLevel};
use trading_core::traits::{CandleSource, EventListener, EventPublisher, ListenerError};
use trading_data::{CachedCandleSource, CsvCandleSource};
use trading_engine::BacktestSpec;
use trading_monitor::{AsyncEventPublisher, SyncEventPublisher};

use crate::cli::ReplayArgs;

pub fn parse_params(raw: Option<&str>) -> Result<Value> {
    match raw {
        Some(raw) => serde_json::from_str(raw).context("--params is not valid JSON"),
        None => Ok(Value::Null),
    }
}

pub fn candle_source(config: &AppConfig, args: &ReplayArgs) -> Result<Arc<dyn CandleSource>> {
    let path: PathBuf = args
        .data
        .clone()
        .or_else(|| config.run.data_file.as_ref().map(PathBuf::from))
        .context("no candle file: pass --data or set run.data_file")?;
    let source = CsvCandleSource::new(&path).with_context(|| format!("cannot open candle file {}", path.display()))?;
    Ok(Arc::new(CachedCandleSource::new(source)))
}

pub fn backtest_spec(config: &AppConfig, args: &ReplayArgs, id: String) -> Result<BacktestSpec> {
    let run = &config.run;
    let from = args.from.or(run.from).unwrap_or(DateTime::<Utc>::MIN_UTC);
    let to = args.to.or(run.to).unwrap_or(DateTime::<Utc>::MAX_UTC);
    anyhow::ensure!(from < to, "replay range is empty: {} .. {}", from, to);

    let mut spec = BacktestSpec::new(id, run.instrument(), run.period, from, to);
    spec.initial_balance = run.initial_balance;
    spec.spread = run.spread();
    spec.density = run.tick_density();
    spec.seed = args.seed.unwrap_or(run.seed);
    spec.risk = config.risk.risk_profile()?;
    spec.risk_free_rate = config.analysis.risk_free_rate;
    spec.window_capacity = run.window_capacity;
    spec.close_on_stop = run.close_on_stop;
    Ok(spec)
}

/// Event publisher picked by `events.mode`.
pub struct Publisher {
    shared: Arc<dyn EventPublisher>,
    queued: Option<Arc<AsyncEventPublisher>>,
}

impl Publisher {
    pub fn from_config(config: &AppConfig) -> Self {
        let events = &config.events;
        let publisher = match events.mode {
            EventDeliveryMode::Sync => Self {
                shared: Arc::new(SyncEventPublisher::new()),
                queued: None,
            },
            EventDeliveryMode::Async => {
                let queued = Arc::new(AsyncEventPublisher::new(events.queue_capacity, events.batch_size));
                Self {
                    shared: queued.clone(),
                    queued: Some(queued),
                }
            }
        };
        publisher.shared.add_listener(Arc::new(EventLogger));
        publisher
    }

    pub fn shared(&self) -> Arc<dyn EventPublisher> {
        self.shared.clone()
    }

    /// Wait until queued events have been delivered.
    pub async fn flush(&self) {
        if let Some(queued) = &self.queued {
            queued.drained().await;
            if queued.dropped() > 0 {
                warn!(dropped = queued.dropped(), "Events were dropped, raise events.queue_capacity");
            }
        }
    }
}

/// Mirrors run events into the log.
struct EventLogger;

impl EventListener for EventLogger {
    fn on_event(&self, event: &Event) -> Result<(), ListenerError> {
        let id = &event.strategy_id;
        match &event.payload {
            EventPayload::Trade { action, trade } => info!(
                strategy_id = %id,
                trade_id = %trade.id,
                action = ?action,
                direction = %trade.direction,
                quantity = %trade.quantity,
                profit = %trade.profit,
                "Trade"
            ),
            EventPayload::Log { level, message } => match level {
                LogLevel::Debug => debug!(strategy_id = %id, "{}", message),
                LogLevel::Info => info!(strategy_id = %id, "{}", message),
                LogLevel::Warn => warn!(strategy_id = %id, "{}", message),
                LogLevel::Error => error!(strategy_id = %id, "{}", message),
            },
            EventPayload::Error { kind, message } => error!(strategy_id = %id, kind = %kind, "{}", message),
            EventPayload::StrategyStop { reason } => info!(strategy_id = %id, reason = %reason, "Run stopped"),
            EventPayload::Bar { .. }
            | EventPayload::Indicator { .. }
            | EventPayload::Account { .. }
            | EventPayload::Analysis { .. } => {}
        }
        Ok(())
    }
}
