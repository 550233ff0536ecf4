//! Events published by a strategy run.
//!
//! The serialized form is a flat JSON object with a stable `type`
//! discriminator:
//!
//! ```json
//! {"id":"…","strategy_id":"s-1","timestamp":"…","type":"trade","action":"opened","trade":{…}}
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TradingError;
use crate::types::{Account, Bar, StopReason, Trade, TradeStatistics};

/// Lifecycle step reported by a trade event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeAction {
    Opened,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Type-specific part of an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    Bar { bar: Bar },
    Trade { action: TradeAction, trade: Trade },
    Indicator { name: String, value: Decimal },
    Account { account: Account },
    Log { level: LogLevel, message: String },
    Error { kind: String, message: String },
    StrategyStop { reason: StopReason },
    Analysis { statistics: TradeStatistics },
}

impl EventPayload {
    /// The serialized `type` tag.
    pub fn type_tag(&self) -> &'static str {
        match self {
            EventPayload::Bar { .. } => "bar",
            EventPayload::Trade { .. } => "trade",
            EventPayload::Indicator { .. } => "indicator",
            EventPayload::Account { .. } => "account",
            EventPayload::Log { .. } => "log",
            EventPayload::Error { .. } => "error",
            EventPayload::StrategyStop { .. } => "strategy_stop",
            EventPayload::Analysis { .. } => "analysis",
        }
    }
}

/// An immutable event tagged with the run that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub strategy_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    pub fn new(strategy_id: impl Into<String>, timestamp: DateTime<Utc>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            strategy_id: strategy_id.into(),
            timestamp,
            payload,
        }
    }

    pub fn bar(strategy_id: &str, bar: &Bar) -> Self {
        Self::new(strategy_id, bar.close_time, EventPayload::Bar { bar: bar.clone() })
    }

    pub fn trade(strategy_id: &str, action: TradeAction, trade: &Trade, timestamp: DateTime<Utc>) -> Self {
        Self::new(
            strategy_id,
            timestamp,
            EventPayload::Trade {
                action,
                trade: trade.clone(),
            },
        )
    }

    pub fn account(strategy_id: &str, account: &Account, timestamp: DateTime<Utc>) -> Self {
        Self::new(strategy_id, timestamp, EventPayload::Account { account: account.clone() })
    }

    pub fn log(strategy_id: &str, level: LogLevel, message: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(
            strategy_id,
            timestamp,
            EventPayload::Log {
                level,
                message: message.into(),
            },
        )
    }

    pub fn error(strategy_id: &str, error: &TradingError, timestamp: DateTime<Utc>) -> Self {
        Self::new(
            strategy_id,
            timestamp,
            EventPayload::Error {
                kind: error.kind().to_string(),
                message: error.to_string(),
            },
        )
    }

    pub fn strategy_stop(strategy_id: &str, reason: StopReason, timestamp: DateTime<Utc>) -> Self {
        Self::new(strategy_id, timestamp, EventPayload::StrategyStop { reason })
    }

    pub fn type_tag(&self) -> &'static str {
        self.payload.type_tag()
    }

    /// Terminal events end a run's event stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self.payload, EventPayload::StrategyStop { .. })
    }

    /// Events a queue must never shed: the failure report, the final
    /// statistics and the stop itself.
    pub fn is_essential(&self) -> bool {
        matches!(
            self.payload,
            EventPayload::Error { .. } | EventPayload::Analysis { .. } | EventPayload::StrategyStop { .. }
        )
    }
}
