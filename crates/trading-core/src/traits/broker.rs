//! Broker trait definition.

use crate::error::BrokerError;
use crate::types::{Direction, TradeId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Account snapshot as reported by the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerAccount {
    pub id: String,
    pub balance: Decimal,
    pub unrealized_pl: Decimal,
}

/// A trade open at the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerTrade {
    pub id: TradeId,
    pub instrument: String,
    pub direction: Direction,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub open_time: DateTime<Utc>,
}

/// Parameters of a market order that opens a trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerTradeParams {
    pub instrument: String,
    pub direction: Direction,
    pub quantity: Decimal,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
}

/// Fill report for a closed trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerClose {
    pub trade_id: TradeId,
    pub close_price: Decimal,
    pub profit: Decimal,
    pub close_time: DateTime<Utc>,
}

/// Trait for live broker integrations.
///
/// Every call may fail or hang; callers bound them with a timeout.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn get_account_info(&self) -> Result<BrokerAccount, BrokerError>;

    async fn get_open_trades(&self) -> Result<Vec<BrokerTrade>, BrokerError>;

    async fn open_trade(&self, params: BrokerTradeParams) -> Result<BrokerTrade, BrokerError>;

    async fn close_trade(&self, trade_id: &TradeId) -> Result<BrokerClose, BrokerError>;

    fn name(&self) -> &str;
}
