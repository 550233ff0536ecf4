//! Trade manager backed by a live broker.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};
use trading_core::error::{BrokerError, TradeError};
use trading_core::traits::{Broker, BrokerTrade, BrokerTradeParams, CloseAllOutcome, PositionSizing, TradeManager};
use trading_core::types::{Account, Bar, CloseReason, Direction, Instrument, Tick, Trade, TradeId};
use trading_risk::PositionSizer;

/// Mirrors broker state locally and routes every mutation through the
/// [`Broker`] collaborator. Each broker call is bounded by `request_timeout`.
pub struct LiveTradeManager {
    broker: Arc<dyn Broker>,
    request_timeout: Duration,
    account: Account,
    open: Vec<Trade>,
    closed: Vec<Trade>,
    quotes: HashMap<String, Tick>,
    sizer: PositionSizer,
}

impl LiveTradeManager {
    /// Fetch the account and open trades and build the local mirror.
    pub async fn connect(broker: Arc<dyn Broker>, request_timeout: Duration) -> Result<Self, BrokerError> {
        let info = bounded(request_timeout, broker.get_account_info()).await?;
        let mut manager = Self {
            account: Account::new(info.id.clone(), info.balance),
            broker,
            request_timeout,
            open: Vec::new(),
            closed: Vec::new(),
            quotes: HashMap::new(),
            sizer: PositionSizer::new(),
        };
        manager.sync().await?;
        info!(
            broker = %manager.broker.name(),
            account = %manager.account.id,
            balance = %manager.account.balance,
            open_trades = manager.open.len(),
            "Connected to broker"
        );
        Ok(manager)
    }

    pub fn with_sizer(mut self, sizer: PositionSizer) -> Self {
        self.sizer = sizer;
        self
    }

    /// Refresh balance and open trades from the broker.
    ///
    /// Trades the broker no longer reports were closed outside this process;
    /// they move to the closed list with [`CloseReason::External`].
    pub async fn sync(&mut self) -> Result<(), BrokerError> {
        let info = bounded(self.request_timeout, self.broker.get_account_info()).await?;
        let remote = bounded(self.request_timeout, self.broker.get_open_trades()).await?;

        let mut still_open = Vec::with_capacity(remote.len());
        for trade in std::mem::take(&mut self.open) {
            if remote.iter().any(|r| r.id == trade.id) {
                still_open.push(trade);
            } else {
                self.close_externally(trade);
            }
        }
        for r in &remote {
            if !still_open.iter().any(|t| t.id == r.id) {
                still_open.push(to_trade(r));
            }
        }
        self.open = still_open;

        self.account.balance = info.balance;
        self.account.mark(info.unrealized_pl);
        Ok(())
    }

    fn close_externally(&mut self, mut trade: Trade) {
        let (price, time) = match self.quotes.get(&trade.instrument) {
            Some(q) => (q.exit_price(trade.direction), q.timestamp),
            None => (trade.entry_price, chrono::Utc::now()),
        };
        trade.close(price, time, CloseReason::External);
        warn!(trade_id = %trade.id, "Trade closed at broker outside this process");
        self.closed.push(trade);
    }

    async fn close_remote(&mut self, index: usize, reason: CloseReason) -> Result<Trade, TradeError> {
        let trade_id = self.open[index].id.clone();
        let fill = bounded(self.request_timeout, self.broker.close_trade(&trade_id)).await?;

        let mut trade = self.open.remove(index);
        trade.close(fill.close_price, fill.close_time, reason);
        // The broker's figure includes financing and commission
        trade.profit = fill.profit;
        self.account.realize(fill.profit);
        info!(trade_id = %trade.id, price = %fill.close_price, profit = %fill.profit, "Trade closed");
        self.closed.push(trade.clone());
        Ok(trade)
    }

    fn remark(&mut self) {
        let value: Decimal = self
            .open
            .iter()
            .filter_map(|trade| {
                self.quotes
                    .get(&trade.instrument)
                    .map(|q| trade.profit_at(q.exit_price(trade.direction)))
            })
            .sum();
        self.account.mark(value);
    }
}

async fn bounded<T>(limit: Duration, call: impl Future<Output = Result<T, BrokerError>>) -> Result<T, BrokerError> {
    timeout(limit, call)
        .await
        .map_err(|_| BrokerError::Timeout(limit.as_millis() as u64))?
}

fn to_trade(remote: &BrokerTrade) -> Trade {
    Trade::open(
        remote.id.clone(),
        remote.instrument.clone(),
        remote.direction,
        remote.quantity,
        remote.entry_price,
        remote.stop_loss,
        remote.take_profit,
        remote.open_time,
    )
}

#[async_trait]
impl TradeManager for LiveTradeManager {
    async fn open_position(
        &mut self,
        instrument: &Instrument,
        direction: Direction,
        sizing: &PositionSizing,
    ) -> Result<Trade, TradeError> {
        let tick = self
            .quotes
            .get(&instrument.symbol)
            .ok_or_else(|| TradeError::PriceUnavailable(instrument.symbol.clone()))?;
        let sized = self
            .sizer
            .size(instrument, &self.account, direction, tick.entry_price(direction), sizing)?;

        let params = BrokerTradeParams {
            instrument: instrument.symbol.clone(),
            direction,
            quantity: sized.quantity,
            stop_loss: sized.stop_loss,
            take_profit: sized.take_profit,
        };
        let remote = bounded(self.request_timeout, self.broker.open_trade(params)).await?;
        let trade = to_trade(&remote);
        info!(
            trade_id = %trade.id,
            instrument = %trade.instrument,
            direction = %direction,
            quantity = %trade.quantity,
            price = %trade.entry_price,
            "Trade opened at broker"
        );
        self.open.push(trade.clone());
        self.remark();
        Ok(trade)
    }

    async fn close_position(&mut self, trade_id: &TradeId) -> Result<Trade, TradeError> {
        let index = self
            .open
            .iter()
            .position(|t| &t.id == trade_id)
            .ok_or_else(|| TradeError::TradeNotFound(trade_id.to_string()))?;
        let trade = self.close_remote(index, CloseReason::Manual).await?;
        self.remark();
        Ok(trade)
    }

    /// Server-side stops normally close first; a trade the broker no longer
    /// knows is recorded as closed externally.
    async fn on_tick(&mut self, tick: &Tick) -> Result<Vec<Trade>, TradeError> {
        self.quotes.insert(tick.instrument.clone(), tick.clone());

        let mut closed = Vec::new();
        let mut index = 0;
        while index < self.open.len() {
            let trade = &self.open[index];
            let reason = (trade.instrument == tick.instrument)
                .then(|| trade.triggered_exit(tick.exit_price(trade.direction)))
                .flatten();
            let Some(reason) = reason else {
                index += 1;
                continue;
            };

            match self.close_remote(index, reason).await {
                Ok(trade) => closed.push(trade),
                Err(TradeError::Broker(BrokerError::TradeNotFound(_))) => {
                    let trade = self.open.remove(index);
                    self.close_externally(trade);
                }
                Err(e) => {
                    self.remark();
                    return Err(e);
                }
            }
        }

        self.remark();
        Ok(closed)
    }

    /// Live runs see every tick, so there is nothing to evaluate per bar.
    async fn update_on_bar(&mut self, _bar: &Bar, _spread: Decimal) -> Result<Vec<Trade>, TradeError> {
        Ok(Vec::new())
    }

    async fn close_all(&mut self, reason: CloseReason) -> CloseAllOutcome {
        let mut outcome = CloseAllOutcome::default();
        let mut index = 0;
        while index < self.open.len() {
            let trade_id = self.open[index].id.clone();
            match self.close_remote(index, reason).await {
                Ok(trade) => outcome.closed.push(trade),
                Err(e) => {
                    warn!(trade_id = %trade_id, error = %e, "Failed to close trade");
                    outcome.failures.push((trade_id, e));
                    index += 1;
                }
            }
        }
        self.remark();
        outcome
    }

    fn account(&self) -> &Account {
        &self.account
    }

    fn open_trades(&self) -> &[Trade] {
        &self.open
    }

    fn closed_trades(&self) -> &[Trade] {
        &self.closed
    }

    fn last_tick(&self, instrument: &str) -> Option<&Tick> {
        self.quotes.get(instrument)
    }
}
