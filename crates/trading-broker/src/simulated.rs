//! Simulated trade manager for backtests.

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use tracing::{debug, info};
use trading_core::error::TradeError;
use trading_core::traits::{CloseAllOutcome, PositionSizing, TradeManager};
use trading_core::types::{Account, Bar, CloseReason, Direction, Instrument, Tick, Trade, TradeId};
use trading_risk::PositionSizer;

/// Fills every request at the last recorded quote.
///
/// Entries fill at the ask (long) or bid (short); exits at the bid (long) or
/// ask (short). Trade ids are sequential per instance, so identical runs
/// produce identical ids.
pub struct SimulatedTradeManager {
    account: Account,
    open: Vec<Trade>,
    closed: Vec<Trade>,
    quotes: HashMap<String, Tick>,
    sizer: PositionSizer,
    next_id: u64,
}

impl SimulatedTradeManager {
    pub fn new(account_id: impl Into<String>, initial_balance: Decimal) -> Self {
        Self {
            account: Account::new(account_id, initial_balance),
            open: Vec::new(),
            closed: Vec::new(),
            quotes: HashMap::new(),
            sizer: PositionSizer::new(),
            next_id: 1,
        }
    }

    pub fn with_sizer(mut self, sizer: PositionSizer) -> Self {
        self.sizer = sizer;
        self
    }

    fn quote(&self, instrument: &str) -> Result<&Tick, TradeError> {
        self.quotes
            .get(instrument)
            .ok_or_else(|| TradeError::PriceUnavailable(instrument.to_string()))
    }

    /// Close the open trade at `index`, realizing its profit in the same step.
    fn close_at(&mut self, index: usize, price: Decimal, time: chrono::DateTime<chrono::Utc>, reason: CloseReason) -> Trade {
        let mut trade = self.open.remove(index);
        if let Some(profit) = trade.close(price, time, reason) {
            self.account.realize(profit);
        }
        info!(
            trade_id = %trade.id,
            direction = %trade.direction,
            price = %price,
            profit = %trade.profit,
            reason = ?reason,
            "Trade closed"
        );
        self.closed.push(trade.clone());
        trade
    }

    /// Recompute open-position value from the latest quotes.
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

#[async_trait]
impl TradeManager for SimulatedTradeManager {
    async fn open_position(
        &mut self,
        instrument: &Instrument,
        direction: Direction,
        sizing: &PositionSizing,
    ) -> Result<Trade, TradeError> {
        let tick = self.quote(&instrument.symbol)?;
        let entry_price = tick.entry_price(direction);
        let open_time = tick.timestamp;
        let sized = self
            .sizer
            .size(instrument, &self.account, direction, entry_price, sizing)?;

        let trade = Trade::open(
            TradeId::new(self.next_id.to_string()),
            instrument.symbol.clone(),
            direction,
            sized.quantity,
            entry_price,
            sized.stop_loss,
            sized.take_profit,
            open_time,
        );
        self.next_id += 1;
        info!(
            trade_id = %trade.id,
            instrument = %trade.instrument,
            direction = %direction,
            quantity = %trade.quantity,
            price = %entry_price,
            "Trade opened"
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
        let tick = self.quote(&self.open[index].instrument)?;
        let price = tick.exit_price(self.open[index].direction);
        let time = tick.timestamp;

        let trade = self.close_at(index, price, time, CloseReason::Manual);
        self.remark();
        Ok(trade)
    }

    async fn on_tick(&mut self, tick: &Tick) -> Result<Vec<Trade>, TradeError> {
        self.quotes.insert(tick.instrument.clone(), tick.clone());

        let mut closed = Vec::new();
        let mut index = 0;
        while index < self.open.len() {
            let trade = &self.open[index];
            if trade.instrument == tick.instrument {
                let price = tick.exit_price(trade.direction);
                if let Some(reason) = trade.triggered_exit(price) {
                    closed.push(self.close_at(index, price, tick.timestamp, reason));
                    continue;
                }
            }
            index += 1;
        }

        self.remark();
        Ok(closed)
    }

    async fn update_on_bar(&mut self, bar: &Bar, spread: Decimal) -> Result<Vec<Trade>, TradeError> {
        let half = spread / dec!(2);
        let mut closed = Vec::new();
        let mut index = 0;
        while index < self.open.len() {
            let trade = &self.open[index];
            if trade.instrument != bar.instrument {
                index += 1;
                continue;
            }

            // Bid-side extremes for longs, ask-side for shorts
            let (adverse, favourable) = match trade.direction {
                Direction::Long => (bar.low - half, bar.high - half),
                Direction::Short => (bar.high + half, bar.low + half),
            };
            let exit = match trade.triggered_exit(adverse) {
                Some(CloseReason::StopLoss) => Some((adverse, CloseReason::StopLoss)),
                _ => trade.triggered_exit(favourable).map(|reason| (favourable, reason)),
            };

            match exit {
                Some((price, reason)) => {
                    debug!(trade_id = %trade.id, bar = %bar.open_time, "Bar-level exit");
                    closed.push(self.close_at(index, price, bar.close_time, reason));
                }
                None => index += 1,
            }
        }

        self.remark();
        Ok(closed)
    }

    async fn close_all(&mut self, reason: CloseReason) -> CloseAllOutcome {
        let mut outcome = CloseAllOutcome::default();
        let mut index = 0;
        while index < self.open.len() {
            let trade = &self.open[index];
            match self.quote(&trade.instrument) {
                Ok(tick) => {
                    let price = tick.exit_price(trade.direction);
                    let time = tick.timestamp;
                    outcome.closed.push(self.close_at(index, price, time, reason));
                }
                Err(e) => {
                    outcome.failures.push((trade.id.clone(), e));
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use proptest::prelude::*;
    use trading_core::types::Timeframe;

    fn instrument() -> Instrument {
        Instrument::new("TEST", dec!(0.01), 2, 0)
    }

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn tick(mid: Decimal, minute: i64) -> Tick {
        Tick::from_mid("TEST", mid, Decimal::ZERO, at(minute))
    }

    fn scenario_b_sizing() -> PositionSizing {
        PositionSizing::Fixed {
            quantity: dec!(10),
            stop_loss: Some(dec!(95)),
            take_profit: Some(dec!(110)),
        }
    }

    #[tokio::test]
    async fn test_stop_loss_on_tick_closes_at_bid() {
        let mut manager = SimulatedTradeManager::new("sim", dec!(10000));
        manager.on_tick(&tick(dec!(100), 0)).await.unwrap();
        manager
            .open_position(&instrument(), Direction::Long, &scenario_b_sizing())
            .await
            .unwrap();

        let closed = manager.on_tick(&tick(dec!(94), 1)).await.unwrap();

        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].close_price, Some(dec!(94)));
        assert_eq!(closed[0].close_reason, Some(CloseReason::StopLoss));
        assert_eq!(closed[0].profit, dec!(-60));
        assert_eq!(manager.account().balance, dec!(9940));
        assert_eq!(manager.account().equity, dec!(9940));
        assert!(manager.open_trades().is_empty());
    }

    #[tokio::test]
    async fn test_bar_level_stop_uses_low() {
        let mut manager = SimulatedTradeManager::new("sim", dec!(10000));
        manager.on_tick(&tick(dec!(100), 0)).await.unwrap();
        manager
            .open_position(&instrument(), Direction::Long, &scenario_b_sizing())
            .await
            .unwrap();

        // Touches both levels: the stop wins
        let bar = Bar::new("TEST", Timeframe::Hour1, at(0), dec!(100), dec!(111), dec!(94), dec!(100), dec!(1));
        let closed = manager.update_on_bar(&bar, Decimal::ZERO).await.unwrap();

        assert_eq!(closed[0].close_price, Some(dec!(94)));
        assert_eq!(closed[0].close_time, Some(bar.close_time));
        assert_eq!(manager.account().balance, dec!(9940));
    }

    #[tokio::test]
    async fn test_short_take_profit_uses_ask() {
        let mut manager = SimulatedTradeManager::new("sim", dec!(10000));
        manager
            .on_tick(&Tick::from_mid("TEST", dec!(100), dec!(0.2), at(0)))
            .await
            .unwrap();
        let trade = manager
            .open_position(
                &instrument(),
                Direction::Short,
                &PositionSizing::Fixed {
                    quantity: dec!(5),
                    stop_loss: None,
                    take_profit: Some(dec!(98)),
                },
            )
            .await
            .unwrap();
        assert_eq!(trade.entry_price, dec!(99.9));

        // Ask 98.1 has not reached the target yet
        assert!(manager
            .on_tick(&Tick::from_mid("TEST", dec!(98), dec!(0.2), at(1)))
            .await
            .unwrap()
            .is_empty());
        let closed = manager
            .on_tick(&Tick::from_mid("TEST", dec!(97.8), dec!(0.2), at(2)))
            .await
            .unwrap();
        assert_eq!(closed[0].close_price, Some(dec!(97.9)));
        assert_eq!(closed[0].profit, dec!(10));
    }

    #[tokio::test]
    async fn test_errors_for_missing_quote_and_unknown_trade() {
        let mut manager = SimulatedTradeManager::new("sim", dec!(10000));
        let err = manager
            .open_position(&instrument(), Direction::Long, &PositionSizing::fixed(dec!(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, TradeError::PriceUnavailable(_)));

        manager.on_tick(&tick(dec!(100), 0)).await.unwrap();
        let trade = manager
            .open_position(&instrument(), Direction::Long, &PositionSizing::fixed(dec!(1)))
            .await
            .unwrap();
        manager.close_position(&trade.id).await.unwrap();

        let err = manager.close_position(&trade.id).await.unwrap_err();
        assert!(matches!(err, TradeError::TradeNotFound(_)));
        assert_eq!(manager.closed_trades().len(), 1);
    }

    #[tokio::test]
    async fn test_equity_tracks_open_value() {
        let mut manager = SimulatedTradeManager::new("sim", dec!(10000));
        manager
            .on_tick(&Tick::from_mid("TEST", dec!(100), dec!(0.2), at(0)))
            .await
            .unwrap();
        manager
            .open_position(&instrument(), Direction::Long, &PositionSizing::fixed(dec!(10)))
            .await
            .unwrap();

        manager
            .on_tick(&Tick::from_mid("TEST", dec!(102), dec!(0.2), at(1)))
            .await
            .unwrap();
        let account = manager.account();
        // Entry at ask 100.1, marked at bid 101.9
        assert_eq!(account.open_position_value, dec!(18));
        assert_eq!(account.equity, account.balance + account.open_position_value);
    }

    #[tokio::test]
    async fn test_close_all_reports_each_trade() {
        let mut manager = SimulatedTradeManager::new("sim", dec!(10000));
        manager.on_tick(&tick(dec!(100), 0)).await.unwrap();
        for direction in [Direction::Long, Direction::Short] {
            manager
                .open_position(&instrument(), direction, &PositionSizing::fixed(dec!(1)))
                .await
                .unwrap();
        }
        manager.on_tick(&tick(dec!(101), 1)).await.unwrap();

        let outcome = manager.close_all(CloseReason::EndOfRun).await;
        assert!(outcome.is_complete());
        assert_eq!(outcome.closed.len(), 2);
        assert_eq!(manager.account().balance, dec!(10000));
        assert!(manager
            .closed_trades()
            .iter()
            .all(|t| t.close_reason == Some(CloseReason::EndOfRun)));
    }

    #[tokio::test]
    async fn test_risk_based_sizing_from_quote() {
        let mut manager = SimulatedTradeManager::new("sim", dec!(10000));
        manager.on_tick(&tick(dec!(100), 0)).await.unwrap();
        let trade = manager
            .open_position(&instrument(), Direction::Long, &PositionSizing::risk_based(dec!(1), dec!(3)))
            .await
            .unwrap();
        // 10000 * 1% / 3 = 33.33 -> 33 whole units
        assert_eq!(trade.quantity, dec!(33));
        assert_eq!(trade.stop_loss, Some(dec!(97)));
    }

    proptest! {
        #[test]
        fn prop_balance_conserves_realized_profit(
            steps in proptest::collection::vec((50i64..150, any::<bool>(), 1i64..20), 1..40)
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            runtime.block_on(async {
                let mut manager = SimulatedTradeManager::new("sim", dec!(10000));
                for (i, (price, long, qty)) in steps.iter().enumerate() {
                    manager.on_tick(&tick(Decimal::from(*price), i as i64)).await.unwrap();
                    let direction = if *long { Direction::Long } else { Direction::Short };
                    if i % 3 == 2 {
                        let id = manager.open_trades().first().map(|t| t.id.clone());
                        if let Some(id) = id {
                            manager.close_position(&id).await.unwrap();
                        }
                    } else {
                        manager
                            .open_position(&instrument(), direction, &PositionSizing::fixed(Decimal::from(*qty)))
                            .await
                            .unwrap();
                    }
                    let account = manager.account();
                    prop_assert_eq!(account.equity, account.balance + account.open_position_value);
                }
                manager.close_all(CloseReason::EndOfRun).await;

                let realized: Decimal = manager.closed_trades().iter().map(|t| t.profit).sum();
                prop_assert!(manager.open_trades().is_empty());
                prop_assert_eq!(manager.account().balance, dec!(10000) + realized);
                Ok(())
            })?;
        }
    }
}
