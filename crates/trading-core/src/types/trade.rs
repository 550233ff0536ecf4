//! Trades and their lifecycle.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn opposite(&self) -> Self {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }

    /// +1 for long, -1 for short.
    pub fn sign(&self) -> Decimal {
        match self {
            Direction::Long => Decimal::ONE,
            Direction::Short => Decimal::NEGATIVE_ONE,
        }
    }

    pub fn is_long(&self) -> bool {
        matches!(self, Direction::Long)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

/// Trade identifier. Simulated runs use a per-run sequence, live runs the
/// broker's id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradeId(pub String);

impl TradeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TradeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Why a trade was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// Closed by the strategy
    Manual,
    StopLoss,
    TakeProfit,
    /// Liquidated after a risk limit was breached
    RiskViolation,
    /// Liquidated when the run stopped
    EndOfRun,
    /// Closed at the broker outside this process
    External,
}

/// A position opened by a trade manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub instrument: String,
    pub direction: Direction,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub open_time: DateTime<Utc>,
    pub close_price: Option<Decimal>,
    pub close_time: Option<DateTime<Utc>>,
    /// Realized profit, zero while open
    pub profit: Decimal,
    pub close_reason: Option<CloseReason>,
}

impl Trade {
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        id: TradeId,
        instrument: impl Into<String>,
        direction: Direction,
        quantity: Decimal,
        entry_price: Decimal,
        stop_loss: Option<Decimal>,
        take_profit: Option<Decimal>,
        open_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            instrument: instrument.into(),
            direction,
            quantity,
            entry_price,
            stop_loss,
            take_profit,
            open_time,
            close_price: None,
            close_time: None,
            profit: Decimal::ZERO,
            close_reason: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.close_time.is_none()
    }

    /// Signed profit of the position if it were closed at `price`.
    pub fn profit_at(&self, price: Decimal) -> Decimal {
        (price - self.entry_price) * self.quantity * self.direction.sign()
    }

    /// Which protective level, if any, `price` has crossed.
    ///
    /// The stop is checked first, so a price satisfying both reports a stop.
    pub fn triggered_exit(&self, price: Decimal) -> Option<CloseReason> {
        let stop_hit = self.stop_loss.is_some_and(|sl| match self.direction {
            Direction::Long => price <= sl,
            Direction::Short => price >= sl,
        });
        if stop_hit {
            return Some(CloseReason::StopLoss);
        }
        let target_hit = self.take_profit.is_some_and(|tp| match self.direction {
            Direction::Long => price >= tp,
            Direction::Short => price <= tp,
        });
        target_hit.then_some(CloseReason::TakeProfit)
    }

    /// Set close price, time and profit together. Returns the realized profit.
    ///
    /// A closed trade is never closed again; the second call returns `None`
    /// and leaves the trade untouched.
    pub fn close(&mut self, price: Decimal, time: DateTime<Utc>, reason: CloseReason) -> Option<Decimal> {
        if !self.is_open() {
            return None;
        }
        let profit = self.profit_at(price);
        self.close_price = Some(price);
        self.close_time = Some(time);
        self.profit = profit;
        self.close_reason = Some(reason);
        Some(profit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn long_trade() -> Trade {
        Trade::open(
            TradeId::from("1"),
            "EUR_USD",
            Direction::Long,
            dec!(10),
            dec!(100),
            Some(dec!(95)),
            Some(dec!(110)),
            Utc.timestamp_millis_opt(0).unwrap(),
        )
    }

    #[test]
    fn test_profit_sign_follows_direction() {
        let mut trade = long_trade();
        assert_eq!(trade.profit_at(dec!(94)), dec!(-60));
        trade.direction = Direction::Short;
        assert_eq!(trade.profit_at(dec!(94)), dec!(60));
    }

    #[test]
    fn test_triggered_exit() {
        let trade = long_trade();
        assert_eq!(trade.triggered_exit(dec!(100)), None);
        assert_eq!(trade.triggered_exit(dec!(95)), Some(CloseReason::StopLoss));
        assert_eq!(trade.triggered_exit(dec!(111)), Some(CloseReason::TakeProfit));

        let mut short = long_trade();
        short.direction = Direction::Short;
        short.stop_loss = Some(dec!(105));
        short.take_profit = Some(dec!(90));
        assert_eq!(short.triggered_exit(dec!(106)), Some(CloseReason::StopLoss));
        assert_eq!(short.triggered_exit(dec!(89)), Some(CloseReason::TakeProfit));
    }

    #[test]
    fn test_close_happens_once() {
        let mut trade = long_trade();
        let t1 = Utc.timestamp_millis_opt(1_000).unwrap();
        assert_eq!(trade.close(dec!(94), t1, CloseReason::StopLoss), Some(dec!(-60)));
        assert!(!trade.is_open());

        let t2 = Utc.timestamp_millis_opt(2_000).unwrap();
        assert_eq!(trade.close(dec!(120), t2, CloseReason::Manual), None);
        assert_eq!(trade.close_price, Some(dec!(94)));
        assert_eq!(trade.close_time, Some(t1));
        assert_eq!(trade.profit, dec!(-60));
    }
}
