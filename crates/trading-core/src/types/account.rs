//! Account state.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Balance and equity of a trading account.
///
/// `equity == balance + open_position_value` holds after every mutation made
/// through [`Account::realize`] and [`Account::mark`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub initial_balance: Decimal,
    /// Realized balance
    pub balance: Decimal,
    /// Balance plus unrealized profit of open trades
    pub equity: Decimal,
    /// Signed unrealized profit of open trades
    pub open_position_value: Decimal,
}

impl Account {
    pub fn new(id: impl Into<String>, initial_balance: Decimal) -> Self {
        Self {
            id: id.into(),
            initial_balance,
            balance: initial_balance,
            equity: initial_balance,
            open_position_value: Decimal::ZERO,
        }
    }

    /// Add realized profit to the balance.
    pub fn realize(&mut self, profit: Decimal) {
        self.balance += profit;
        self.equity = self.balance + self.open_position_value;
    }

    /// Replace the unrealized value of open positions.
    pub fn mark(&mut self, open_position_value: Decimal) {
        self.open_position_value = open_position_value;
        self.equity = self.balance + open_position_value;
    }

    /// Profit relative to the starting balance, using equity.
    pub fn net_change(&self) -> Decimal {
        self.equity - self.initial_balance
    }
}

/// Equity captured at the start of a broker trading day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyEquity {
    pub account_id: String,
    pub equity: Decimal,
    /// Start of the trading day this snapshot belongs to
    pub day_start: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_equity_identity() {
        let mut account = Account::new("sim", dec!(10000));
        account.mark(dec!(-25));
        assert_eq!(account.equity, dec!(9975));
        account.realize(dec!(100));
        assert_eq!(account.balance, dec!(10100));
        assert_eq!(account.equity, account.balance + account.open_position_value);
        assert_eq!(account.net_change(), dec!(75));
    }
}
