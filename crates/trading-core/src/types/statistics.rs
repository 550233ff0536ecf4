//! Finalised performance statistics carried by analysis events.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Statistics over the closed trades and equity curve of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeStatistics {
    pub initial_balance: Decimal,
    pub final_balance: Decimal,
    pub total_return_pct: Decimal,

    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,

    pub gross_profit: Decimal,
    /// Sum of non-positive profits (zero or negative)
    pub gross_loss: Decimal,
    pub total_net_profit: Decimal,
    pub profit_factor: Decimal,
    pub expected_payoff: Decimal,

    pub long_trades: usize,
    pub short_trades: usize,
    pub long_win_rate_pct: Decimal,
    pub short_win_rate_pct: Decimal,
    pub win_rate_pct: Decimal,

    pub largest_win: Decimal,
    pub largest_loss: Decimal,
    pub average_win: Decimal,
    pub average_loss: Decimal,

    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub average_consecutive_wins: Decimal,
    pub average_consecutive_losses: Decimal,

    pub sharpe_ratio: f64,
    pub max_drawdown_pct: Decimal,
    pub total_ticks: u64,
}
