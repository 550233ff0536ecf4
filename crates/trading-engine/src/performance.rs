//! Run performance statistics.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use trading_core::error::AnalysisError;
use trading_core::types::numeric::{round_to, to_f64};
use trading_core::types::{Direction, Trade, TradeStatistics};

/// One point of the per-bar equity curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: Decimal,
}

/// Tracks drawdown and the equity curve while a run is in progress and
/// computes the final statistics once it ends.
#[derive(Debug)]
pub struct PerformanceAnalyser {
    risk_free_rate: f64,
    ticks: u64,
    peak_equity: Option<Decimal>,
    max_drawdown_pct: Decimal,
    equity_curve: Vec<EquityPoint>,
    finalised: bool,
}

impl PerformanceAnalyser {
    pub fn new(risk_free_rate: f64) -> Self {
        Self {
            risk_free_rate,
            ticks: 0,
            peak_equity: None,
            max_drawdown_pct: Decimal::ZERO,
            equity_curve: Vec::new(),
            finalised: false,
        }
    }

    pub fn update_on_tick(&mut self, equity: Decimal) {
        self.ticks += 1;
        let peak = match self.peak_equity {
            Some(peak) if peak >= equity => peak,
            _ => {
                self.peak_equity = Some(equity);
                equity
            }
        };
        if peak > Decimal::ZERO {
            let drawdown = (peak - equity) / peak * dec!(100);
            if drawdown > self.max_drawdown_pct {
                self.max_drawdown_pct = drawdown;
            }
        }
    }

    pub fn update_on_bar(&mut self, equity: Decimal, timestamp: DateTime<Utc>) {
        self.equity_curve.push(EquityPoint { timestamp, equity });
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn max_drawdown_pct(&self) -> Decimal {
        self.max_drawdown_pct
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn is_finalised(&self) -> bool {
        self.finalised
    }

    /// Final statistics over every closed trade of the run.
    ///
    /// Must be called once, after all trades are closed.
    pub fn calculate_statistics(
        &mut self,
        closed_trades: &[Trade],
        initial_balance: Decimal,
    ) -> Result<TradeStatistics, AnalysisError> {
        if self.finalised {
            return Err(AnalysisError::AlreadyFinalised);
        }
        self.finalised = true;

        let mut stats = trade_statistics(closed_trades, initial_balance, self.risk_free_rate);
        stats.max_drawdown_pct = round_to(self.max_drawdown_pct, 4);
        stats.total_ticks = self.ticks;
        Ok(stats)
    }
}

impl Default for PerformanceAnalyser {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Trade statistics without the drawdown and tick figures, which only the
/// incremental analyser knows.
pub fn trade_statistics(closed_trades: &[Trade], initial_balance: Decimal, risk_free_rate: f64) -> TradeStatistics {
    let mut trades: Vec<&Trade> = closed_trades.iter().collect();
    trades.sort_by_key(|t| t.close_time);

    let mut stats = TradeStatistics {
        initial_balance,
        final_balance: initial_balance,
        total_trades: trades.len(),
        ..Default::default()
    };
    if trades.is_empty() {
        return stats;
    }

    let mut long_wins = 0usize;
    let mut short_wins = 0usize;
    let mut streaks = StreakCounter::default();
    let mut returns = Vec::with_capacity(trades.len());
    let mut balance = initial_balance;

    for trade in &trades {
        let profit = trade.profit;
        let won = profit > Decimal::ZERO;
        if won {
            stats.winning_trades += 1;
            stats.gross_profit += profit;
            stats.largest_win = stats.largest_win.max(profit);
        } else {
            stats.losing_trades += 1;
            stats.gross_loss += profit;
            stats.largest_loss = stats.largest_loss.min(profit);
        }
        match trade.direction {
            Direction::Long => {
                stats.long_trades += 1;
                long_wins += won as usize;
            }
            Direction::Short => {
                stats.short_trades += 1;
                short_wins += won as usize;
            }
        }
        streaks.push(won);

        // A non-positive running balance has no meaningful return
        returns.push(if balance > Decimal::ZERO { to_f64(profit / balance) } else { 0.0 });
        balance += profit;
    }

    let count = Decimal::from(stats.total_trades);
    stats.total_net_profit = stats.gross_profit + stats.gross_loss;
    stats.final_balance = initial_balance + stats.total_net_profit;
    if initial_balance > Decimal::ZERO {
        stats.total_return_pct = round_to(stats.total_net_profit / initial_balance * dec!(100), 4);
    }
    if stats.gross_loss < Decimal::ZERO {
        stats.profit_factor = round_to(stats.gross_profit / stats.gross_loss.abs(), 4);
    }
    stats.expected_payoff = round_to(stats.total_net_profit / count, 4);
    stats.win_rate_pct = percentage(stats.winning_trades, stats.total_trades);
    stats.long_win_rate_pct = percentage(long_wins, stats.long_trades);
    stats.short_win_rate_pct = percentage(short_wins, stats.short_trades);
    if stats.winning_trades > 0 {
        stats.average_win = round_to(stats.gross_profit / Decimal::from(stats.winning_trades), 4);
    }
    if stats.losing_trades > 0 {
        stats.average_loss = round_to(stats.gross_loss / Decimal::from(stats.losing_trades), 4);
    }

    let streaks = streaks.finish();
    stats.max_consecutive_wins = streaks.max_wins;
    stats.max_consecutive_losses = streaks.max_losses;
    stats.average_consecutive_wins = streaks.average_wins();
    stats.average_consecutive_losses = streaks.average_losses();

    stats.sharpe_ratio = sharpe_ratio(&returns, risk_free_rate);
    stats
}

/// (mean return − risk-free rate) / population standard deviation.
fn sharpe_ratio(returns: &[f64], risk_free_rate: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let std_dev = returns.iter().population_std_dev();
    if !std_dev.is_finite() || std_dev == 0.0 {
        return 0.0;
    }
    (returns.iter().mean() - risk_free_rate) / std_dev
}

fn percentage(part: usize, total: usize) -> Decimal {
    if total == 0 {
        return Decimal::ZERO;
    }
    round_to(Decimal::from(part) * dec!(100) / Decimal::from(total), 4)
}

#[derive(Debug, Default)]
struct StreakCounter {
    current: Option<(bool, usize)>,
    max_wins: usize,
    max_losses: usize,
    win_streaks: Vec<usize>,
    loss_streaks: Vec<usize>,
}

impl StreakCounter {
    fn push(&mut self, won: bool) {
        match self.current {
            Some((kind, len)) if kind == won => self.current = Some((kind, len + 1)),
            _ => {
                self.close_streak();
                self.current = Some((won, 1));
            }
        }
    }

    fn close_streak(&mut self) {
        match self.current.take() {
            Some((true, len)) => {
                self.max_wins = self.max_wins.max(len);
                self.win_streaks.push(len);
            }
            Some((false, len)) => {
                self.max_losses = self.max_losses.max(len);
                self.loss_streaks.push(len);
            }
            None => {}
        }
    }

    fn finish(mut self) -> Self {
        self.close_streak();
        self
    }

    fn average_wins(&self) -> Decimal {
        average(&self.win_streaks)
    }

    fn average_losses(&self) -> Decimal {
        average(&self.loss_streaks)
    }
}

fn average(values: &[usize]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    let total: usize = values.iter().sum();
    round_to(Decimal::from(total) / Decimal::from(values.len()), 4)
}
