//! Run report generation.

use serde::{Deserialize, Serialize};
use trading_core::types::{StopReason, Timeframe, Trade, TradeStatistics};

use crate::executor::{ExecutorState, RunSummary};
use crate::performance::EquityPoint;

/// Complete report of one finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Registry name of the strategy
    pub strategy: String,
    pub strategy_id: String,
    pub instrument: String,
    pub period: Timeframe,
    pub status: ExecutorState,
    pub stop_reason: Option<StopReason>,
    pub statistics: TradeStatistics,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub ticks_dropped: u64,
}

impl RunReport {
    pub fn new(strategy: impl Into<String>, instrument: impl Into<String>, period: Timeframe, summary: RunSummary) -> Self {
        // A run that never finalised still reports its trades
        let statistics = summary.statistics.unwrap_or_else(|| TradeStatistics {
            initial_balance: summary.account.initial_balance,
            final_balance: summary.account.balance,
            total_trades: summary.closed_trades.len(),
            total_ticks: summary.ticks_processed,
            ..Default::default()
        });
        Self {
            strategy: strategy.into(),
            strategy_id: summary.strategy_id,
            instrument: instrument.into(),
            period,
            status: summary.status,
            stop_reason: summary.stop_reason,
            statistics,
            trades: summary.closed_trades,
            equity_curve: summary.equity_curve,
            ticks_dropped: summary.ticks_dropped,
        }
    }

    /// Generate a text summary.
    pub fn summary(&self) -> String {
        let stats = &self.statistics;
        let mut s = String::new();

        s.push_str("═══════════════════════════════════════════════════════════\n");
        s.push_str("                        RUN REPORT                         \n");
        s.push_str("═══════════════════════════════════════════════════════════\n\n");

        s.push_str(&format!("  Strategy:            {} ({})\n", self.strategy, self.strategy_id));
        s.push_str(&format!("  Instrument:          {} {}\n", self.instrument, self.period));
        s.push_str(&format!("  Status:              {}\n", self.status));
        if let Some(reason) = &self.stop_reason {
            s.push_str(&format!("  Stop Reason:         {}\n", reason));
        }
        s.push('\n');

        s.push_str("PERFORMANCE\n");
        s.push_str("───────────────────────────────────────────────────────────\n");
        s.push_str(&format!("  Initial Balance:     {:.2}\n", stats.initial_balance));
        s.push_str(&format!("  Final Balance:       {:.2}\n", stats.final_balance));
        s.push_str(&format!("  Net Profit:          {:.2}\n", stats.total_net_profit));
        s.push_str(&format!("  Total Return:        {:.2}%\n", stats.total_return_pct));
        s.push_str(&format!("  Max Drawdown:        {:.2}%\n", stats.max_drawdown_pct));
        s.push_str(&format!("  Sharpe Ratio:        {:.2}\n", stats.sharpe_ratio));
        s.push_str(&format!("  Profit Factor:       {:.2}\n", stats.profit_factor));
        s.push_str(&format!("  Expected Payoff:     {:.2}\n", stats.expected_payoff));
        s.push('\n');

        s.push_str("TRADE STATISTICS\n");
        s.push_str("───────────────────────────────────────────────────────────\n");
        s.push_str(&format!("  Total Trades:        {}\n", stats.total_trades));
        s.push_str(&format!(
            "  Won / Lost:          {} / {}\n",
            stats.winning_trades, stats.losing_trades
        ));
        s.push_str(&format!("  Win Rate:            {:.2}%\n", stats.win_rate_pct));
        s.push_str(&format!(
            "  Long (win rate):     {} ({:.2}%)\n",
            stats.long_trades, stats.long_win_rate_pct
        ));
        s.push_str(&format!(
            "  Short (win rate):    {} ({:.2}%)\n",
            stats.short_trades, stats.short_win_rate_pct
        ));
        s.push_str(&format!("  Largest Win:         {:.2}\n", stats.largest_win));
        s.push_str(&format!("  Largest Loss:        {:.2}\n", stats.largest_loss));
        s.push_str(&format!("  Avg Win:             {:.2}\n", stats.average_win));
        s.push_str(&format!("  Avg Loss:            {:.2}\n", stats.average_loss));
        s.push_str(&format!(
            "  Max Streak (W / L):  {} / {}\n",
            stats.max_consecutive_wins, stats.max_consecutive_losses
        ));
        s.push('\n');

        s.push_str("EXECUTION\n");
        s.push_str("───────────────────────────────────────────────────────────\n");
        s.push_str(&format!("  Ticks Processed:     {}\n", stats.total_ticks));
        s.push_str(&format!("  Ticks Dropped:       {}\n", self.ticks_dropped));
        s.push_str(&format!("  Equity Points:       {}\n", self.equity_curve.len()));
        s.push('\n');

        s.push_str("═══════════════════════════════════════════════════════════\n");

        s
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export the equity curve as CSV.
    pub fn equity_to_csv(&self) -> Result<String, csv::Error> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["timestamp", "equity"])?;
        for point in &self.equity_curve {
            writer.write_record([point.timestamp.to_rfc3339(), point.equity.to_string()])?;
        }
        let bytes = writer.into_inner().map_err(|e| e.into_error())?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use trading_core::types::Account;

    fn summary() -> RunSummary {
        let mut account = Account::new("sim", dec!(10000));
        account.realize(dec!(1000));
        RunSummary {
            strategy_id: "run-7".into(),
            status: ExecutorState::Stopped,
            stop_reason: Some(StopReason::Completed),
            account,
            closed_trades: Vec::new(),
            statistics: Some(TradeStatistics {
                initial_balance: dec!(10000),
                final_balance: dec!(11000),
                total_return_pct: dec!(10),
                total_trades: 4,
                ..Default::default()
            }),
            equity_curve: vec![
                EquityPoint {
                    timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                    equity: dec!(10000),
                },
                EquityPoint {
                    timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap(),
                    equity: dec!(10500.5),
                },
            ],
            ticks_processed: 80,
            ticks_dropped: 0,
        }
    }

    #[test]
    fn test_report_summary() {
        let report = RunReport::new("rsi", "EUR_USD", Timeframe::Hour1, summary());
        let text = report.summary();
        assert!(text.contains("Total Return"));
        assert!(text.contains("10.00%"));
        assert!(text.contains("rsi (run-7)"));
        assert!(text.contains("completed"));
    }

    #[test]
    fn test_equity_csv() {
        let report = RunReport::new("rsi", "EUR_USD", Timeframe::Hour1, summary());
        let csv = report.equity_to_csv().unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "timestamp,equity");
        assert_eq!(lines[2], "2024-01-01T01:00:00+00:00,10500.5");
    }

    #[test]
    fn test_missing_statistics_fall_back_to_account() {
        let mut summary = summary();
        summary.statistics = None;
        let report = RunReport::new("rsi", "EUR_USD", Timeframe::Hour1, summary);
        assert_eq!(report.statistics.final_balance, dec!(11000));
        assert_eq!(report.statistics.total_ticks, 80);
    }
}
