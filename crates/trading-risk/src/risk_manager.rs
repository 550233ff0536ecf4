//! Account-level risk limits evaluated against broker trading days.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};
use trading_core::types::{Account, DailyEquity, TradingCalendar};

/// Risk limits for one run. Every limit is optional; `None` disables it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskProfile {
    /// Largest allowed drop from the equity captured at the day start
    pub max_daily_loss: Option<Decimal>,
    /// Largest allowed drop from the initial balance
    pub account_loss_limit: Option<Decimal>,
    /// Subtracted from `account_loss_limit` so the limit trips early
    #[serde(default)]
    pub safety_buffer: Decimal,
    /// Stop trading once net profit reaches this amount
    pub profit_target: Option<Decimal>,
    #[serde(default)]
    pub calendar: TradingCalendar,
}

impl RiskProfile {
    pub fn unlimited() -> Self {
        Self::default()
    }
}

/// A breached limit. This is a status, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RiskViolation {
    DailyLoss { loss: Decimal, limit: Decimal },
    AccountLoss { loss: Decimal, limit: Decimal },
    ProfitTarget { profit: Decimal, target: Decimal },
}

impl fmt::Display for RiskViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskViolation::DailyLoss { loss, limit } => {
                write!(f, "daily loss {} exceeds limit {}", loss, limit)
            }
            RiskViolation::AccountLoss { loss, limit } => {
                write!(f, "account loss {} exceeds limit {}", loss, limit)
            }
            RiskViolation::ProfitTarget { profit, target } => {
                write!(f, "profit target {} reached (profit {})", target, profit)
            }
        }
    }
}

/// Tracks trading days and evaluates a [`RiskProfile`] against an account.
pub struct RiskManager {
    profile: RiskProfile,
    current_day: Option<DateTime<Utc>>,
    daily_start_equity: Decimal,
    daily_equity: Vec<DailyEquity>,
}

impl RiskManager {
    pub fn new(profile: RiskProfile) -> Self {
        Self {
            profile,
            current_day: None,
            daily_start_equity: Decimal::ZERO,
            daily_equity: Vec::new(),
        }
    }

    /// Roll the trading day if `now` falls in a later one, then check limits
    /// in order: daily loss, account loss, profit target. The first breached
    /// limit is returned.
    pub fn assess_risk(&mut self, now: DateTime<Utc>, account: &Account) -> Option<RiskViolation> {
        self.roll_day(now, account);
        let violation = self.evaluate(self.daily_start_equity, account);
        if let Some(v) = &violation {
            warn!(account = %account.id, equity = %account.equity, "Risk limit breached: {}", v);
        }
        violation
    }

    /// Same checks as [`assess_risk`](Self::assess_risk) without advancing
    /// state. A pending day change counts as a fresh day with no daily loss.
    pub fn can_trade(&self, now: DateTime<Utc>, account: &Account) -> bool {
        let daily_start = if self.is_new_day(now) {
            account.equity
        } else {
            self.daily_start_equity
        };
        self.evaluate(daily_start, account).is_none()
    }

    /// Start a new trading day if `now` belongs to one. Returns whether it did.
    ///
    /// Instants in an earlier day than the current one are ignored; the
    /// current day never moves backwards.
    pub fn roll_day(&mut self, now: DateTime<Utc>, account: &Account) -> bool {
        if !self.is_new_day(now) {
            return false;
        }
        let day_start = self.profile.calendar.day_start(now);
        self.current_day = Some(day_start);
        self.daily_start_equity = account.equity;
        self.daily_equity.push(DailyEquity {
            account_id: account.id.clone(),
            equity: account.equity,
            day_start,
        });
        info!(
            account = %account.id,
            day_start = %day_start,
            equity = %account.equity,
            "New trading day"
        );
        true
    }

    fn is_new_day(&self, now: DateTime<Utc>) -> bool {
        let day_start = self.profile.calendar.day_start(now);
        match self.current_day {
            Some(current) => day_start > current,
            None => true,
        }
    }

    fn evaluate(&self, daily_start_equity: Decimal, account: &Account) -> Option<RiskViolation> {
        if let Some(limit) = self.profile.max_daily_loss {
            let loss = daily_start_equity - account.equity;
            if loss > limit {
                return Some(RiskViolation::DailyLoss { loss, limit });
            }
        }

        if let Some(limit) = self.profile.account_loss_limit {
            let loss = account.initial_balance - account.equity;
            let effective = limit - self.profile.safety_buffer;
            if loss > effective {
                return Some(RiskViolation::AccountLoss { loss, limit: effective });
            }
        }

        if let Some(target) = self.profile.profit_target {
            let profit = account.equity - account.initial_balance;
            if profit >= target {
                return Some(RiskViolation::ProfitTarget { profit, target });
            }
        }

        None
    }

    pub fn profile(&self) -> &RiskProfile {
        &self.profile
    }

    pub fn current_day(&self) -> Option<DateTime<Utc>> {
        self.current_day
    }

    pub fn daily_start_equity(&self) -> Decimal {
        self.daily_start_equity
    }

    /// Equity snapshots, one per trading day seen, oldest first.
    pub fn daily_equity(&self) -> &[DailyEquity] {
        &self.daily_equity
    }
}
