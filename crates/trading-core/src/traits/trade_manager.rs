//! Trade manager seam shared by the simulated and live implementations.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::TradeError;
use crate::types::{Account, Bar, CloseReason, Direction, Instrument, Tick, Trade, TradeId};

/// Balance figure that risk-based sizing is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceBasis {
    #[default]
    Balance,
    Equity,
    InitialBalance,
}

impl BalanceBasis {
    pub fn amount(&self, account: &Account) -> Decimal {
        match self {
            BalanceBasis::Balance => account.balance,
            BalanceBasis::Equity => account.equity,
            BalanceBasis::InitialBalance => account.initial_balance,
        }
    }
}

/// How the quantity and protective levels of a new position are chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PositionSizing {
    /// Caller-supplied quantity and absolute price levels
    Fixed {
        quantity: Decimal,
        stop_loss: Option<Decimal>,
        take_profit: Option<Decimal>,
    },
    /// Quantity from `basis × risk_percent / stop_distance`, rounded down
    RiskBased {
        risk_percent: Decimal,
        basis: BalanceBasis,
        /// Distance from entry to stop in price units
        stop_distance: Decimal,
        /// Take-profit distance as a multiple of the stop distance
        reward_ratio: Option<Decimal>,
    },
}

impl PositionSizing {
    pub fn fixed(quantity: Decimal) -> Self {
        PositionSizing::Fixed {
            quantity,
            stop_loss: None,
            take_profit: None,
        }
    }

    pub fn risk_based(risk_percent: Decimal, stop_distance: Decimal) -> Self {
        PositionSizing::RiskBased {
            risk_percent,
            basis: BalanceBasis::Balance,
            stop_distance,
            reward_ratio: None,
        }
    }
}

/// Result of a best-effort liquidation.
#[derive(Debug, Default)]
pub struct CloseAllOutcome {
    pub closed: Vec<Trade>,
    pub failures: Vec<(TradeId, TradeError)>,
}

impl CloseAllOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Opens, closes and marks positions for one run.
///
/// Every mutating call takes `&mut self`; a trade manager has a single owner.
#[async_trait]
pub trait TradeManager: Send + Sync {
    /// Open a position at the current ask (long) or bid (short).
    async fn open_position(
        &mut self,
        instrument: &Instrument,
        direction: Direction,
        sizing: &PositionSizing,
    ) -> Result<Trade, TradeError>;

    /// Close one open trade at the current bid (long) or ask (short).
    async fn close_position(&mut self, trade_id: &TradeId) -> Result<Trade, TradeError>;

    /// Record a quote, close trades whose stop or target was crossed, and
    /// remark equity. Returns the trades closed by this tick.
    async fn on_tick(&mut self, tick: &Tick) -> Result<Vec<Trade>, TradeError>;

    /// Bar-level stop and target evaluation for runs without intrabar ticks.
    async fn update_on_bar(&mut self, bar: &Bar, spread: Decimal) -> Result<Vec<Trade>, TradeError>;

    /// Close every open trade, collecting per-trade failures.
    async fn close_all(&mut self, reason: CloseReason) -> CloseAllOutcome;

    fn account(&self) -> &Account;

    fn open_trades(&self) -> &[Trade];

    fn closed_trades(&self) -> &[Trade];

    fn last_tick(&self, instrument: &str) -> Option<&Tick>;
}
