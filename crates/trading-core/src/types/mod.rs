//! Core data types for the strategy engine.

mod account;
mod calendar;
mod instrument;
pub mod numeric;
mod ohlcv;
mod statistics;
mod stop;
mod tick;
mod timeframe;
mod trade;

pub use account::{Account, DailyEquity};
pub use calendar::TradingCalendar;
pub use instrument::Instrument;
pub use ohlcv::{Bar, BarWindow};
pub use statistics::TradeStatistics;
pub use stop::StopReason;
pub use tick::Tick;
pub use timeframe::Timeframe;
pub use trade::{CloseReason, Direction, Trade, TradeId};
