//! Trade managers.
//!
//! [`SimulatedTradeManager`] fills against recorded quotes for backtests;
//! [`LiveTradeManager`] routes every request through a [`Broker`] with
//! bounded timeouts.
//!
//! [`Broker`]: trading_core::traits::Broker

mod live;
mod simulated;

pub use live::LiveTradeManager;
pub use simulated::SimulatedTradeManager;
