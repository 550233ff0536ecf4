//! Core types and traits for the strategy engine.
//!
//! This crate provides the foundational building blocks including:
//! - Market data and account types (Tick, Bar, Trade, Account)
//! - The run event model and error taxonomy
//! - Seams for strategies, data feeds, trade managers, publishers and stores

pub mod error;
pub mod events;
pub mod traits;
pub mod types;

pub use error::{TradingError, TradingResult};
pub use events::{Event, EventPayload, LogLevel, TradeAction};
pub use traits::*;
pub use types::*;
