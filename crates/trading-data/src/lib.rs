//! Market data for strategy runs.
//!
//! Candle sources, synthetic tick generation, data providers for backtest
//! and live feeds, and the data manager that aggregates ticks into bars.

mod cache;
mod csv_source;
pub mod data_manager;
pub mod provider;
pub mod tick_generator;

pub use cache::CachedCandleSource;
pub use csv_source::CsvCandleSource;
pub use data_manager::DataManager;
pub use provider::{BacktestDataProvider, LiveDataProvider, LiveFeedConfig};
pub use tick_generator::{TickDensity, TickGenerator};

