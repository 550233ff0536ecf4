//! Built-in trading strategies.
//!
//! - Moving Average Crossover
//! - RSI overbought/oversold reversals
//!
//! Each strategy has a typed `serde` params struct and a [`ParameterSpec`]
//! table used for validation, listing and optimisation grids.

pub mod indicators;
mod ma_crossover;
pub mod params;
mod registry;
mod rsi_strategy;

pub use ma_crossover::{MaCrossoverParams, MaCrossoverStrategy};
pub use params::ParameterSpec;
pub use registry::{StrategyInfo, StrategyRegistry};
pub use rsi_strategy::{RsiParams, RsiStrategy};
