//! CLI command implementations.

pub mod backtest;
pub mod optimize;
pub mod strategies;
pub mod validate;

mod support;
