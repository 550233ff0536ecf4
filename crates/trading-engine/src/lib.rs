//! Strategy execution engine.
//!
//! Drives strategies over backtest or live data feeds, tracks performance
//! and provides the orchestration around runs: a run registry, parameter
//! optimisation and a background task worker pool.

pub mod backtest;
pub mod executor;
pub mod jobs;
pub mod optimizer;
pub mod performance;
mod registry;
mod report;

pub use backtest::{build_backtest, run_backtest, BacktestSpec};
pub use executor::{ExecutorConfig, ExecutorHandle, ExecutorState, RunSummary, StrategyExecutor};
pub use jobs::{BacktestJob, BacktestTaskHandler, InMemoryTaskStore, TaskHandler, TaskWorkerPool};
pub use optimizer::{OptimizationConfig, OptimizationReport, OptimizeError, Optimizer, TrialResult};
pub use performance::{EquityPoint, PerformanceAnalyser};
pub use registry::{RegistryError, RunRegistry};
pub use report::RunReport;
