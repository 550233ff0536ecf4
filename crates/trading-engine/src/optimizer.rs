//! Parameter sweeps over one candle range.
//!
//! Each trial builds its own strategy, trade manager and executor from the
//! shared candle source; only the semaphore is shared between trials.

use futures::future::join_all;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use trading_core::traits::{CandleSource, EventPublisher};
use trading_core::types::TradeStatistics;
use trading_monitor::SyncEventPublisher;
use trading_strategies::{ParameterSpec, StrategyRegistry};

use crate::backtest::{run_backtest, BacktestSpec};
use crate::executor::ExecutorState;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OptimizeError {
    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("strategy '{strategy}' has no parameter '{name}'")]
    UnknownParameter { strategy: String, name: String },

    #[error("base parameters must be an object")]
    InvalidBaseParams,

    #[error("grid has {trials} trials, limit is {limit}")]
    GridTooLarge { trials: usize, limit: usize },
}

/// What to sweep and how hard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationConfig {
    pub strategy: String,
    /// Fixed values for parameters that are not swept
    #[serde(default)]
    pub base_params: Value,
    /// Parameters to sweep over their full `min..=max` grid
    pub parameters: Vec<String>,
    pub max_concurrency: usize,
    pub max_trials: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialResult {
    pub trial: usize,
    pub params: Value,
    pub net_profit: Decimal,
    pub statistics: Option<TradeStatistics>,
    pub error: Option<String>,
}

impl TrialResult {
    fn failed(trial: usize, params: Value, error: impl Into<String>) -> Self {
        Self {
            trial,
            params,
            net_profit: Decimal::ZERO,
            statistics: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Trials ranked by net profit, failed trials last.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub strategy: String,
    pub trials: Vec<TrialResult>,
}

impl OptimizationReport {
    pub fn best(&self) -> Option<&TrialResult> {
        self.trials.first().filter(|t| t.is_success())
    }

    pub fn failed(&self) -> usize {
        self.trials.iter().filter(|t| !t.is_success()).count()
    }
}

/// Cartesian product of the named parameters' grids over `base`.
pub fn parameter_grid(
    strategy: &str,
    specs: &[ParameterSpec],
    names: &[String],
    base: &Value,
    limit: usize,
) -> Result<Vec<Value>, OptimizeError> {
    let base = match base {
        Value::Null => Map::new(),
        Value::Object(map) => map.clone(),
        _ => return Err(OptimizeError::InvalidBaseParams),
    };

    let mut axes = Vec::with_capacity(names.len());
    for name in names {
        let spec = specs
            .iter()
            .find(|s| &s.name == name)
            .ok_or_else(|| OptimizeError::UnknownParameter {
                strategy: strategy.to_string(),
                name: name.clone(),
            })?;
        let values: Vec<Value> = spec.grid().into_iter().map(|v| spec.json_value(v)).collect();
        axes.push((name, values));
    }

    let trials = axes.iter().fold(1usize, |n, (_, values)| n.saturating_mul(values.len()));
    if trials > limit {
        return Err(OptimizeError::GridTooLarge { trials, limit });
    }

    let mut grid = vec![base];
    for (name, values) in axes {
        let mut next = Vec::with_capacity(grid.len() * values.len());
        for point in &grid {
            for value in &values {
                let mut point = point.clone();
                point.insert(name.clone(), value.clone());
                next.push(point);
            }
        }
        grid = next;
    }
    Ok(grid.into_iter().map(Value::Object).collect())
}

/// Runs parameter trials with bounded concurrency.
pub struct Optimizer {
    registry: Arc<StrategyRegistry>,
    source: Arc<dyn CandleSource>,
    spec: BacktestSpec,
}

impl Optimizer {
    /// `source` is shared by every trial; wrap it in a cache when it is slow.
    pub fn new(registry: Arc<StrategyRegistry>, source: Arc<dyn CandleSource>, spec: BacktestSpec) -> Self {
        Self { registry, source, spec }
    }

    pub async fn run(&self, config: &OptimizationConfig) -> Result<OptimizationReport, OptimizeError> {
        let info = self
            .registry
            .get(&config.strategy)
            .ok_or_else(|| OptimizeError::UnknownStrategy(config.strategy.clone()))?;
        let grid = parameter_grid(
            &config.strategy,
            &info.parameters,
            &config.parameters,
            &config.base_params,
            config.max_trials,
        )?;
        info!(
            strategy = %config.strategy,
            trials = grid.len(),
            concurrency = config.max_concurrency,
            "Starting optimisation"
        );

        let semaphore = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
        let mut submitted = Vec::with_capacity(grid.len());
        let mut handles = Vec::with_capacity(grid.len());
        for (trial, params) in grid.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            let registry = self.registry.clone();
            let source = self.source.clone();
            let strategy = config.strategy.clone();
            let mut spec = self.spec.clone();
            spec.strategy_id = format!("{}-trial-{}", self.spec.strategy_id, trial);
            submitted.push(params.clone());

            handles.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return TrialResult::failed(trial, params, "optimiser shut down");
                };
                run_trial(trial, &strategy, params, &registry, &spec, source).await
            }));
        }

        let mut trials = Vec::with_capacity(handles.len());
        for (trial, joined) in join_all(handles).await.into_iter().enumerate() {
            match joined {
                Ok(result) => trials.push(result),
                Err(e) => {
                    warn!(trial, error = %e, "Trial task aborted");
                    trials.push(TrialResult::failed(trial, submitted[trial].clone(), e.to_string()));
                }
            }
        }
        rank(&mut trials);

        let report = OptimizationReport {
            strategy: config.strategy.clone(),
            trials,
        };
        info!(
            strategy = %report.strategy,
            failed = report.failed(),
            best_profit = ?report.best().map(|t| t.net_profit),
            "Optimisation finished"
        );
        Ok(report)
    }
}

async fn run_trial(
    trial: usize,
    strategy: &str,
    params: Value,
    registry: &StrategyRegistry,
    spec: &BacktestSpec,
    source: Arc<dyn CandleSource>,
) -> TrialResult {
    let instance = match registry.create(strategy, &params) {
        Ok(instance) => instance,
        Err(e) => {
            debug!(trial, error = %e, "Trial parameters rejected");
            return TrialResult::failed(trial, params, e.to_string());
        }
    };
    let publisher: Arc<dyn EventPublisher> = Arc::new(SyncEventPublisher::new());
    match run_backtest(spec, source, instance, publisher).await {
        Ok(summary) if summary.status == ExecutorState::Failed => {
            let reason = summary
                .stop_reason
                .map(|r| r.to_string())
                .unwrap_or_else(|| "run failed".to_string());
            TrialResult::failed(trial, params, reason)
        }
        Ok(summary) => {
            let net_profit = summary.account.balance - summary.account.initial_balance;
            TrialResult {
                trial,
                params,
                net_profit,
                statistics: summary.statistics,
                error: None,
            }
        }
        Err(e) => TrialResult::failed(trial, params, e.to_string()),
    }
}

fn rank(trials: &mut [TrialResult]) {
    trials.sort_by(|a, b| match (a.is_success(), b.is_success()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => b.net_profit.cmp(&a.net_profit).then(a.trial.cmp(&b.trial)),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn specs() -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::integer("fast", "Fast period", 5, 2, 6, 2),
            ParameterSpec::integer("slow", "Slow period", 20, 10, 20, 10),
        ]
    }

    #[test]
    fn test_grid_is_cartesian_over_base() {
        let names = vec!["fast".to_string(), "slow".to_string()];
        let grid = parameter_grid("s", &specs(), &names, &json!({"use_ema": false}), 100).unwrap();

        assert_eq!(grid.len(), 6);
        assert_eq!(grid[0], json!({"use_ema": false, "fast": 2, "slow": 10}));
        assert_eq!(grid[5], json!({"use_ema": false, "fast": 6, "slow": 20}));
    }

    #[test]
    fn test_grid_without_axes_is_base() {
        let grid = parameter_grid("s", &specs(), &[], &Value::Null, 1).unwrap();
        assert_eq!(grid, vec![json!({})]);
    }

    #[test]
    fn test_grid_rejects_unknown_and_oversized() {
        let err = parameter_grid("s", &specs(), &["nope".to_string()], &Value::Null, 10).unwrap_err();
        assert!(matches!(err, OptimizeError::UnknownParameter { .. }));

        let names = vec!["fast".to_string(), "slow".to_string()];
        let err = parameter_grid("s", &specs(), &names, &Value::Null, 5).unwrap_err();
        assert_eq!(err, OptimizeError::GridTooLarge { trials: 6, limit: 5 });

        assert_eq!(
            parameter_grid("s", &specs(), &[], &json!(3), 5).unwrap_err(),
            OptimizeError::InvalidBaseParams
        );
    }

    #[test]
    fn test_rank_puts_failures_last() {
        let ok = |trial, profit: i64| TrialResult {
            trial,
            params: Value::Null,
            net_profit: Decimal::from(profit),
            statistics: None,
            error: None,
        };
        let mut trials = vec![
            TrialResult::failed(0, Value::Null, "bad"),
            ok(1, 10),
            ok(2, 50),
            ok(3, -5),
        ];
        rank(&mut trials);
        let order: Vec<usize> = trials.iter().map(|t| t.trial).collect();
        assert_eq!(order, vec![2, 1, 3, 0]);
    }
}
