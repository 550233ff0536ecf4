mod common;

use common::{hourly_bars, spec, wave, VecCandleSource};
use serde_json::json;
use std::sync::Arc;
use trading_core::traits::{CandleSource, TaskRecord, TaskStatus, TaskStore};
use trading_engine::{BacktestJob, BacktestTaskHandler, InMemoryTaskStore, TaskWorkerPool};
use trading_strategies::StrategyRegistry;

#[tokio::test]
async fn test_backtest_tasks_complete_or_fail() {
    let source: Arc<dyn CandleSource> = Arc::new(VecCandleSource::new(hourly_bars(&wave(48))));
    let handler = Arc::new(BacktestTaskHandler::new(Arc::new(StrategyRegistry::new()), source));
    let store = Arc::new(InMemoryTaskStore::new());

    let good = BacktestJob {
        strategy: "ma_crossover".into(),
        params: json!({"fast_period": 3, "slow_period": 8}),
        spec: spec("job-good", 48),
    };
    let bad = BacktestJob {
        strategy: "martingale".into(),
        params: json!({}),
        spec: spec("job-bad", 48),
    };
    let good = TaskRecord::pending(BacktestTaskHandler::KIND, serde_json::to_value(&good).unwrap());
    let bad = TaskRecord::pending(BacktestTaskHandler::KIND, serde_json::to_value(&bad).unwrap());
    let garbage = TaskRecord::pending(BacktestTaskHandler::KIND, json!({"strategy": 7}));
    for record in [&good, &bad, &garbage] {
        store.create(record.clone()).await.unwrap();
    }

    let pool = TaskWorkerPool::new(store.clone(), 4).with_handler(BacktestTaskHandler::KIND, handler);
    assert_eq!(pool.poll_once().await.unwrap(), 3);
    pool.drain().await;
    assert!(store.find_pending(10).await.unwrap().is_empty());

    let good = store.get(good.id).await.unwrap().unwrap();
    assert_eq!(good.status, TaskStatus::Completed);
    let result = good.result.unwrap();
    assert_eq!(result["status"], json!("stopped"));
    assert_eq!(result["strategy_id"], json!("job-good"));

    let bad = store.get(bad.id).await.unwrap().unwrap();
    assert_eq!(bad.status, TaskStatus::Failed);
    assert!(bad.error.unwrap().contains("martingale"));

    let garbage = store.get(garbage.id).await.unwrap().unwrap();
    assert_eq!(garbage.status, TaskStatus::Failed);
    assert!(garbage.error.unwrap().contains("invalid backtest job"));
}
