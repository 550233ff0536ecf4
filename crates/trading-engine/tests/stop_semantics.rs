//! Stopping a run from outside while it is being fed.

mod common;

use common::{hourly_bars, spec, wave, Alternating, Collector, VecCandleSource};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use trading_core::traits::{CandleSource, EventPublisher};
use trading_core::types::StopReason;
use trading_engine::{build_backtest, ExecutorState, RunSummary};
use trading_monitor::{AsyncEventPublisher, SyncEventPublisher};

const BARS: usize = 3000;

/// Starts a long run, stops it once `collector` has seen a few bars and
/// returns the summary plus the number of events seen when `stop` returned.
async fn stop_midway(publisher: Arc<dyn EventPublisher>, collector: Arc<Collector>) -> (RunSummary, usize) {
    let source: Arc<dyn CandleSource> = Arc::new(VecCandleSource::new(hourly_bars(&wave(BARS))));
    let executor = build_backtest(
        &spec("stoppable", BARS),
        source,
        Box::new(Alternating::new(dec!(1000))),
        publisher,
    );
    executor.initialise().await.unwrap();
    let handle = executor.handle();

    let run = tokio::spawn(async move { executor.run().await });
    tokio::time::timeout(Duration::from_secs(10), collector.notify.notified())
        .await
        .unwrap();

    handle.stop(StopReason::requested("operator")).await;
    assert!(handle.is_terminated().await);
    let seen_at_stop = collector.events().len();

    // A second stop changes nothing
    handle.stop(StopReason::requested("again")).await;

    let summary = run.await.unwrap().unwrap();
    (summary, seen_at_stop)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_with_sync_publisher() {
    let publisher = Arc::new(SyncEventPublisher::new());
    let collector = Arc::new(Collector::notifying_after(10));
    publisher.add_listener(collector.clone());

    let (summary, seen_at_stop) = stop_midway(publisher, collector.clone()).await;

    assert_eq!(summary.status, ExecutorState::Stopped);
    assert_eq!(summary.stop_reason, Some(StopReason::requested("operator")));
    assert!(summary.ticks_processed < (BARS * 4) as u64);
    assert!(summary.closed_trades.iter().all(|t| t.close_reason.is_some()));

    // Nothing is published once the stop has completed
    let tags = collector.tags();
    assert_eq!(tags.len(), seen_at_stop);
    assert_eq!(collector.count("strategy_stop"), 1);
    assert_eq!(collector.count("analysis"), 1);
    assert_eq!(tags.last(), Some(&"strategy_stop"));
    assert!(collector.count("bar") < BARS);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_with_async_publisher() {
    let publisher = Arc::new(AsyncEventPublisher::new(1_000_000, 64));
    let collector = Arc::new(Collector::notifying_after(10));
    publisher.add_listener(collector.clone());

    let (summary, _) = stop_midway(publisher.clone(), collector.clone()).await;
    publisher.drained().await;

    assert_eq!(publisher.dropped(), 0);
    assert_eq!(summary.status, ExecutorState::Stopped);
    let tags = collector.tags();
    assert_eq!(collector.count("strategy_stop"), 1);
    assert_eq!(tags.last(), Some(&"strategy_stop"));
    assert_eq!(collector.count("bar"), summary.equity_curve.len());
}
