//! Background job pickup over a [`TaskStore`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, RwLock, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use trading_core::error::TradingError;
use trading_core::traits::{CandleSource, EventPublisher, StoreError, TaskRecord, TaskStatus, TaskStore};
use trading_monitor::SyncEventPublisher;
use trading_strategies::StrategyRegistry;
use uuid::Uuid;

use crate::backtest::{run_backtest, BacktestSpec};

/// Task store kept in process memory.
#[derive(Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<Uuid, TaskRecord>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create(&self, record: TaskRecord) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&record.id) {
            return Err(StoreError::Duplicate(record.id));
        }
        tasks.insert(record.id, record);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<TaskRecord>, StoreError> {
        Ok(self.tasks.read().await.get(&id).cloned())
    }

    async fn update(&self, record: TaskRecord) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().await;
        match tasks.get_mut(&record.id) {
            Some(existing) => {
                *existing = record;
                Ok(())
            }
            None => Err(StoreError::NotFound(record.id)),
        }
    }

    async fn find_pending(&self, limit: usize) -> Result<Vec<TaskRecord>, StoreError> {
        let tasks = self.tasks.read().await;
        let mut pending: Vec<TaskRecord> = tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|t| t.created_at);
        pending.truncate(limit);
        Ok(pending)
    }
}

/// Executes tasks of one kind.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Returns the result stored on the completed record.
    async fn handle(&self, payload: &Value) -> Result<Value, TradingError>;
}

/// Payload of a `backtest` task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestJob {
    pub strategy: String,
    #[serde(default)]
    pub params: Value,
    pub spec: BacktestSpec,
}

/// Runs `backtest` tasks against one candle source.
pub struct BacktestTaskHandler {
    registry: Arc<StrategyRegistry>,
    source: Arc<dyn CandleSource>,
}

impl BacktestTaskHandler {
    pub const KIND: &'static str = "backtest";

    pub fn new(registry: Arc<StrategyRegistry>, source: Arc<dyn CandleSource>) -> Self {
        Self { registry, source }
    }
}

#[async_trait]
impl TaskHandler for BacktestTaskHandler {
    async fn handle(&self, payload: &Value) -> Result<Value, TradingError> {
        let job: BacktestJob =
            serde_json::from_value(payload.clone()).map_err(|e| TradingError::Config(format!("invalid backtest job: {}", e)))?;
        let strategy = self.registry.create(&job.strategy, &job.params)?;
        let publisher: Arc<dyn EventPublisher> = Arc::new(SyncEventPublisher::new());
        let summary = run_backtest(&job.spec, self.source.clone(), strategy, publisher).await?;
        serde_json::to_value(&summary).map_err(|e| TradingError::Internal(e.to_string()))
    }
}

/// Claims pending tasks and runs them on tokio tasks, at most
/// `max_concurrency` at a time.
pub struct TaskWorkerPool {
    store: Arc<dyn TaskStore>,
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
    semaphore: Arc<Semaphore>,
    poll_interval: Duration,
    in_flight: StdMutex<Vec<JoinHandle<()>>>,
}

impl TaskWorkerPool {
    pub fn new(store: Arc<dyn TaskStore>, max_concurrency: usize) -> Self {
        Self {
            store,
            handlers: HashMap::new(),
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
            poll_interval: Duration::from_secs(1),
            in_flight: StdMutex::new(Vec::new()),
        }
    }

    pub fn with_handler(mut self, kind: impl Into<String>, handler: Arc<dyn TaskHandler>) -> Self {
        self.handlers.insert(kind.into(), handler);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Tasks started and not yet finished.
    pub fn in_flight(&self) -> usize {
        let mut handles = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        handles.retain(|h| !h.is_finished());
        handles.len()
    }

    /// Claim as many pending tasks as there are free slots and start them.
    /// Returns the number started.
    pub async fn poll_once(&self) -> Result<usize, StoreError> {
        self.in_flight();
        let free = self.semaphore.available_permits();
        if free == 0 {
            return Ok(0);
        }
        let pending = self.store.find_pending(free).await?;
        let mut started = 0;
        for mut record in pending {
            let Ok(permit) = self.semaphore.clone().try_acquire_owned() else {
                break;
            };
            record.mark_running();
            self.store.update(record.clone()).await?;
            debug!(task_id = %record.id, kind = %record.kind, "Task claimed");

            let store = self.store.clone();
            let handler = self.handlers.get(&record.kind).cloned();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                execute(store, handler, record).await;
            });
            self.in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(handle);
            started += 1;
        }
        Ok(started)
    }

    /// Wait for every task started so far.
    pub async fn drain(&self) {
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.in_flight.lock().unwrap_or_else(PoisonError::into_inner));
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Task worker aborted");
            }
        }
    }

    /// Poll until `shutdown` turns true, then wait for running tasks.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(poll_ms = self.poll_interval.as_millis() as u64, "Task worker pool started");
        while !*shutdown.borrow() {
            if let Err(e) = self.poll_once().await {
                warn!(error = %e, "Polling the task store failed");
            }
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        self.drain().await;
        info!("Task worker pool stopped");
    }
}

async fn execute(store: Arc<dyn TaskStore>, handler: Option<Arc<dyn TaskHandler>>, mut record: TaskRecord) {
    match handler {
        Some(handler) => match handler.handle(&record.payload).await {
            Ok(result) => {
                info!(task_id = %record.id, kind = %record.kind, "Task completed");
                record.complete(result);
            }
            Err(e) => {
                warn!(task_id = %record.id, kind = %record.kind, error = %e, "Task failed");
                record.fail(e.to_string());
            }
        },
        None => {
            warn!(task_id = %record.id, kind = %record.kind, "No handler for task kind");
            record.fail(format!("no handler for task kind '{}'", record.kind));
        }
    }
    if let Err(e) = store.update(record).await {
        error!(error = %e, "Failed to store task result");
    }
}
