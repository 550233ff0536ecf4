//! Registry of active runs keyed by strategy id.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;
use tracing::info;
use trading_core::types::StopReason;

use crate::executor::ExecutorHandle;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("a run with strategy id '{0}' is already registered")]
    Duplicate(String),

    #[error("no run registered for strategy id '{0}'")]
    NotFound(String),
}

/// Handles of the runs owned by one orchestration layer.
///
/// The registry is passed around explicitly; it never owns the executors,
/// only their control handles.
#[derive(Debug, Default)]
pub struct RunRegistry {
    runs: RwLock<HashMap<String, ExecutorHandle>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handle: ExecutorHandle) -> Result<(), RegistryError> {
        let mut runs = self.runs.write().unwrap_or_else(PoisonError::into_inner);
        let id = handle.strategy_id().to_string();
        if runs.contains_key(&id) {
            return Err(RegistryError::Duplicate(id));
        }
        info!(strategy_id = %id, "Run registered");
        runs.insert(id, handle);
        Ok(())
    }

    pub fn get(&self, strategy_id: &str) -> Option<ExecutorHandle> {
        self.runs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(strategy_id)
            .cloned()
    }

    pub fn remove(&self, strategy_id: &str) -> Option<ExecutorHandle> {
        self.runs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(strategy_id)
    }

    /// Registered strategy ids, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .runs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.runs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop one run. The handle stays registered until removed.
    pub async fn stop(&self, strategy_id: &str, reason: StopReason) -> Result<(), RegistryError> {
        let handle = self
            .get(strategy_id)
            .ok_or_else(|| RegistryError::NotFound(strategy_id.to_string()))?;
        handle.stop(reason).await;
        Ok(())
    }

    /// Stop every registered run. Returns how many were asked to stop.
    pub async fn stop_all(&self, reason: StopReason) -> usize {
        let handles: Vec<ExecutorHandle> = self
            .runs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for handle in &handles {
            handle.stop(reason.clone()).await;
        }
        handles.len()
    }
}
