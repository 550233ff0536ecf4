//! Queued publisher with a background delivery task.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use trading_core::events::Event;
use trading_core::traits::{EventListener, EventPublisher, ListenerId};

use super::ListenerSet;

pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Hands events to a bounded queue drained by a tokio task.
///
/// `publish` never waits: when `capacity` events are already queued a routine
/// event is dropped and counted. Essential events (errors, final statistics,
/// the strategy stop) are always queued, past the capacity if need be.
/// Listeners receive events in publish order, in batches of at most
/// `batch_size`.
pub struct AsyncEventPublisher {
    listeners: Arc<ListenerSet>,
    sender: Mutex<Option<mpsc::UnboundedSender<Event>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    /// Events sent but not yet taken by the delivery task
    queued: Arc<AtomicUsize>,
    capacity: usize,
    closed: AtomicBool,
    dropped: AtomicU64,
}

impl AsyncEventPublisher {
    /// Spawns the delivery task; must be called inside a tokio runtime.
    pub fn new(capacity: usize, batch_size: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let listeners = Arc::new(ListenerSet::default());
        let queued = Arc::new(AtomicUsize::new(0));
        let worker = tokio::spawn(drain(rx, listeners.clone(), queued.clone(), batch_size.max(1)));
        Self {
            listeners,
            sender: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            queued,
            capacity: capacity.max(1),
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        }
    }

    /// Events discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Reserve a queue slot. Essential events always get one.
    fn admit(&self, event: &Event) -> bool {
        if event.is_essential() {
            self.queued.fetch_add(1, Ordering::AcqRel);
            return true;
        }
        self.queued
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < self.capacity).then_some(n + 1))
            .is_ok()
    }

    /// Close the queue and wait for the delivery task to finish what was
    /// already queued.
    pub async fn drained(&self) {
        self.shutdown();
        let worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                warn!(error = %e, "Event delivery task ended abnormally");
            }
        }
    }
}

impl Default for AsyncEventPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY, DEFAULT_BATCH_SIZE)
    }
}

async fn drain(
    mut rx: mpsc::UnboundedReceiver<Event>,
    listeners: Arc<ListenerSet>,
    queued: Arc<AtomicUsize>,
    batch_size: usize,
) {
    let mut batch = Vec::with_capacity(batch_size);
    while let Some(first) = rx.recv().await {
        batch.push(first);
        while batch.len() < batch_size {
            match rx.try_recv() {
                Ok(event) => batch.push(event),
                Err(_) => break,
            }
        }
        queued.fetch_sub(batch.len(), Ordering::AcqRel);
        listeners.deliver(&batch);
        batch.clear();
    }
    debug!("Event queue closed");
}

impl EventPublisher for AsyncEventPublisher {
    fn add_listener(&self, listener: Arc<dyn EventListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    fn publish(&self, event: Event) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = sender.as_ref() else {
            return;
        };
        if !self.admit(&event) {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(
                strategy_id = %event.strategy_id,
                event_type = event.type_tag(),
                dropped,
                "Event queue full, dropping event"
            );
            return;
        }
        if tx.send(event).is_err() {
            self.queued.fetch_sub(1, Ordering::AcqRel);
        }
    }

    fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        self.sender.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{CollectingListener, PanickingListener};
    use super::*;
    use chrono::Utc;
    use trading_core::error::TradingError;
    use trading_core::events::LogLevel;
    use trading_core::types::StopReason;

    fn log(message: &str) -> Event {
        Event::log("s-1", LogLevel::Info, message, Utc::now())
    }

    #[tokio::test]
    async fn test_delivers_in_order_after_drain() {
        let publisher = AsyncEventPublisher::new(64, 4);
        publisher.add_listener(Arc::new(PanickingListener));
        let collector = Arc::new(CollectingListener::default());
        publisher.add_listener(collector.clone());

        for i in 0..10 {
            publisher.publish(log(&format!("m{}", i)));
        }
        publisher.publish(Event::strategy_stop("s-1", StopReason::Completed, Utc::now()));
        publisher.drained().await;

        let tags = collector.tags();
        assert_eq!(tags.len(), 11);
        assert_eq!(tags.last(), Some(&"strategy_stop"));
        assert_eq!(publisher.dropped(), 0);
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        // The current-thread runtime does not run the worker until we yield.
        let publisher = AsyncEventPublisher::new(2, 8);
        let collector = Arc::new(CollectingListener::default());
        publisher.add_listener(collector.clone());

        for i in 0..5 {
            publisher.publish(log(&format!("m{}", i)));
        }
        assert_eq!(publisher.dropped(), 3);

        publisher.drained().await;
        assert_eq!(collector.count(), 2);
    }

    #[tokio::test]
    async fn test_full_queue_keeps_essential_events() {
        let publisher = AsyncEventPublisher::new(2, 8);
        let collector = Arc::new(CollectingListener::default());
        publisher.add_listener(collector.clone());

        for i in 0..5 {
            publisher.publish(log(&format!("m{}", i)));
        }
        let err = TradingError::Internal("feed lost".into());
        publisher.publish(Event::error("s-1", &err, Utc::now()));
        publisher.publish(log("after error"));
        publisher.publish(Event::strategy_stop("s-1", StopReason::Failed(err.to_string()), Utc::now()));
        assert_eq!(publisher.dropped(), 4);

        publisher.drained().await;
        assert_eq!(collector.tags(), vec!["log", "log", "error", "strategy_stop"]);
    }

    #[tokio::test]
    async fn test_slots_free_up_as_worker_drains() {
        let publisher = AsyncEventPublisher::new(2, 8);
        let collector = Arc::new(CollectingListener::default());
        publisher.add_listener(collector.clone());

        publisher.publish(log("a"));
        publisher.publish(log("b"));
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        publisher.publish(log("c"));
        publisher.drained().await;

        assert_eq!(publisher.dropped(), 0);
        assert_eq!(collector.count(), 3);
    }

    #[tokio::test]
    async fn test_publish_after_shutdown_is_silent() {
        let publisher = AsyncEventPublisher::default();
        let collector = Arc::new(CollectingListener::default());
        publisher.add_listener(collector.clone());

        publisher.shutdown();
        publisher.publish(log("late"));
        publisher.drained().await;

        assert_eq!(collector.count(), 0);
        assert_eq!(publisher.dropped(), 0);
    }
}
