//! Inline publisher.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use trading_core::events::Event;
use trading_core::traits::{EventListener, EventPublisher, ListenerId};

use super::ListenerSet;

/// Delivers each event on the publishing thread before `publish` returns.
#[derive(Default)]
pub struct SyncEventPublisher {
    listeners: ListenerSet,
    closed: AtomicBool,
}

impl SyncEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl EventPublisher for SyncEventPublisher {
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
        self.listeners.deliver(std::slice::from_ref(&event));
    }

    fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{CollectingListener, FailingListener, PanickingListener};
    use super::*;
    use chrono::Utc;
    use trading_core::error::{DataError, TradingError};
    use trading_core::events::LogLevel;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{OnceLock, Weak};
    use trading_core::traits::ListenerError;
    use trading_core::types::StopReason;

    fn log(message: &str) -> Event {
        Event::log("s-1", LogLevel::Info, message, Utc::now())
    }

    #[test]
    fn test_faulty_listeners_do_not_block_delivery() {
        let publisher = SyncEventPublisher::new();
        publisher.add_listener(Arc::new(FailingListener));
        publisher.add_listener(Arc::new(PanickingListener));
        let collector = Arc::new(CollectingListener::default());
        publisher.add_listener(collector.clone());

        publisher.publish(log("a"));
        publisher.publish_error("s-1", &TradingError::from(DataError::NoDataAvailable), Utc::now());
        publisher.publish(Event::strategy_stop("s-1", StopReason::Completed, Utc::now()));

        assert_eq!(collector.tags(), vec!["log", "error", "strategy_stop"]);
    }

    #[test]
    fn test_remove_listener_and_shutdown() {
        let publisher = SyncEventPublisher::new();
        let first = Arc::new(CollectingListener::default());
        let second = Arc::new(CollectingListener::default());
        let first_id = publisher.add_listener(first.clone());
        publisher.add_listener(second.clone());
        assert_eq!(publisher.listener_count(), 2);

        publisher.publish(log("both"));
        assert!(publisher.remove_listener(first_id));
        assert!(!publisher.remove_listener(first_id));
        publisher.publish(log("second only"));
        publisher.shutdown();
        publisher.publish(log("dropped"));

        assert_eq!(first.count(), 1);
        assert_eq!(second.count(), 2);
    }

    /// Swaps itself for `replacement` on the first event it sees.
    struct HandOff {
        publisher: Weak<SyncEventPublisher>,
        own_id: OnceLock<ListenerId>,
        replacement: Arc<CollectingListener>,
        handled: AtomicUsize,
    }

    impl EventListener for HandOff {
        fn on_event(&self, _event: &Event) -> Result<(), ListenerError> {
            self.handled.fetch_add(1, Ordering::SeqCst);
            if let (Some(publisher), Some(id)) = (self.publisher.upgrade(), self.own_id.get()) {
                if publisher.remove_listener(*id) {
                    publisher.add_listener(self.replacement.clone());
                }
            }
            Ok(())
        }
    }

    #[test]
    fn test_listener_can_reregister_during_delivery() {
        let publisher = Arc::new(SyncEventPublisher::new());
        let replacement = Arc::new(CollectingListener::default());
        let hand_off = Arc::new(HandOff {
            publisher: Arc::downgrade(&publisher),
            own_id: OnceLock::new(),
            replacement: replacement.clone(),
            handled: AtomicUsize::new(0),
        });
        let id = publisher.add_listener(hand_off.clone());
        hand_off.own_id.set(id).unwrap();

        publisher.publish(log("first"));
        publisher.publish(log("second"));

        assert_eq!(hand_off.handled.load(Ordering::SeqCst), 1);
        assert_eq!(replacement.count(), 1);
        assert_eq!(publisher.listener_count(), 1);
    }

    #[test]
    fn test_registration_churn_while_publishing() {
        let publisher = SyncEventPublisher::new();
        let steady = Arc::new(CollectingListener::default());
        publisher.add_listener(steady.clone());

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for i in 0..500 {
                    publisher.publish(log(&format!("m{}", i)));
                }
            });
            scope.spawn(|| {
                for _ in 0..200 {
                    let id = publisher.add_listener(Arc::new(CollectingListener::default()));
                    assert!(publisher.remove_listener(id));
                }
            });
        });

        assert_eq!(steady.count(), 500);
        assert_eq!(publisher.listener_count(), 1);
    }
}
