//! Event publishers.
//!
//! Both publishers share one listener registry. Delivery takes a snapshot of
//! the registered listeners, so listeners may be added or removed while a
//! delivery is in progress.

mod queued;
mod sync;

pub use queued::{AsyncEventPublisher, DEFAULT_BATCH_SIZE, DEFAULT_QUEUE_CAPACITY};
pub use sync::SyncEventPublisher;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{error, warn};
use trading_core::events::Event;
use trading_core::traits::{EventListener, ListenerError, ListenerId};

type Registered = (ListenerId, Arc<dyn EventListener>);

#[derive(Default)]
pub(crate) struct ListenerSet {
    next_id: AtomicU64,
    listeners: RwLock<Vec<Registered>>,
}

impl ListenerSet {
    pub(crate) fn add(&self, listener: Arc<dyn EventListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(registered, _)| *registered != id);
        listeners.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn snapshot(&self) -> Vec<Registered> {
        self.listeners.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Deliver `events` to every listener in registration order. A failing or
    /// panicking listener is logged and skipped.
    pub(crate) fn deliver(&self, events: &[Event]) {
        if events.is_empty() {
            return;
        }
        for (id, listener) in self.snapshot() {
            let result = catch_unwind(AssertUnwindSafe(|| match events {
                [event] => listener.on_event(event),
                batch => listener.on_batch(batch),
            }));
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log_failure(id, &e, events),
                Err(_) => error!(listener = %id, events = events.len(), "Event listener panicked"),
            }
        }
    }
}

fn log_failure(id: ListenerId, err: &ListenerError, events: &[Event]) {
    warn!(
        listener = %id,
        error = %err,
        first_event = events.first().map(|e| e.type_tag()).unwrap_or_default(),
        "Event listener failed"
    );
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Records the type tag of every event it receives.
    #[derive(Default)]
    pub struct CollectingListener {
        seen: Mutex<Vec<Event>>,
    }

    impl CollectingListener {
        pub fn tags(&self) -> Vec<&'static str> {
            self.seen.lock().unwrap().iter().map(|e| e.type_tag()).collect()
        }

        pub fn count(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    impl EventListener for CollectingListener {
        fn on_event(&self, event: &Event) -> Result<(), ListenerError> {
            self.seen.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    pub struct FailingListener;

    impl EventListener for FailingListener {
        fn on_event(&self, _event: &Event) -> Result<(), ListenerError> {
            Err(ListenerError::Rejected("always".into()))
        }
    }

    pub struct PanickingListener;

    impl EventListener for PanickingListener {
        fn on_event(&self, _event: &Event) -> Result<(), ListenerError> {
            panic!("listener bug");
        }
    }
}
