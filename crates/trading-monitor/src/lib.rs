//! Event publication, wire framing and logging setup.

mod logging;
mod publisher;
pub mod wire;

pub use logging::setup_logging;
pub use publisher::{AsyncEventPublisher, SyncEventPublisher, DEFAULT_BATCH_SIZE, DEFAULT_QUEUE_CAPACITY};
