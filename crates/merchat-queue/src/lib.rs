pub mod error;
pub mod queue;

pub use error::{QueueError, Result};
pub use queue::{bounded, QueueConsumer, QueueItem, QueueProducer};
