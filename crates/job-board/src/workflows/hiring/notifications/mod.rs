//! Asynchronous "new application" notifications: wire schema, queue contract, and consumer.

pub mod memory;
pub mod message;
pub mod notifier;
pub mod queue;
pub mod worker;

pub use memory::InMemoryQueue;
pub use message::{MessageCodecError, NotificationId, NotificationMessage};
pub use notifier::{DedupNotifier, LoggingNotifier, NotifyError, Notifier};
pub use queue::{
    DeliveryHandle, NotificationQueue, QueueError, ReceivedMessage, MAX_RECEIVE_BATCH,
    MAX_RECEIVE_WAIT,
};
pub use worker::{
    AckPolicy, NotificationWorker, ProcessingError, RetryBackoff, WorkerConfig, WorkerHandle,
    WorkerState, WorkerStats, WorkerStatsSnapshot,
};
