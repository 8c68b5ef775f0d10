use std::time::Duration;

use async_trait::async_trait;

/// Upper bound on messages returned by a single receive call.
pub const MAX_RECEIVE_BATCH: usize = 10;

/// Upper bound on how long a receive call may long-poll.
pub const MAX_RECEIVE_WAIT: Duration = Duration::from_secs(20);

/// Opaque token identifying one delivery of a message. A redelivery gets a new handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeliveryHandle(pub String);

impl std::fmt::Display for DeliveryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Message handed to a consumer by `receive`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub body: String,
    pub handle: DeliveryHandle,
    /// How many times this message has been delivered, including this delivery.
    pub receive_count: u32,
}

/// At-least-once message channel with competing consumers.
///
/// A received message stays invisible to other consumers for the queue's visibility window and
/// reappears if it is not deleted before the window elapses.
#[async_trait]
pub trait NotificationQueue: Send + Sync {
    /// Enqueue a body, returning the queue-assigned message id.
    async fn send(&self, body: String) -> Result<String, QueueError>;

    /// Long-poll for up to `max_batch` messages, waiting at most `wait` when the queue is empty.
    /// An empty vector means the wait elapsed without traffic.
    async fn receive(
        &self,
        max_batch: usize,
        wait: Duration,
    ) -> Result<Vec<ReceivedMessage>, QueueError>;

    /// Acknowledge a delivery, removing the message for good.
    async fn delete(&self, handle: &DeliveryHandle) -> Result<(), QueueError>;
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("delivery handle '{0}' is unknown or expired")]
    InvalidHandle(DeliveryHandle),
    #[error("queue transport failed: {0}")]
    Transport(String),
}
