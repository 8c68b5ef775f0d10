use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{debug, info};

use super::message::{NotificationId, NotificationMessage};

/// Outbound side effect performed for every decoded notification.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &NotificationMessage) -> Result<(), NotifyError>;
}

/// Notification dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
    #[error("notification rejected: {0}")]
    Rejected(String),
}

/// Notifier that announces new applications through the tracing pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify(&self, message: &NotificationMessage) -> Result<(), NotifyError> {
        info!(
            message_id = %message.message_id,
            job_id = %message.job_id,
            application_id = %message.application_id,
            candidate = %message.candidate_name,
            "{}",
            message.summary()
        );
        Ok(())
    }
}

/// Wraps a notifier so a message id is delivered at most once per process.
///
/// Remembers the most recent `capacity` delivered ids. An id is only recorded after the inner
/// notifier succeeds, so a failed attempt can be retried on redelivery.
pub struct DedupNotifier<N> {
    inner: N,
    capacity: usize,
    seen: Mutex<SeenIds>,
}

#[derive(Default)]
struct SeenIds {
    order: VecDeque<NotificationId>,
    ids: HashSet<NotificationId>,
}

impl SeenIds {
    fn remember(&mut self, id: NotificationId, capacity: usize) {
        if !self.ids.insert(id) {
            return;
        }
        self.order.push_back(id);
        while self.order.len() > capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.ids.remove(&evicted);
            }
        }
    }
}

impl<N> DedupNotifier<N> {
    pub const DEFAULT_CAPACITY: usize = 10_000;

    pub fn new(inner: N) -> Self {
        Self::with_capacity(inner, Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(inner: N, capacity: usize) -> Self {
        Self {
            inner,
            capacity: capacity.max(1),
            seen: Mutex::new(SeenIds::default()),
        }
    }

    pub fn inner(&self) -> &N {
        &self.inner
    }

    fn already_delivered(&self, id: &NotificationId) -> Result<bool, NotifyError> {
        self.seen
            .lock()
            .map(|seen| seen.ids.contains(id))
            .map_err(|_| NotifyError::Transport("dedupe state poisoned".to_string()))
    }
}

#[async_trait]
impl<N> Notifier for DedupNotifier<N>
where
    N: Notifier,
{
    async fn notify(&self, message: &NotificationMessage) -> Result<(), NotifyError> {
        if self.already_delivered(&message.message_id)? {
            debug!(message_id = %message.message_id, "skipping duplicate notification");
            return Ok(());
        }

        self.inner.notify(message).await?;

        self.seen
            .lock()
            .map_err(|_| NotifyError::Transport("dedupe state poisoned".to_string()))?
            .remember(message.message_id, self.capacity);
        Ok(())
    }
}
