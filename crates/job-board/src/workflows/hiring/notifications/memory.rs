use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;
use uuid::Uuid;

use super::queue::{DeliveryHandle, NotificationQueue, QueueError, ReceivedMessage, MAX_RECEIVE_BATCH};

/// In-process queue honoring the delivery lease contract of a hosted message queue.
///
/// Every receive leases the returned messages for `visibility_timeout` under a fresh handle.
/// Leased messages are skipped by other receivers until the lease lapses, after which they are
/// delivered again with an incremented receive count. Only the handle of the most recent
/// delivery can delete a message.
#[derive(Debug)]
pub struct InMemoryQueue {
    visibility_timeout: Duration,
    state: Mutex<QueueState>,
    arrivals: Notify,
}

#[derive(Debug, Default)]
struct QueueState {
    next_id: u64,
    entries: VecDeque<Entry>,
}

#[derive(Debug)]
struct Entry {
    id: String,
    body: String,
    receive_count: u32,
    lease: Option<Lease>,
}

#[derive(Debug)]
struct Lease {
    handle: DeliveryHandle,
    expires_at: Instant,
}

impl Entry {
    fn is_visible(&self, now: Instant) -> bool {
        self.lease
            .as_ref()
            .map_or(true, |lease| lease.expires_at <= now)
    }
}

impl QueueState {
    fn lease_visible(
        &mut self,
        max_batch: usize,
        now: Instant,
        visibility_timeout: Duration,
    ) -> Vec<ReceivedMessage> {
        let mut batch = Vec::new();
        for entry in self.entries.iter_mut() {
            if batch.len() == max_batch {
                break;
            }
            if !entry.is_visible(now) {
                continue;
            }

            let handle = DeliveryHandle(format!("{}:{}", entry.id, Uuid::new_v4()));
            entry.receive_count += 1;
            entry.lease = Some(Lease {
                handle: handle.clone(),
                expires_at: now + visibility_timeout,
            });
            batch.push(ReceivedMessage {
                body: entry.body.clone(),
                handle,
                receive_count: entry.receive_count,
            });
        }
        batch
    }

    fn next_lease_expiry(&self, now: Instant) -> Option<Instant> {
        self.entries
            .iter()
            .filter_map(|entry| entry.lease.as_ref())
            .map(|lease| lease.expires_at)
            .filter(|expires_at| *expires_at > now)
            .min()
    }
}

impl InMemoryQueue {
    pub fn new(visibility_timeout: Duration) -> Self {
        Self {
            visibility_timeout,
            state: Mutex::new(QueueState::default()),
            arrivals: Notify::new(),
        }
    }

    pub fn visibility_timeout(&self) -> Duration {
        self.visibility_timeout
    }

    /// Messages not yet deleted, leased or not.
    pub fn len(&self) -> usize {
        self.lock().map(|state| state.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Messages currently leased to a consumer.
    pub fn in_flight(&self) -> usize {
        let now = Instant::now();
        self.lock()
            .map(|state| {
                state
                    .entries
                    .iter()
                    .filter(|entry| !entry.is_visible(now))
                    .count()
            })
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, QueueState>, QueueError> {
        self.state
            .lock()
            .map_err(|_| QueueError::Transport("queue state poisoned".to_string()))
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl NotificationQueue for InMemoryQueue {
    async fn send(&self, body: String) -> Result<String, QueueError> {
        let id = {
            let mut state = self.lock()?;
            state.next_id += 1;
            let id = format!("msg-{:06}", state.next_id);
            state.entries.push_back(Entry {
                id: id.clone(),
                body,
                receive_count: 0,
                lease: None,
            });
            id
        };
        self.arrivals.notify_waiters();
        Ok(id)
    }

    async fn receive(
        &self,
        max_batch: usize,
        wait: Duration,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        let max_batch = max_batch.clamp(1, MAX_RECEIVE_BATCH);
        let deadline = Instant::now() + wait;

        loop {
            // Registered before inspecting the state so a send racing this check still wakes us.
            let arrival = self.arrivals.notified();
            tokio::pin!(arrival);
            arrival.as_mut().enable();

            let now = Instant::now();
            let next_expiry = {
                let mut state = self.lock()?;
                let batch = state.lease_visible(max_batch, now, self.visibility_timeout);
                if !batch.is_empty() {
                    return Ok(batch);
                }
                state.next_lease_expiry(now)
            };

            if now >= deadline {
                return Ok(Vec::new());
            }

            let wake_at = next_expiry.map_or(deadline, |expiry| expiry.min(deadline));
            let _ = tokio::time::timeout_at(wake_at, arrival).await;
        }
    }

    async fn delete(&self, handle: &DeliveryHandle) -> Result<(), QueueError> {
        let mut state = self.lock()?;
        let position = state.entries.iter().position(|entry| {
            entry
                .lease
                .as_ref()
                .is_some_and(|lease| &lease.handle == handle)
        });

        match position {
            Some(index) => {
                state.entries.remove(index);
                Ok(())
            }
            None => Err(QueueError::InvalidHandle(handle.clone())),
        }
    }
}
