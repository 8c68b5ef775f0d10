//! Long-running consumer draining the application notification queue.
//!
//! Each iteration moves through `Idle → Receiving → Processing → Acknowledging → Idle`. The loop
//! checks its cancellation token before every receive and races the long-poll (and any retry
//! delay) against it, so shutdown never waits longer than one receive wait.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::message::{MessageCodecError, NotificationMessage};
use super::notifier::{NotifyError, Notifier};
use super::queue::{NotificationQueue, ReceivedMessage, MAX_RECEIVE_BATCH, MAX_RECEIVE_WAIT};

/// Pause between polls when the configured receive wait is zero.
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// When a received message is deleted from the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AckPolicy {
    /// Delete every received message after attempting to process it, whatever the outcome.
    /// Failed notifications are therefore dropped.
    #[default]
    Always,
    /// Delete only after the notifier succeeds. Failures reappear once the visibility window
    /// lapses, so the notifier must tolerate duplicates.
    OnSuccess,
}

impl AckPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "always" => Some(Self::Always),
            "on_success" | "on-success" | "onsuccess" => Some(Self::OnSuccess),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            AckPolicy::Always => "always",
            AckPolicy::OnSuccess => "on_success",
        }
    }
}

/// Delay schedule applied after consecutive receive failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBackoff {
    pub initial: Duration,
    pub max: Duration,
}

impl RetryBackoff {
    pub const fn exponential(initial: Duration, max: Duration) -> Self {
        Self { initial, max }
    }

    /// Retry straight away with no delay.
    pub const fn immediate() -> Self {
        Self {
            initial: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    /// Delay before the retry that follows the `failures`-th consecutive failure.
    pub fn delay(&self, failures: u32) -> Duration {
        if failures == 0 || self.initial.is_zero() {
            return Duration::ZERO;
        }
        let factor = 1u32
            .checked_shl(failures.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial.saturating_mul(factor).min(self.max)
    }
}

impl Default for RetryBackoff {
    fn default() -> Self {
        Self::exponential(Duration::from_millis(200), Duration::from_secs(30))
    }
}

/// Configuration for one notification worker instance.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub name: String,
    /// Messages requested per receive, clamped to `1..=10`.
    pub batch_size: usize,
    /// Long-poll wait per receive, capped at 20 seconds.
    pub wait_time: Duration,
    pub ack_policy: AckPolicy,
    /// Delivery count at which a failing message is dead-lettered (`OnSuccess` only).
    pub max_receives: Option<u32>,
    pub retry: RetryBackoff,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name: "notification-worker".to_string(),
            batch_size: MAX_RECEIVE_BATCH,
            wait_time: MAX_RECEIVE_WAIT,
            ack_policy: AckPolicy::Always,
            max_receives: None,
            retry: RetryBackoff::default(),
        }
    }
}

impl WorkerConfig {
    fn normalized(mut self) -> Self {
        self.batch_size = self.batch_size.clamp(1, MAX_RECEIVE_BATCH);
        self.wait_time = self.wait_time.min(MAX_RECEIVE_WAIT);
        self.max_receives = self.max_receives.map(|max| max.max(1));
        self
    }
}

/// Observable position of the worker loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkerState {
    Idle,
    Receiving,
    Processing { batch: usize },
    Acknowledging,
    Stopped,
}

#[derive(Debug, Default)]
struct Counters {
    received: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    acknowledged: AtomicU64,
    dead_lettered: AtomicU64,
    receive_errors: AtomicU64,
    ack_errors: AtomicU64,
}

/// Shared counters for a worker; cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct WorkerStats {
    counters: Arc<Counters>,
}

/// Point-in-time copy of [`WorkerStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct WorkerStatsSnapshot {
    pub received: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub acknowledged: u64,
    pub dead_lettered: u64,
    pub receive_errors: u64,
    pub ack_errors: u64,
}

impl WorkerStats {
    pub fn snapshot(&self) -> WorkerStatsSnapshot {
        let c = &self.counters;
        WorkerStatsSnapshot {
            received: c.received.load(Ordering::Relaxed),
            succeeded: c.succeeded.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            acknowledged: c.acknowledged.load(Ordering::Relaxed),
            dead_lettered: c.dead_lettered.load(Ordering::Relaxed),
            receive_errors: c.receive_errors.load(Ordering::Relaxed),
            ack_errors: c.ack_errors.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }
}

/// Reason a single message could not be processed.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error(transparent)]
    Decode(#[from] MessageCodecError),
    #[error(transparent)]
    Notify(#[from] NotifyError),
}

/// Queue consumer with injected queue, notifier, and (optionally) dead-letter queue.
pub struct NotificationWorker<Q, N> {
    config: WorkerConfig,
    queue: Arc<Q>,
    notifier: Arc<N>,
    dead_letters: Option<Arc<dyn NotificationQueue>>,
    stats: WorkerStats,
    state: watch::Sender<WorkerState>,
}

impl<Q, N> NotificationWorker<Q, N>
where
    Q: NotificationQueue + 'static,
    N: Notifier + 'static,
{
    pub fn new(config: WorkerConfig, queue: Arc<Q>, notifier: Arc<N>) -> Self {
        let (state, _) = watch::channel(WorkerState::Idle);
        Self {
            config: config.normalized(),
            queue,
            notifier,
            dead_letters: None,
            stats: WorkerStats::default(),
            state,
        }
    }

    /// Route messages that keep failing to `queue` once they reach `max_receives` deliveries.
    pub fn with_dead_letter_queue(mut self, queue: Arc<dyn NotificationQueue>) -> Self {
        self.dead_letters = Some(queue);
        self
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats.clone()
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    /// Run the worker on its own task until `cancel` fires.
    pub fn spawn(self, cancel: CancellationToken) -> WorkerHandle {
        let stats = self.stats();
        let state = self.subscribe();
        let token = cancel.clone();
        let join = tokio::spawn(async move { self.run(token).await });
        WorkerHandle {
            cancel,
            join,
            stats,
            state,
        }
    }

    /// Drain the queue until `cancel` fires. No dependency failure ends the loop.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            worker = %self.config.name,
            batch_size = self.config.batch_size,
            wait_secs = self.config.wait_time.as_secs(),
            ack_policy = self.config.ack_policy.label(),
            "notification worker started"
        );
        if self.config.ack_policy == AckPolicy::Always && self.config.max_receives.is_some() {
            warn!(
                worker = %self.config.name,
                "max_receives only applies to the on_success ack policy; ignoring it"
            );
        }

        let mut consecutive_failures: u32 = 0;
        while !cancel.is_cancelled() {
            self.set_state(WorkerState::Receiving);
            let received = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.queue.receive(self.config.batch_size, self.config.wait_time) => result,
            };

            let batch = match received {
                Ok(batch) => {
                    consecutive_failures = 0;
                    batch
                }
                Err(err) => {
                    WorkerStats::bump(&self.stats.counters.receive_errors, 1);
                    consecutive_failures = consecutive_failures.saturating_add(1);
                    let delay = self.config.retry.delay(consecutive_failures);
                    warn!(
                        worker = %self.config.name,
                        error = %err,
                        consecutive_failures,
                        retry_in_ms = delay.as_millis() as u64,
                        "failed to receive notifications"
                    );
                    self.set_state(WorkerState::Idle);
                    if !delay.is_zero() {
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                    continue;
                }
            };

            if batch.is_empty() {
                debug!(worker = %self.config.name, "no notifications received");
                self.set_state(WorkerState::Idle);
                if self.config.wait_time.is_zero() {
                    // A zero-wait receive on an idle queue returns without suspending.
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(IDLE_POLL_INTERVAL) => {}
                    }
                } else {
                    tokio::task::yield_now().await;
                }
                continue;
            }

            self.drain_batch(&batch).await;
            self.set_state(WorkerState::Idle);
        }

        self.set_state(WorkerState::Stopped);
        info!(worker = %self.config.name, "notification worker stopped");
    }

    async fn drain_batch(&self, batch: &[ReceivedMessage]) {
        WorkerStats::bump(&self.stats.counters.received, batch.len() as u64);
        self.set_state(WorkerState::Processing { batch: batch.len() });

        let outcomes = join_all(batch.iter().map(|message| self.process(message))).await;

        self.set_state(WorkerState::Acknowledging);
        join_all(
            batch
                .iter()
                .zip(outcomes)
                .map(|(message, outcome)| self.settle(message, outcome)),
        )
        .await;
    }

    async fn process(&self, received: &ReceivedMessage) -> Result<(), ProcessingError> {
        let message = NotificationMessage::decode(&received.body)?;
        self.notifier.notify(&message).await?;
        debug!(
            worker = %self.config.name,
            message_id = %message.message_id,
            job_id = %message.job_id,
            "notification delivered"
        );
        Ok(())
    }

    async fn settle(&self, message: &ReceivedMessage, outcome: Result<(), ProcessingError>) {
        let failed = match outcome {
            Ok(()) => {
                WorkerStats::bump(&self.stats.counters.succeeded, 1);
                false
            }
            Err(err) => {
                WorkerStats::bump(&self.stats.counters.failed, 1);
                error!(
                    worker = %self.config.name,
                    handle = %message.handle,
                    receive_count = message.receive_count,
                    error = %err,
                    "failed to process notification"
                );
                true
            }
        };

        match self.config.ack_policy {
            AckPolicy::Always => self.acknowledge(message).await,
            AckPolicy::OnSuccess if !failed => self.acknowledge(message).await,
            AckPolicy::OnSuccess => {
                if self.exhausted(message) {
                    self.dead_letter(message).await;
                } else {
                    debug!(
                        worker = %self.config.name,
                        handle = %message.handle,
                        "leaving failed notification for redelivery"
                    );
                }
            }
        }
    }

    fn exhausted(&self, message: &ReceivedMessage) -> bool {
        self.dead_letters.is_some()
            && self
                .config
                .max_receives
                .is_some_and(|max| message.receive_count >= max)
    }

    async fn dead_letter(&self, message: &ReceivedMessage) {
        let Some(dead_letters) = &self.dead_letters else {
            return;
        };

        match dead_letters.send(message.body.clone()).await {
            Ok(_) => {
                WorkerStats::bump(&self.stats.counters.dead_lettered, 1);
                warn!(
                    worker = %self.config.name,
                    receive_count = message.receive_count,
                    "moved notification to dead-letter queue"
                );
                self.acknowledge(message).await;
            }
            Err(err) => {
                error!(
                    worker = %self.config.name,
                    error = %err,
                    "failed to dead-letter notification; leaving it for redelivery"
                );
            }
        }
    }

    async fn acknowledge(&self, message: &ReceivedMessage) {
        match self.queue.delete(&message.handle).await {
            Ok(()) => WorkerStats::bump(&self.stats.counters.acknowledged, 1),
            Err(err) => {
                WorkerStats::bump(&self.stats.counters.ack_errors, 1);
                warn!(
                    worker = %self.config.name,
                    handle = %message.handle,
                    error = %err,
                    "failed to delete notification"
                );
            }
        }
    }

    fn set_state(&self, state: WorkerState) {
        self.state.send_replace(state);
    }
}

/// Handle for a worker running on its own task.
pub struct WorkerHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
    stats: WorkerStats,
    state: watch::Receiver<WorkerState>,
}

impl WorkerHandle {
    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Signal cancellation and wait for the loop to finish its current iteration.
    pub async fn stop(self) -> Result<WorkerStatsSnapshot, JoinError> {
        self.cancel.cancel();
        self.join.await?;
        Ok(self.stats.snapshot())
    }

    /// Wait for the loop to exit after the shared token was cancelled elsewhere.
    pub async fn join(self) -> Result<WorkerStatsSnapshot, JoinError> {
        self.join.await?;
        Ok(self.stats.snapshot())
    }
}
