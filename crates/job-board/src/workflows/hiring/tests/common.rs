use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::workflows::hiring::domain::{
    ApplicationId, ApplicationSubmission, Job, JobApplication, JobId, JobPosting, ResumeKey,
};
use crate::workflows::hiring::notifications::{
    DeliveryHandle, NotificationId, NotificationMessage, NotificationQueue, Notifier, NotifyError,
    QueueError, ReceivedMessage,
};
use crate::workflows::hiring::repository::{RecordStore, RepositoryError};
use crate::workflows::hiring::storage::{BlobError, BlobStore, StoredObject};
use crate::workflows::hiring::JobBoardService;

pub(super) type TestService = JobBoardService<MemoryStore, MemoryBlobs, RecordingQueue>;

pub(super) fn job_posting() -> JobPosting {
    JobPosting {
        title: "Platform Engineer".to_string(),
        description: "Own the queue consumers".to_string(),
        company: "Northwind".to_string(),
        min_salary: 7000,
        max_salary: 11000,
    }
}

pub(super) fn submission() -> ApplicationSubmission {
    ApplicationSubmission {
        candidate_name: "Ada Lovelace".to_string(),
        candidate_email: "ada@example.com".to_string(),
    }
}

pub(super) fn submission_for(name: &str) -> ApplicationSubmission {
    ApplicationSubmission {
        candidate_name: name.to_string(),
        candidate_email: format!("{}@example.com", name.to_ascii_lowercase()),
    }
}

pub(super) fn build_service() -> (
    TestService,
    Arc<MemoryStore>,
    Arc<MemoryBlobs>,
    Arc<RecordingQueue>,
) {
    build_service_with_queue(RecordingQueue::default())
}

pub(super) fn build_service_with_queue(
    queue: RecordingQueue,
) -> (
    TestService,
    Arc<MemoryStore>,
    Arc<MemoryBlobs>,
    Arc<RecordingQueue>,
) {
    let store = Arc::new(MemoryStore::default());
    let blobs = Arc::new(MemoryBlobs::default());
    let queue = Arc::new(queue);
    let service = JobBoardService::new(store.clone(), blobs.clone(), queue.clone());
    (service, store, blobs, queue)
}

pub(super) fn notification(name: &str) -> NotificationMessage {
    NotificationMessage {
        message_id: NotificationId::generate(),
        job_id: JobId("job-1".to_string()),
        application_id: ApplicationId(format!("app-{}", name.to_ascii_lowercase())),
        candidate_name: name.to_string(),
        candidate_email: format!("{}@example.com", name.to_ascii_lowercase()),
    }
}

pub(super) fn delivery(message: &NotificationMessage, receive_count: u32) -> ReceivedMessage {
    ReceivedMessage {
        body: message.encode().expect("encodes"),
        handle: DeliveryHandle(format!("rh-{}-{receive_count}", message.candidate_name)),
        receive_count,
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

#[derive(Default)]
pub(super) struct MemoryStore {
    jobs: Mutex<BTreeMap<JobId, Job>>,
    applications: Mutex<BTreeMap<ApplicationId, JobApplication>>,
}

impl MemoryStore {
    pub(super) fn applications(&self) -> Vec<JobApplication> {
        self.applications
            .lock()
            .expect("store mutex poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub(super) fn job_count(&self) -> usize {
        self.jobs.lock().expect("store mutex poisoned").len()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert_job(&self, job: Job) -> Result<Job, RepositoryError> {
        let mut jobs = self.jobs.lock().expect("store mutex poisoned");
        if jobs.contains_key(&job.id) {
            return Err(RepositoryError::Conflict);
        }
        jobs.insert(job.id.clone(), job.clone());
        Ok(job)
    }

    async fn fetch_job(&self, id: &JobId) -> Result<Option<Job>, RepositoryError> {
        Ok(self.jobs.lock().expect("store mutex poisoned").get(id).cloned())
    }

    async fn list_jobs(&self) -> Result<Vec<Job>, RepositoryError> {
        Ok(self
            .jobs
            .lock()
            .expect("store mutex poisoned")
            .values()
            .cloned()
            .collect())
    }

    async fn insert_application(
        &self,
        application: JobApplication,
    ) -> Result<JobApplication, RepositoryError> {
        let mut applications = self.applications.lock().expect("store mutex poisoned");
        if applications.contains_key(&application.id) {
            return Err(RepositoryError::Conflict);
        }
        applications.insert(application.id.clone(), application.clone());
        Ok(application)
    }

    async fn fetch_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<JobApplication>, RepositoryError> {
        Ok(self
            .applications
            .lock()
            .expect("store mutex poisoned")
            .get(id)
            .cloned())
    }

    async fn applications_for_job(
        &self,
        job_id: &JobId,
    ) -> Result<Vec<JobApplication>, RepositoryError> {
        Ok(self
            .applications
            .lock()
            .expect("store mutex poisoned")
            .values()
            .filter(|application| &application.job_id == job_id)
            .cloned()
            .collect())
    }

    async fn set_resume_key(
        &self,
        id: &ApplicationId,
        key: ResumeKey,
    ) -> Result<JobApplication, RepositoryError> {
        let mut applications = self.applications.lock().expect("store mutex poisoned");
        let application = applications.get_mut(id).ok_or(RepositoryError::NotFound)?;
        application.resume_key = Some(key);
        Ok(application.clone())
    }
}

pub(super) struct UnavailableStore;

#[async_trait]
impl RecordStore for UnavailableStore {
    async fn insert_job(&self, _job: Job) -> Result<Job, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    async fn fetch_job(&self, _id: &JobId) -> Result<Option<Job>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    async fn list_jobs(&self) -> Result<Vec<Job>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    async fn insert_application(
        &self,
        _application: JobApplication,
    ) -> Result<JobApplication, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    async fn fetch_application(
        &self,
        _id: &ApplicationId,
    ) -> Result<Option<JobApplication>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    async fn applications_for_job(
        &self,
        _job_id: &JobId,
    ) -> Result<Vec<JobApplication>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    async fn set_resume_key(
        &self,
        _id: &ApplicationId,
        _key: ResumeKey,
    ) -> Result<JobApplication, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemoryBlobs {
    objects: Mutex<HashMap<String, StoredObject>>,
}

impl MemoryBlobs {
    pub(super) fn keys(&self) -> HashSet<String> {
        self.objects
            .lock()
            .expect("blob mutex poisoned")
            .keys()
            .cloned()
            .collect()
    }

    pub(super) fn is_empty(&self) -> bool {
        self.objects.lock().expect("blob mutex poisoned").is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobs {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), BlobError> {
        self.objects.lock().expect("blob mutex poisoned").insert(
            key.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<StoredObject, BlobError> {
        self.objects
            .lock()
            .expect("blob mutex poisoned")
            .get(key)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(key.to_string()))
    }
}

/// Queue double for the submission side: records every send attempt.
#[derive(Default)]
pub(super) struct RecordingQueue {
    fail_sends: bool,
    attempts: Mutex<Vec<String>>,
}

impl RecordingQueue {
    pub(super) fn failing() -> Self {
        Self {
            fail_sends: true,
            ..Self::default()
        }
    }

    pub(super) fn attempts(&self) -> Vec<String> {
        self.attempts.lock().expect("queue mutex poisoned").clone()
    }
}

#[async_trait]
impl NotificationQueue for RecordingQueue {
    async fn send(&self, body: String) -> Result<String, QueueError> {
        let mut attempts = self.attempts.lock().expect("queue mutex poisoned");
        attempts.push(body);
        if self.fail_sends {
            return Err(QueueError::Transport("queue endpoint returned 503".to_string()));
        }
        Ok(format!("msg-{}", attempts.len()))
    }

    async fn receive(
        &self,
        _max_batch: usize,
        _wait: Duration,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        Ok(Vec::new())
    }

    async fn delete(&self, handle: &DeliveryHandle) -> Result<(), QueueError> {
        Err(QueueError::InvalidHandle(handle.clone()))
    }
}

/// Queue double for the consumer side: replays scripted receive results, then cancels the
/// worker and idles for the requested wait.
#[derive(Default)]
pub(super) struct ScriptedQueue {
    script: Mutex<VecDeque<Result<Vec<ReceivedMessage>, QueueError>>>,
    drained: Option<CancellationToken>,
    fail_deletes: bool,
    receives: Mutex<usize>,
    deletes: Mutex<Vec<DeliveryHandle>>,
    sent: Mutex<Vec<String>>,
}

impl ScriptedQueue {
    pub(super) fn new(script: Vec<Result<Vec<ReceivedMessage>, QueueError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    pub(super) fn cancel_when_drained(mut self, token: CancellationToken) -> Self {
        self.drained = Some(token);
        self
    }

    pub(super) fn failing_deletes(mut self) -> Self {
        self.fail_deletes = true;
        self
    }

    pub(super) fn receives(&self) -> usize {
        *self.receives.lock().expect("queue mutex poisoned")
    }

    pub(super) fn deletes(&self) -> Vec<DeliveryHandle> {
        self.deletes.lock().expect("queue mutex poisoned").clone()
    }

    pub(super) fn sent(&self) -> Vec<String> {
        self.sent.lock().expect("queue mutex poisoned").clone()
    }
}

#[async_trait]
impl NotificationQueue for ScriptedQueue {
    async fn send(&self, body: String) -> Result<String, QueueError> {
        let mut sent = self.sent.lock().expect("queue mutex poisoned");
        sent.push(body);
        Ok(format!("dlq-{}", sent.len()))
    }

    async fn receive(
        &self,
        _max_batch: usize,
        wait: Duration,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        *self.receives.lock().expect("queue mutex poisoned") += 1;
        let next = self.script.lock().expect("queue mutex poisoned").pop_front();
        match next {
            Some(result) => result,
            None => {
                if let Some(token) = &self.drained {
                    token.cancel();
                }
                tokio::time::sleep(wait).await;
                Ok(Vec::new())
            }
        }
    }

    async fn delete(&self, handle: &DeliveryHandle) -> Result<(), QueueError> {
        self.deletes
            .lock()
            .expect("queue mutex poisoned")
            .push(handle.clone());
        if self.fail_deletes {
            return Err(QueueError::Transport("delete timed out".to_string()));
        }
        Ok(())
    }
}

/// Notifier double that records deliveries and fails for selected candidates.
#[derive(Default)]
pub(super) struct RecordingNotifier {
    fail_for: HashSet<String>,
    delivered: Mutex<Vec<NotificationMessage>>,
    attempts: Mutex<usize>,
}

impl RecordingNotifier {
    pub(super) fn failing_for(names: &[&str]) -> Self {
        Self {
            fail_for: names.iter().map(|name| name.to_string()).collect(),
            ..Self::default()
        }
    }

    pub(super) fn delivered(&self) -> Vec<NotificationMessage> {
        self.delivered.lock().expect("notifier mutex poisoned").clone()
    }

    pub(super) fn attempts(&self) -> usize {
        *self.attempts.lock().expect("notifier mutex poisoned")
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &NotificationMessage) -> Result<(), NotifyError> {
        *self.attempts.lock().expect("notifier mutex poisoned") += 1;
        if self.fail_for.contains(&message.candidate_name) {
            return Err(NotifyError::Rejected(format!(
                "mailbox for {} is full",
                message.candidate_name
            )));
        }
        self.delivered
            .lock()
            .expect("notifier mutex poisoned")
            .push(message.clone());
        Ok(())
    }
}
