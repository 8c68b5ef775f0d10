use std::sync::Arc;

use tracing::{error, info};

use super::domain::{
    ApplicationId, ApplicationSubmission, Job, JobApplication, JobId, JobPosting, ResumeKey,
    ResumeUpload, ValidationError,
};
use super::notifications::{MessageCodecError, NotificationMessage, NotificationQueue, QueueError};
use super::repository::{RecordStore, RepositoryError};
use super::storage::{BlobError, BlobStore, StoredObject};

/// Service composing the record store, résumé blob store, and notification queue.
pub struct JobBoardService<S, B, Q> {
    store: Arc<S>,
    blobs: Arc<B>,
    queue: Arc<Q>,
}

impl<S, B, Q> JobBoardService<S, B, Q>
where
    S: RecordStore + 'static,
    B: BlobStore + 'static,
    Q: NotificationQueue + 'static,
{
    pub fn new(store: Arc<S>, blobs: Arc<B>, queue: Arc<Q>) -> Self {
        Self {
            store,
            blobs,
            queue,
        }
    }

    /// Publish a new job.
    pub async fn post_job(&self, posting: JobPosting) -> Result<Job, JobBoardServiceError> {
        let job = Job::from_posting(posting)?;
        let stored = self.store.insert_job(job).await?;
        info!(job_id = %stored.id, company = %stored.company, "job posted");
        Ok(stored)
    }

    pub async fn get_job(&self, job_id: &JobId) -> Result<Job, JobBoardServiceError> {
        self.store
            .fetch_job(job_id)
            .await?
            .ok_or_else(|| JobBoardServiceError::JobNotFound(job_id.clone()))
    }

    pub async fn list_jobs(&self) -> Result<Vec<Job>, JobBoardServiceError> {
        Ok(self.store.list_jobs().await?)
    }

    /// Record an application and announce it on the notification queue.
    ///
    /// The application is durably stored before the enqueue is attempted. When the enqueue fails
    /// the stored application is kept and `NotificationEnqueueFailed` is returned; nothing
    /// retries the notification later.
    pub async fn submit_application(
        &self,
        job_id: &JobId,
        submission: ApplicationSubmission,
    ) -> Result<JobApplication, JobBoardServiceError> {
        let submission = submission.validated()?;
        self.get_job(job_id).await?;

        let application = JobApplication::new(job_id.clone(), submission);
        let stored = self.store.insert_application(application).await?;
        info!(
            job_id = %stored.job_id,
            application_id = %stored.id,
            "application recorded"
        );

        let message = NotificationMessage::for_application(&stored);
        if let Err(source) = self.enqueue(&message).await {
            error!(
                job_id = %stored.job_id,
                application_id = %stored.id,
                message_id = %message.message_id,
                error = %source,
                "application recorded but notification was not enqueued"
            );
            return Err(JobBoardServiceError::NotificationEnqueueFailed {
                application_id: stored.id,
                source,
            });
        }

        Ok(stored)
    }

    async fn enqueue(&self, message: &NotificationMessage) -> Result<String, EnqueueError> {
        let body = message.encode()?;
        let queue_id = self.queue.send(body).await?;
        info!(
            message_id = %message.message_id,
            queue_message_id = %queue_id,
            application_id = %message.application_id,
            "notification enqueued"
        );
        Ok(queue_id)
    }

    pub async fn get_application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<JobApplication, JobBoardServiceError> {
        self.store
            .fetch_application(application_id)
            .await?
            .ok_or_else(|| JobBoardServiceError::ApplicationNotFound(application_id.clone()))
    }

    pub async fn list_applications(
        &self,
        job_id: &JobId,
    ) -> Result<Vec<JobApplication>, JobBoardServiceError> {
        self.get_job(job_id).await?;
        Ok(self.store.applications_for_job(job_id).await?)
    }

    /// Store a résumé for an existing application and point the application at it.
    ///
    /// Validation and the existence check both happen before the blob write, so rejected calls
    /// leave the store and blob store untouched.
    pub async fn attach_resume(
        &self,
        application_id: &ApplicationId,
        filename: &str,
        content: Vec<u8>,
    ) -> Result<ResumeKey, JobBoardServiceError> {
        let upload = ResumeUpload::new(filename, content)?;
        self.get_application(application_id).await?;

        let key = ResumeKey::for_upload(application_id, &upload.filename);
        let size = upload.content.len();
        self.blobs
            .put(key.as_str(), upload.content, &upload.content_type)
            .await?;

        self.store
            .set_resume_key(application_id, key.clone())
            .await
            .map_err(|err| match err {
                RepositoryError::NotFound => {
                    JobBoardServiceError::ApplicationNotFound(application_id.clone())
                }
                other => other.into(),
            })?;

        info!(
            application_id = %application_id,
            resume_key = %key,
            bytes = size,
            "résumé attached"
        );
        Ok(key)
    }

    /// Load the résumé currently referenced by an application.
    pub async fn fetch_resume(
        &self,
        application_id: &ApplicationId,
    ) -> Result<StoredObject, JobBoardServiceError> {
        let application = self.get_application(application_id).await?;
        let key = application
            .resume_key
            .ok_or_else(|| JobBoardServiceError::ResumeNotFound(application_id.clone()))?;

        self.blobs.get(key.as_str()).await.map_err(|err| match err {
            BlobError::NotFound(_) => JobBoardServiceError::ResumeNotFound(application_id.clone()),
            other => other.into(),
        })
    }
}

/// Why a notification could not be put on the queue.
#[derive(Debug, thiserror::Error)]
pub enum EnqueueError {
    #[error(transparent)]
    Encode(#[from] MessageCodecError),
    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Error raised by the job board service.
#[derive(Debug, thiserror::Error)]
pub enum JobBoardServiceError {
    #[error("job {0} not found")]
    JobNotFound(JobId),
    #[error("application {0} not found")]
    ApplicationNotFound(ApplicationId),
    #[error("no résumé on file for application {0}")]
    ResumeNotFound(ApplicationId),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("application {application_id} was recorded but its notification was not enqueued: {source}")]
    NotificationEnqueueFailed {
        application_id: ApplicationId,
        #[source]
        source: EnqueueError,
    },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Storage(#[from] BlobError),
}

impl JobBoardServiceError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::JobNotFound(_)
                | Self::ApplicationNotFound(_)
                | Self::ResumeNotFound(_)
                | Self::Repository(RepositoryError::NotFound)
        )
    }
}
