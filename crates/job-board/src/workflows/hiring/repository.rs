use async_trait::async_trait;

use super::domain::{ApplicationId, Job, JobApplication, JobId, ResumeKey};

/// Storage abstraction for jobs and applications so the service can be exercised in isolation.
///
/// Setting the résumé key is the only mutation path; everything else is create or read.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert_job(&self, job: Job) -> Result<Job, RepositoryError>;
    async fn fetch_job(&self, id: &JobId) -> Result<Option<Job>, RepositoryError>;
    async fn list_jobs(&self) -> Result<Vec<Job>, RepositoryError>;

    async fn insert_application(
        &self,
        application: JobApplication,
    ) -> Result<JobApplication, RepositoryError>;
    async fn fetch_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<JobApplication>, RepositoryError>;
    async fn applications_for_job(
        &self,
        job_id: &JobId,
    ) -> Result<Vec<JobApplication>, RepositoryError>;

    /// Overwrites the résumé key of an existing application (last write wins).
    async fn set_resume_key(
        &self,
        id: &ApplicationId,
        key: ResumeKey,
    ) -> Result<JobApplication, RepositoryError>;
}

/// Error enumeration for record store failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("record store unavailable: {0}")]
    Unavailable(String),
}
