use async_trait::async_trait;
use job_board::workflows::hiring::{
    ApplicationId, BlobError, BlobStore, Job, JobApplication, JobId, RecordStore,
    RepositoryError, ResumeKey, StoredObject,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

fn guard<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("record store mutex poisoned".to_string()))
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryRecordStore {
    jobs: Arc<Mutex<HashMap<JobId, Job>>>,
    applications: Arc<Mutex<HashMap<ApplicationId, JobApplication>>>,
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn insert_job(&self, job: Job) -> Result<Job, RepositoryError> {
        let mut jobs = guard(&self.jobs)?;
        if jobs.contains_key(&job.id) {
            return Err(RepositoryError::Conflict);
        }
        jobs.insert(job.id.clone(), job.clone());
        Ok(job)
    }

    async fn fetch_job(&self, id: &JobId) -> Result<Option<Job>, RepositoryError> {
        Ok(guard(&self.jobs)?.get(id).cloned())
    }

    async fn list_jobs(&self) -> Result<Vec<Job>, RepositoryError> {
        let mut jobs: Vec<Job> = guard(&self.jobs)?.values().cloned().collect();
        jobs.sort_by(|a, b| a.posted_at.cmp(&b.posted_at));
        Ok(jobs)
    }

    async fn insert_application(
        &self,
        application: JobApplication,
    ) -> Result<JobApplication, RepositoryError> {
        let mut applications = guard(&self.applications)?;
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
        Ok(guard(&self.applications)?.get(id).cloned())
    }

    async fn applications_for_job(
        &self,
        job_id: &JobId,
    ) -> Result<Vec<JobApplication>, RepositoryError> {
        let mut applications: Vec<JobApplication> = guard(&self.applications)?
            .values()
            .filter(|application| &application.job_id == job_id)
            .cloned()
            .collect();
        applications.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at));
        Ok(applications)
    }

    async fn set_resume_key(
        &self,
        id: &ApplicationId,
        key: ResumeKey,
    ) -> Result<JobApplication, RepositoryError> {
        let mut applications = guard(&self.applications)?;
        let application = applications.get_mut(id).ok_or(RepositoryError::NotFound)?;
        application.resume_key = Some(key);
        Ok(application.clone())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryBlobStore {
    objects: Arc<Mutex<HashMap<String, StoredObject>>>,
}

impl InMemoryBlobStore {
    fn objects(&self) -> Result<MutexGuard<'_, HashMap<String, StoredObject>>, BlobError> {
        self.objects
            .lock()
            .map_err(|_| BlobError::Transport("blob store mutex poisoned".to_string()))
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), BlobError> {
        self.objects()?.insert(
            key.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<StoredObject, BlobError> {
        self.objects()?
            .get(key)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(key.to_string()))
    }
}
