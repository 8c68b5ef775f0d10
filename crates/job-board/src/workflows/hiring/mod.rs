//! Job postings, candidate applications, résumé uploads, and the notification pipeline that
//! announces each new application.

pub mod domain;
pub mod notifications;
pub mod repository;
pub mod router;
pub mod service;
pub mod storage;

#[cfg(test)]
mod tests;

pub use domain::{
    ApplicationId, ApplicationSubmission, Job, JobApplication, JobId, JobPosting, ResumeKey,
    ResumeUpload, SalaryRange, ValidationError, ALLOWED_RESUME_EXTENSIONS, RESUME_KEY_PREFIX,
};
pub use repository::{RecordStore, RepositoryError};
pub use router::job_board_router;
pub use service::{EnqueueError, JobBoardService, JobBoardServiceError};
pub use storage::{BlobError, BlobStore, StoredObject};
