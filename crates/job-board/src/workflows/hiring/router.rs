use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
    Router,
};
use serde_json::json;
use tracing::warn;

use super::domain::{ApplicationId, ApplicationSubmission, JobId, JobPosting};
use super::notifications::NotificationQueue;
use super::repository::{RecordStore, RepositoryError};
use super::service::{JobBoardService, JobBoardServiceError};
use super::storage::BlobStore;

type SharedService<S, B, Q> = Arc<JobBoardService<S, B, Q>>;

/// Router builder exposing job, application, and résumé endpoints.
pub fn job_board_router<S, B, Q>(service: SharedService<S, B, Q>) -> Router
where
    S: RecordStore + 'static,
    B: BlobStore + 'static,
    Q: NotificationQueue + 'static,
{
    Router::new()
        .route(
            "/api/v1/jobs",
            get(list_jobs_handler::<S, B, Q>).post(post_job_handler::<S, B, Q>),
        )
        .route("/api/v1/jobs/:job_id", get(job_handler::<S, B, Q>))
        .route(
            "/api/v1/jobs/:job_id/applications",
            get(list_applications_handler::<S, B, Q>).post(submit_handler::<S, B, Q>),
        )
        .route(
            "/api/v1/applications/:application_id",
            get(application_handler::<S, B, Q>),
        )
        .route(
            "/api/v1/applications/:application_id/resume",
            get(download_resume_handler::<S, B, Q>),
        )
        .route(
            "/api/v1/applications/:application_id/resume/:filename",
            put(upload_resume_handler::<S, B, Q>),
        )
        .with_state(service)
}

pub(crate) async fn post_job_handler<S, B, Q>(
    State(service): State<SharedService<S, B, Q>>,
    payload: Result<axum::Json<JobPosting>, JsonRejection>,
) -> Response
where
    S: RecordStore + 'static,
    B: BlobStore + 'static,
    Q: NotificationQueue + 'static,
{
    let axum::Json(posting) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejection_response(rejection),
    };
    match service.post_job(posting).await {
        Ok(job) => (StatusCode::CREATED, axum::Json(job)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn list_jobs_handler<S, B, Q>(
    State(service): State<SharedService<S, B, Q>>,
) -> Response
where
    S: RecordStore + 'static,
    B: BlobStore + 'static,
    Q: NotificationQueue + 'static,
{
    match service.list_jobs().await {
        Ok(jobs) => (StatusCode::OK, axum::Json(jobs)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn job_handler<S, B, Q>(
    State(service): State<SharedService<S, B, Q>>,
    Path(job_id): Path<String>,
) -> Response
where
    S: RecordStore + 'static,
    B: BlobStore + 'static,
    Q: NotificationQueue + 'static,
{
    match service.get_job(&JobId(job_id)).await {
        Ok(job) => (StatusCode::OK, axum::Json(job)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn submit_handler<S, B, Q>(
    State(service): State<SharedService<S, B, Q>>,
    Path(job_id): Path<String>,
    payload: Result<axum::Json<ApplicationSubmission>, JsonRejection>,
) -> Response
where
    S: RecordStore + 'static,
    B: BlobStore + 'static,
    Q: NotificationQueue + 'static,
{
    let axum::Json(submission) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejection_response(rejection),
    };
    match service.submit_application(&JobId(job_id), submission).await {
        Ok(application) => (StatusCode::CREATED, axum::Json(application)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn list_applications_handler<S, B, Q>(
    State(service): State<SharedService<S, B, Q>>,
    Path(job_id): Path<String>,
) -> Response
where
    S: RecordStore + 'static,
    B: BlobStore + 'static,
    Q: NotificationQueue + 'static,
{
    match service.list_applications(&JobId(job_id)).await {
        Ok(applications) => (StatusCode::OK, axum::Json(applications)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn application_handler<S, B, Q>(
    State(service): State<SharedService<S, B, Q>>,
    Path(application_id): Path<String>,
) -> Response
where
    S: RecordStore + 'static,
    B: BlobStore + 'static,
    Q: NotificationQueue + 'static,
{
    match service
        .get_application(&ApplicationId(application_id))
        .await
    {
        Ok(application) => (StatusCode::OK, axum::Json(application)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn upload_resume_handler<S, B, Q>(
    State(service): State<SharedService<S, B, Q>>,
    Path((application_id, filename)): Path<(String, String)>,
    body: Bytes,
) -> Response
where
    S: RecordStore + 'static,
    B: BlobStore + 'static,
    Q: NotificationQueue + 'static,
{
    let id = ApplicationId(application_id);
    match service.attach_resume(&id, &filename, body.to_vec()).await {
        Ok(key) => {
            let payload = json!({
                "application_id": id,
                "resume_key": key,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn download_resume_handler<S, B, Q>(
    State(service): State<SharedService<S, B, Q>>,
    Path(application_id): Path<String>,
) -> Response
where
    S: RecordStore + 'static,
    B: BlobStore + 'static,
    Q: NotificationQueue + 'static,
{
    match service
        .fetch_resume(&ApplicationId(application_id))
        .await
    {
        Ok(object) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, object.content_type)],
            object.bytes,
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

/// Malformed or mistyped JSON bodies are validation failures like any other.
fn rejection_response(rejection: JsonRejection) -> Response {
    let payload = json!({ "error": rejection.body_text() });
    (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
}

fn error_response(err: JobBoardServiceError) -> Response {
    let status = match &err {
        JobBoardServiceError::JobNotFound(_)
        | JobBoardServiceError::ApplicationNotFound(_)
        | JobBoardServiceError::ResumeNotFound(_)
        | JobBoardServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        JobBoardServiceError::Validation(_) => StatusCode::BAD_REQUEST,
        JobBoardServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        JobBoardServiceError::NotificationEnqueueFailed { application_id, .. } => {
            let payload = json!({
                "error": err.to_string(),
                "application_id": application_id,
            });
            return (StatusCode::BAD_GATEWAY, axum::Json(payload)).into_response();
        }
        JobBoardServiceError::Repository(RepositoryError::Unavailable(_))
        | JobBoardServiceError::Storage(_) => {
            warn!(error = %err, "request failed on a storage dependency");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let payload = json!({ "error": err.to_string() });
    (status, axum::Json(payload)).into_response()
}
