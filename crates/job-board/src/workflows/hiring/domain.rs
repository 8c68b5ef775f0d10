use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix shared by every résumé object written to the blob store.
pub const RESUME_KEY_PREFIX: &str = "job-applications/";

/// File extensions accepted for résumé uploads (compared case-insensitively).
pub const ALLOWED_RESUME_EXTENSIONS: [&str; 3] = ["pdf", "docx", "txt"];

/// Identifier wrapper for job postings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for candidate applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub String);

impl ApplicationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Blob store key naming an uploaded résumé.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResumeKey(pub String);

impl ResumeKey {
    /// Derives the key from the owning application and the uploaded filename.
    ///
    /// The key is not content-addressed: the same filename always maps to the same object, so a
    /// re-upload overwrites it, while a new filename leaves the previous object orphaned.
    pub fn for_upload(application_id: &ApplicationId, filename: &str) -> Self {
        Self(format!("{RESUME_KEY_PREFIX}{}-{filename}", application_id.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResumeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Advertised salary band. Both bounds are non-negative by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryRange {
    pub min: u32,
    pub max: u32,
}

impl SalaryRange {
    pub fn new(min: u32, max: u32) -> Result<Self, ValidationError> {
        if min > max {
            return Err(ValidationError::InvalidSalaryRange { min, max });
        }
        Ok(Self { min, max })
    }
}

/// Request payload used to publish a new job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPosting {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub company: String,
    pub min_salary: u32,
    pub max_salary: u32,
}

/// Published job. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub title: String,
    pub description: String,
    pub salary: SalaryRange,
    pub company: String,
    pub posted_at: DateTime<Utc>,
}

impl Job {
    pub fn from_posting(posting: JobPosting) -> Result<Self, ValidationError> {
        let JobPosting {
            title,
            description,
            company,
            min_salary,
            max_salary,
        } = posting;

        let title = required("title", title)?;
        let company = required("company", company)?;
        let salary = SalaryRange::new(min_salary, max_salary)?;

        Ok(Self {
            id: JobId::generate(),
            title,
            description: description.trim().to_string(),
            salary,
            company,
            posted_at: Utc::now(),
        })
    }
}

/// Candidate details supplied when applying to a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSubmission {
    pub candidate_name: String,
    pub candidate_email: String,
}

impl ApplicationSubmission {
    pub(crate) fn validated(self) -> Result<Self, ValidationError> {
        let candidate_name = required("candidate_name", self.candidate_name)?;
        let candidate_email = required("candidate_email", self.candidate_email)?;
        if !candidate_email.contains('@') {
            return Err(ValidationError::InvalidEmail(candidate_email));
        }
        Ok(Self {
            candidate_name,
            candidate_email,
        })
    }
}

/// Stored application. Only `resume_key` changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobApplication {
    pub id: ApplicationId,
    pub job_id: JobId,
    pub candidate_name: String,
    pub candidate_email: String,
    pub resume_key: Option<ResumeKey>,
    pub submitted_at: DateTime<Utc>,
}

impl JobApplication {
    pub(crate) fn new(job_id: JobId, submission: ApplicationSubmission) -> Self {
        Self {
            id: ApplicationId::generate(),
            job_id,
            candidate_name: submission.candidate_name,
            candidate_email: submission.candidate_email,
            resume_key: None,
            submitted_at: Utc::now(),
        }
    }
}

/// Validated résumé upload, ready to be written to the blob store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeUpload {
    pub filename: String,
    pub content: Vec<u8>,
    pub content_type: String,
}

impl ResumeUpload {
    /// The filename is kept exactly as supplied, so the résumé key matches what the client sent.
    pub fn new(filename: &str, content: Vec<u8>) -> Result<Self, ValidationError> {
        if filename.trim().is_empty() {
            return Err(ValidationError::MissingField("filename"));
        }
        if filename.contains(['/', '\\']) {
            return Err(ValidationError::InvalidFilename(filename.to_string()));
        }
        if content.is_empty() {
            return Err(ValidationError::EmptyResume);
        }

        // Everything after the last dot, so a bare ".pdf" still carries an extension.
        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| ALLOWED_RESUME_EXTENSIONS.contains(&ext.as_str()))
            .ok_or_else(|| ValidationError::UnsupportedExtension(filename.to_string()))?;

        let content_type = mime_guess::from_ext(&extension)
            .first_or(mime::APPLICATION_OCTET_STREAM)
            .essence_str()
            .to_string();

        Ok(Self {
            filename: filename.to_string(),
            content,
            content_type,
        })
    }
}

/// Input rejected before any store, blob, or queue call was made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} must not be blank")]
    MissingField(&'static str),
    #[error("'{0}' is not a valid email address")]
    InvalidEmail(String),
    #[error("salary range is inverted: min {min} exceeds max {max}")]
    InvalidSalaryRange { min: u32, max: u32 },
    #[error("résumé content is empty")]
    EmptyResume,
    #[error("'{0}' must not contain path separators")]
    InvalidFilename(String),
    #[error("'{0}' has an unsupported extension; expected .pdf, .docx, or .txt")]
    UnsupportedExtension(String),
}

fn required(field: &'static str, value: String) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resume_key_is_derived_from_application_and_filename() {
        let id = ApplicationId("app-42".to_string());
        let key = ResumeKey::for_upload(&id, "cv.pdf");
        assert_eq!(key.as_str(), "job-applications/app-42-cv.pdf");
        assert_eq!(key, ResumeKey::for_upload(&id, "cv.pdf"));
        assert_ne!(key, ResumeKey::for_upload(&id, "cv-v2.pdf"));
    }

    #[test]
    fn resume_upload_accepts_allowed_extensions_in_any_case() {
        for name in ["cv.pdf", "cv.DOCX", "notes.Txt"] {
            let upload = ResumeUpload::new(name, b"content".to_vec()).expect("accepted");
            assert_eq!(upload.filename, name);
        }
        let pdf = ResumeUpload::new("cv.pdf", b"%PDF".to_vec()).expect("pdf");
        assert_eq!(pdf.content_type, "application/pdf");
    }

    #[test]
    fn resume_filename_is_kept_verbatim() {
        let upload = ResumeUpload::new(" cv final.docx", b"PK".to_vec()).expect("accepted");
        assert_eq!(upload.filename, " cv final.docx");
        let id = ApplicationId("app-7".to_string());
        assert_eq!(
            ResumeKey::for_upload(&id, &upload.filename).as_str(),
            "job-applications/app-7- cv final.docx"
        );

        let bare = ResumeUpload::new(".pdf", b"%PDF".to_vec()).expect("bare extension accepted");
        assert_eq!(bare.filename, ".pdf");
        assert_eq!(bare.content_type, "application/pdf");

        assert_eq!(
            ResumeUpload::new("cv.", b"x".to_vec()),
            Err(ValidationError::UnsupportedExtension("cv.".to_string()))
        );
    }

    #[test]
    fn resume_upload_rejects_bad_input() {
        assert_eq!(
            ResumeUpload::new("cv.exe", b"MZ".to_vec()),
            Err(ValidationError::UnsupportedExtension("cv.exe".to_string()))
        );
        assert_eq!(
            ResumeUpload::new("resume", b"plain".to_vec()),
            Err(ValidationError::UnsupportedExtension("resume".to_string()))
        );
        assert_eq!(
            ResumeUpload::new("cv.pdf", Vec::new()),
            Err(ValidationError::EmptyResume)
        );
        assert_eq!(
            ResumeUpload::new("../cv.pdf", b"x".to_vec()),
            Err(ValidationError::InvalidFilename("../cv.pdf".to_string()))
        );
        assert_eq!(
            ResumeUpload::new("  ", b"x".to_vec()),
            Err(ValidationError::MissingField("filename"))
        );
    }

    #[test]
    fn job_posting_requires_ordered_salary_range() {
        let posting = JobPosting {
            title: "Backend Engineer".to_string(),
            description: "Queues and stores".to_string(),
            company: "Acme".to_string(),
            min_salary: 9000,
            max_salary: 5000,
        };
        assert_eq!(
            Job::from_posting(posting),
            Err(ValidationError::InvalidSalaryRange {
                min: 9000,
                max: 5000
            })
        );
    }

    #[test]
    fn submission_rejects_malformed_email() {
        let submission = ApplicationSubmission {
            candidate_name: "Ada".to_string(),
            candidate_email: "ada.example.com".to_string(),
        };
        assert_eq!(
            submission.validated(),
            Err(ValidationError::InvalidEmail("ada.example.com".to_string()))
        );
    }
}
