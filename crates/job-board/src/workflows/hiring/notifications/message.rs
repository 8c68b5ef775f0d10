use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflows::hiring::domain::{ApplicationId, JobApplication, JobId};

/// Identifier minted once per enqueue so consumers can drop redelivered duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(pub Uuid);

impl NotificationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for NotificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Queue payload announcing a new application.
///
/// The candidate fields are copied rather than referenced so the consumer never has to reach
/// back into the record store; `application_id` is carried for correlation only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationMessage {
    pub message_id: NotificationId,
    pub job_id: JobId,
    pub application_id: ApplicationId,
    pub candidate_name: String,
    pub candidate_email: String,
}

impl NotificationMessage {
    pub fn for_application(application: &JobApplication) -> Self {
        Self {
            message_id: NotificationId::generate(),
            job_id: application.job_id.clone(),
            application_id: application.id.clone(),
            candidate_name: application.candidate_name.clone(),
            candidate_email: application.candidate_email.clone(),
        }
    }

    pub fn encode(&self) -> Result<String, MessageCodecError> {
        serde_json::to_string(self).map_err(MessageCodecError::Encode)
    }

    pub fn decode(body: &str) -> Result<Self, MessageCodecError> {
        serde_json::from_str(body).map_err(MessageCodecError::Decode)
    }

    /// Human readable announcement delivered by the notifier.
    pub fn summary(&self) -> String {
        format!(
            "New application for job {}:\nName: {}\nEmail: {}",
            self.job_id, self.candidate_name, self.candidate_email
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MessageCodecError {
    #[error("failed to encode notification: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("malformed notification body: {0}")]
    Decode(#[source] serde_json::Error),
}
