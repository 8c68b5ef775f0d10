use async_trait::async_trait;

/// Object returned by the blob store: raw bytes plus the content type recorded at upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Keyed object storage holding uploaded résumés.
///
/// Keys are opaque strings. A `put` on an existing key replaces the object; nothing is versioned,
/// deduplicated, or garbage collected.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), BlobError>;
    async fn get(&self, key: &str) -> Result<StoredObject, BlobError>;
}

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("object '{0}' not found")]
    NotFound(String),
    #[error("blob store unavailable: {0}")]
    Transport(String),
}
