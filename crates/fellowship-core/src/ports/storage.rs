//! Object storage port for uploaded images.

use async_trait::async_trait;

/// Stored object returned from `get`.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Store `bytes` under `name`; returns the public path.
    async fn put(&self, name: &str, bytes: &[u8], content_type: &str) -> Result<String, StorageError>;

    async fn get(&self, name: &str) -> Result<Option<StoredFile>, StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid object name: {0}")]
    InvalidName(String),

    #[error("Storage timed out")]
    Timeout,

    #[error("Storage I/O error: {0}")]
    Io(String),
}
