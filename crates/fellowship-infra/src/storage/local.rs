//! Filesystem-backed storage rooted at a single directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use fellowship_core::ports::{FileStorage, StorageError, StoredFile};

const WRITE_TIMEOUT: Duration = Duration::from_secs(30);
pub const PUBLIC_PREFIX: &str = "/uploads";

pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, StorageError> {
        let valid = !name.is_empty()
            && !name.starts_with('.')
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }
}

/// Content type implied by a stored file's extension.
pub fn content_type_for(name: &str) -> &'static str {
    match name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "png" => "image/png",
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        Some(ext) if ext == "gif" => "image/gif",
        Some(ext) if ext == "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn put(&self, name: &str, bytes: &[u8], content_type: &str) -> Result<String, StorageError> {
        let path = self.path_for(name)?;

        let write = async {
            tokio::fs::create_dir_all(&self.root).await?;
            tokio::fs::write(&path, bytes).await
        };
        tokio::time::timeout(WRITE_TIMEOUT, write)
            .await
            .map_err(|_| StorageError::Timeout)?
            .map_err(|e| StorageError::Io(e.to_string()))?;

        tracing::debug!(name = %name, size = bytes.len(), content_type = %content_type, "File stored");
        Ok(format!("{PUBLIC_PREFIX}/{name}"))
    }

    async fn get(&self, name: &str) -> Result<Option<StoredFile>, StorageError> {
        let path = self.path_for(name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(StoredFile {
                bytes,
                content_type: content_type_for(name).to_string(),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e.to_string())),
        }
    }
}
