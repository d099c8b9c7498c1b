//! File storage for uploaded documents and verification artifacts
//!
//! Files are stored under generated names; the original name only
//! contributes its extension. A stored file is addressed by its public url.

use crate::config::StorageConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub const PDF: &str = "application/pdf";
pub const JPEG: &str = "image/jpeg";
pub const PNG: &str = "image/png";

/// Accepted verification artifact types
pub const ARTIFACT_TYPES: &[&str] = &[JPEG, "image/jpg", PNG, PDF];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Public url, e.g. `/uploads/file-<id>.pdf`
    pub url: String,
    pub size: u64,
}

/// Trait for file storage backends
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Store `bytes` under a generated name starting with `prefix`
    async fn save(&self, prefix: &str, original_name: &str, bytes: &[u8]) -> Result<StoredFile>;

    /// Read back a file by its public url
    async fn read(&self, url: &str) -> Result<Vec<u8>>;

    /// Remove a stored file by its public url
    async fn delete(&self, url: &str) -> Result<()>;
}

/// Best-effort removal of files whose database record was never written.
/// Anything left behind is logged with its url.
pub async fn discard(store: &dyn FileStore, urls: &[&str]) {
    for url in urls {
        if let Err(e) = store.delete(url).await {
            tracing::warn!(file = %url, error = %e, "Orphaned upload left in storage");
        }
    }
}

/// Generated file name: `<prefix>-<uuid>[.<ext>]`
pub fn generated_name(prefix: &str, original_name: &str) -> String {
    let ext = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();
    format!("{}-{}{}", prefix, Uuid::now_v7().simple(), ext)
}

/// Local disk storage served by the gateway under `public_prefix`
pub struct LocalFileStore {
    root: PathBuf,
    public_prefix: String,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>, public_prefix: &str) -> Self {
        Self {
            root: root.into(),
            public_prefix: public_prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.upload_root, &config.public_prefix)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a public url back to a path under the root
    fn path_for(&self, url: &str) -> Result<PathBuf> {
        let name = url
            .strip_prefix(&self.public_prefix)
            .map(|n| n.trim_start_matches('/'))
            .filter(|n| !n.is_empty() && !n.contains('/') && !n.contains(".."))
            .ok_or_else(|| AppError::not_found("File", url))?;
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn save(&self, prefix: &str, original_name: &str, bytes: &[u8]) -> Result<StoredFile> {
        tokio::fs::create_dir_all(&self.root).await?;

        let name = generated_name(prefix, original_name);
        tokio::fs::write(self.root.join(&name), bytes).await?;

        tracing::debug!(file = %name, size = bytes.len(), "Stored upload");

        Ok(StoredFile {
            url: format!("{}/{}", self.public_prefix, name),
            size: bytes.len() as u64,
        })
    }

    async fn read(&self, url: &str) -> Result<Vec<u8>> {
        let path = self.path_for(url)?;
        tokio::fs::read(&path).await.map_err(Into::into)
    }

    async fn delete(&self, url: &str) -> Result<()> {
        let path = self.path_for(url)?;
        tokio::fs::remove_file(&path).await?;
        tracing::debug!(file = %url, "Removed upload");
        Ok(())
    }
}

/// In-memory storage for tests
#[derive(Default)]
pub struct MemoryFileStore {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.files.lock().map(|f| f.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn save(&self, prefix: &str, original_name: &str, bytes: &[u8]) -> Result<StoredFile> {
        let url = format!("/uploads/{}", generated_name(prefix, original_name));
        let mut files = self.files.lock().map_err(|_| AppError::Storage {
            message: "file map poisoned".to_string(),
        })?;
        files.insert(url.clone(), bytes.to_vec());
        Ok(StoredFile {
            url,
            size: bytes.len() as u64,
        })
    }

    async fn read(&self, url: &str) -> Result<Vec<u8>> {
        self.files
            .lock()
            .ok()
            .and_then(|files| files.get(url).cloned())
            .ok_or_else(|| AppError::not_found("File", url))
    }

    async fn delete(&self, url: &str) -> Result<()> {
        self.files
            .lock()
            .ok()
            .and_then(|mut files| files.remove(url))
            .map(|_| ())
            .ok_or_else(|| AppError::not_found("File", url))
    }
}

pub fn create_file_store(config: &StorageConfig) -> Arc<dyn FileStore> {
    Arc::new(LocalFileStore::from_config(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_name_keeps_safe_extension() {
        let name = generated_name("file", "My Paper.PDF");
        assert!(name.starts_with("file-"));
        assert!(name.ends_with(".pdf"));

        let name = generated_name("id_document", "../../etc/passwd");
        assert!(!name.contains('/'));
        assert!(!name.contains('.'));
    }

    #[tokio::test]
    async fn test_local_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path(), "/uploads/");

        let stored = store.save("file", "paper.pdf", b"%PDF-1.4 body").await.unwrap();
        assert!(stored.url.starts_with("/uploads/file-"));
        assert_eq!(stored.size, 13);
        assert_eq!(store.read(&stored.url).await.unwrap(), b"%PDF-1.4 body");
    }

    #[tokio::test]
    async fn test_local_store_refuses_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path(), "/uploads");
        assert!(store.read("/uploads/../secret").await.is_err());
        assert!(store.read("/elsewhere/file.pdf").await.is_err());
        assert!(store.delete("/uploads/../secret").await.is_err());
    }

    #[tokio::test]
    async fn test_discard_removes_saved_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path(), "/uploads");
        let stored = store.save("file", "paper.pdf", b"%PDF").await.unwrap();

        discard(&store, &[stored.url.as_str(), "/uploads/missing.pdf"]).await;

        assert!(store.read(&stored.url).await.is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
