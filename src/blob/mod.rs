//! Blob store collaborator for File-typed page fields.
//!
//! Items never hold file bytes, only the public URL returned by `put`.
//! Deletes are best-effort: callers log failures and move on.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("Unable to upload file: {0}")]
    Upload(String),
    #[error("Unable to delete blob {key}: {message}")]
    Delete { key: String, message: String },
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under `key` and return the public URL for the blob.
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<String, BlobError>;

    async fn delete(&self, key: &str) -> Result<(), BlobError>;
}

/// Filesystem-backed blob store serving files from a static route.
pub struct FsBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, BlobError> {
        // Keys are generated by the gateway; reject anything path-like anyway
        if key.is_empty() || key.contains('/') || key.contains("..") {
            return Err(BlobError::Upload(format!("invalid blob key: {}", key)));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<String, BlobError> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| BlobError::Upload(e.to_string()))?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| BlobError::Upload(e.to_string()))?;
        Ok(format!(
            "{}/{}",
            self.public_base_url.trim_end_matches('/'),
            key
        ))
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        let path = self.path_for(key).map_err(|e| BlobError::Delete {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| BlobError::Delete {
                key: key.to_string(),
                message: e.to_string(),
            })
    }
}

/// In-memory blob store for tests. Records puts and deletes and can be told
/// to fail uploads.
#[derive(Default)]
pub struct MemoryBlobStore {
    files: Mutex<HashMap<String, Vec<u8>>>,
    deletes: Mutex<Vec<String>>,
    fail_puts: AtomicBool,
    public_base_url: String,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self {
            public_base_url: "http://blobs.test".to_string(),
            ..Self::default()
        }
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub async fn stored_keys(&self) -> Vec<String> {
        self.files.lock().await.keys().cloned().collect()
    }

    pub async fn deleted_keys(&self) -> Vec<String> {
        self.deletes.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.files.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.files.lock().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<String, BlobError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(BlobError::Upload("simulated upload failure".to_string()));
        }
        self.files
            .lock()
            .await
            .insert(key.to_string(), bytes.to_vec());
        Ok(format!("{}/{}", self.public_base_url, key))
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        self.deletes.lock().await.push(key.to_string());
        match self.files.lock().await.remove(key) {
            Some(_) => Ok(()),
            None => Err(BlobError::Delete {
                key: key.to_string(),
                message: "no such blob".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fs_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path(), "http://localhost:5000/uploads");

        let url = store.put("abc-photo.png", b"bytes").await.unwrap();
        assert_eq!(url, "http://localhost:5000/uploads/abc-photo.png");
        assert!(dir.path().join("abc-photo.png").exists());

        store.delete("abc-photo.png").await.unwrap();
        assert!(!dir.path().join("abc-photo.png").exists());
    }

    #[tokio::test]
    async fn fs_store_rejects_path_traversal_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path(), "http://localhost:5000/uploads");
        assert!(store.put("../escape", b"x").await.is_err());
        assert!(store.put("a/b", b"x").await.is_err());
    }

    #[tokio::test]
    async fn memory_store_records_deletes() {
        let store = MemoryBlobStore::new();
        store.put("k1", b"data").await.unwrap();
        store.delete("k1").await.unwrap();
        assert_eq!(store.deleted_keys().await, vec!["k1".to_string()]);
        assert!(store.is_empty().await);
    }
}
