//! Flat-file blob storage rooted at a configured directory.
//!
//! Grounded on `layer5_resources/resources.py`'s file-backed resource
//! surface: callers address blobs by a relative key, the store sanitizes it
//! against path traversal, and reads/writes go straight to disk.

use std::path::{Path, PathBuf};

use aios_common::error::DataStoreError;

pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub async fn write(&self, key: &str, content: &[u8]) -> Result<(), DataStoreError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DataStoreError::Io(e.to_string()))?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| DataStoreError::Io(e.to_string()))
    }

    pub async fn read(&self, key: &str) -> Result<Vec<u8>, DataStoreError> {
        let path = self.resolve(key)?;
        tokio::fs::read(&path)
            .await
            .map_err(|_| DataStoreError::KeyNotFound(key.to_string()))
    }

    pub async fn delete(&self, key: &str) -> Result<(), DataStoreError> {
        let path = self.resolve(key)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|_| DataStoreError::KeyNotFound(key.to_string()))
    }

    pub fn exists(&self, key: &str) -> bool {
        self.resolve(key).map(|p| p.exists()).unwrap_or(false)
    }

    /// Rejects any key that would escape `root` via `..` or an absolute path.
    fn resolve(&self, key: &str) -> Result<PathBuf, DataStoreError> {
        if key.is_empty() || Path::new(key).is_absolute() || key.split('/').any(|seg| seg == "..") {
            return Err(DataStoreError::Io(format!("invalid key '{key}'")));
        }
        Ok(self.root.join(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        store.write("notes/a.txt", b"hello").await.unwrap();
        assert_eq!(store.read("notes/a.txt").await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn path_traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        assert!(store.write("../escape.txt", b"x").await.is_err());
        assert!(store.write("/etc/passwd", b"x").await.is_err());
    }

    #[tokio::test]
    async fn delete_then_read_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        store.write("a.txt", b"x").await.unwrap();
        store.delete("a.txt").await.unwrap();

        assert!(matches!(store.read("a.txt").await, Err(DataStoreError::KeyNotFound(_))));
    }
}
