//! Key-value store with JSON-on-disk persistence.
//!
//! Ported from `layer5_resources/resources.py`'s key-value surface: a plain
//! map kept in memory and mirrored to a single JSON file on every mutation.
//! The original backs this with SQLite; that's an external-collaborator
//! concern this crate does not implement, so the trait boundary here is
//! satisfied by a file-backed map instead (spec.md §4.5).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde_json::Value;

use aios_common::error::DataStoreError;

pub struct KvStore {
    path: PathBuf,
    data: RwLock<HashMap<String, Value>>,
}

impl KvStore {
    /// Loads `path` if it exists, starting empty otherwise.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, DataStoreError> {
        let path = path.into();
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                serde_json::from_str(&content).map_err(|e| DataStoreError::Serialization(e.to_string()))?
            }
            Err(_) => HashMap::new(),
        };
        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.data.read().expect("kv store lock poisoned").get(key).cloned()
    }

    pub async fn set(&self, key: impl Into<String>, value: Value) -> Result<(), DataStoreError> {
        {
            let mut data = self.data.write().expect("kv store lock poisoned");
            data.insert(key.into(), value);
        }
        self.flush().await
    }

    pub async fn delete(&self, key: &str) -> Result<Option<Value>, DataStoreError> {
        let removed = {
            let mut data = self.data.write().expect("kv store lock poisoned");
            data.remove(key)
        };
        self.flush().await?;
        Ok(removed)
    }

    pub fn keys(&self) -> Vec<String> {
        self.data.read().expect("kv store lock poisoned").keys().cloned().collect()
    }

    async fn flush(&self) -> Result<(), DataStoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DataStoreError::Io(e.to_string()))?;
        }
        let snapshot = self.data.read().expect("kv store lock poisoned").clone();
        let content = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| DataStoreError::Serialization(e.to_string()))?;
        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| DataStoreError::Io(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn set_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.json");

        let store = KvStore::open(&path).await.unwrap();
        store.set("a", json!(1)).await.unwrap();

        let reopened = KvStore::open(&path).await.unwrap();
        assert_eq!(reopened.get("a"), Some(json!(1)));
    }

    #[tokio::test]
    async fn delete_removes_the_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = KvStore::open(dir.path().join("kv.json")).await.unwrap();

        store.set("a", json!(1)).await.unwrap();
        let removed = store.delete("a").await.unwrap();

        assert_eq!(removed, Some(json!(1)));
        assert_eq!(store.get("a"), None);
    }

    #[tokio::test]
    async fn open_on_a_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = KvStore::open(dir.path().join("missing.json")).await.unwrap();
        assert!(store.keys().is_empty());
    }
}
