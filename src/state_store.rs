//! Coarse checkpoint/rollback store, shared across tiers.
//!
//! Ported from `core/base.py::StateStore`: an in-memory map mirrored to
//! `state.json`, with named checkpoints written out as their own files and
//! restorable either from the in-memory cache or from disk. This is distinct
//! from the workflow engine's per-node checkpoints (`layer3::workflow`),
//! which use the `cp_<workflow_id>_<sequence>_<HHMMSS>` naming convention —
//! this store is the general-purpose crosscutting one spec.md §4.6
//! describes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::Value;

use crate::error::DataStoreError;

pub struct StateStore {
    root: PathBuf,
    state: Mutex<HashMap<String, Value>>,
    checkpoints: Mutex<HashMap<String, HashMap<String, Value>>>,
}

impl StateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            state: Mutex::new(HashMap::new()),
            checkpoints: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.state.lock().expect("state store mutex poisoned").get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.state
            .lock()
            .expect("state store mutex poisoned")
            .insert(key.into(), value);
    }

    pub fn delete(&self, key: &str) -> Option<Value> {
        self.state.lock().expect("state store mutex poisoned").remove(key)
    }

    /// Persists the current state to `<root>/state.json`.
    pub async fn flush(&self) -> Result<(), DataStoreError> {
        let snapshot = self.state.lock().expect("state store mutex poisoned").clone();
        write_json(&self.root.join("state.json"), &snapshot).await
    }

    /// Snapshots current state under `checkpoint_id`, both in memory and on
    /// disk as `checkpoint_<checkpoint_id>.json`.
    pub async fn checkpoint(&self, checkpoint_id: impl Into<String>) -> Result<(), DataStoreError> {
        let checkpoint_id = checkpoint_id.into();
        let snapshot = self.state.lock().expect("state store mutex poisoned").clone();

        self.checkpoints
            .lock()
            .expect("state store mutex poisoned")
            .insert(checkpoint_id.clone(), snapshot.clone());

        write_json(
            &self.root.join(format!("checkpoint_{checkpoint_id}.json")),
            &snapshot,
        )
        .await
    }

    /// Restores state from `checkpoint_id`, preferring the in-memory cache
    /// and falling back to disk if it was evicted (e.g. after a restart).
    pub async fn rollback(&self, checkpoint_id: &str) -> Result<(), DataStoreError> {
        let cached = self
            .checkpoints
            .lock()
            .expect("state store mutex poisoned")
            .get(checkpoint_id)
            .cloned();

        let snapshot = match cached {
            Some(snapshot) => snapshot,
            None => read_json(&self.root.join(format!("checkpoint_{checkpoint_id}.json"))).await?,
        };

        *self.state.lock().expect("state store mutex poisoned") = snapshot;
        Ok(())
    }

    pub fn list_checkpoints(&self) -> Vec<String> {
        self.checkpoints
            .lock()
            .expect("state store mutex poisoned")
            .keys()
            .cloned()
            .collect()
    }
}

async fn write_json(path: &Path, value: &HashMap<String, Value>) -> Result<(), DataStoreError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DataStoreError::Io(e.to_string()))?;
    }
    let content =
        serde_json::to_string_pretty(value).map_err(|e| DataStoreError::Serialization(e.to_string()))?;
    tokio::fs::write(path, content)
        .await
        .map_err(|e| DataStoreError::Io(e.to_string()))
}

async fn read_json(path: &Path) -> Result<HashMap<String, Value>, DataStoreError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|_| DataStoreError::KeyNotFound(path.display().to_string()))?;
    serde_json::from_str(&content).map_err(|e| DataStoreError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn checkpoint_and_rollback_round_trip_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path());

        store.set("counter", json!(1));
        store.checkpoint("cp1").await.unwrap();

        store.set("counter", json!(2));
        assert_eq!(store.get("counter"), Some(json!(2)));

        store.rollback("cp1").await.unwrap();
        assert_eq!(store.get("counter"), Some(json!(1)));
    }

    #[tokio::test]
    async fn rollback_falls_back_to_disk_when_cache_is_cold() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path());

        store.set("counter", json!(42));
        store.checkpoint("cp-disk").await.unwrap();

        let fresh_store = StateStore::new(dir.path());
        fresh_store.rollback("cp-disk").await.unwrap();
        assert_eq!(fresh_store.get("counter"), Some(json!(42)));
    }

    #[tokio::test]
    async fn unknown_checkpoint_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path());
        assert!(store.rollback("does-not-exist").await.is_err());
    }
}
