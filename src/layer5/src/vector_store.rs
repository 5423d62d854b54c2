//! Vector store: an optional capability, succeeding with a no-op when no
//! embedding backend is configured.
//!
//! The original (`layer5_resources/resources.py`) backs this with ChromaDB;
//! this crate implements only the trait boundary spec.md §4.5 describes —
//! cosine-similarity search over whatever vectors were stored, persisted as
//! a single JSON file. Producing real embeddings is an external
//! collaborator's job.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use aios_common::error::DataStoreError;

use crate::types::{ScoredRecord, VectorRecord};

pub struct VectorStore {
    path: PathBuf,
    records: RwLock<Vec<VectorRecord>>,
    enabled: bool,
}

impl VectorStore {
    /// `enabled = false` makes every write a no-op and every search return
    /// an empty result set, matching spec.md §4.5's degrade-gracefully
    /// semantics for a vector backend that isn't configured.
    pub async fn open(path: impl Into<PathBuf>, enabled: bool) -> Result<Self, DataStoreError> {
        let path = path.into();
        let records = if enabled {
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => {
                    serde_json::from_str(&content).map_err(|e| DataStoreError::Serialization(e.to_string()))?
                }
                Err(_) => Vec::new(),
            }
        } else {
            Vec::new()
        };
        Ok(Self {
            path,
            records: RwLock::new(records),
            enabled,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn upsert(&self, record: VectorRecord) -> Result<(), DataStoreError> {
        if !self.enabled {
            return Ok(());
        }
        {
            let mut records = self.records.write().expect("vector store lock poisoned");
            records.retain(|r| r.id != record.id);
            records.push(record);
        }
        self.flush().await
    }

    /// Cosine-similarity search over stored embeddings. Records without an
    /// embedding are skipped. Returns an empty vec when disabled.
    pub fn search(&self, query: &[f32], top_k: usize) -> Vec<ScoredRecord> {
        if !self.enabled {
            return Vec::new();
        }
        let records = self.records.read().expect("vector store lock poisoned");
        let mut scored: Vec<ScoredRecord> = records
            .iter()
            .filter_map(|r| {
                r.embedding
                    .as_ref()
                    .map(|emb| ScoredRecord {
                        record: r.clone(),
                        score: cosine_similarity(query, emb),
                    })
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        scored
    }

    async fn flush(&self) -> Result<(), DataStoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DataStoreError::Io(e.to_string()))?;
        }
        let snapshot = self.records.read().expect("vector store lock poisoned").clone();
        let content =
            serde_json::to_string_pretty(&snapshot).map_err(|e| DataStoreError::Serialization(e.to_string()))?;
        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| DataStoreError::Io(e.to_string()))
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn record(id: &str, embedding: Vec<f32>) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            text: id.to_string(),
            embedding: Some(embedding),
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn search_ranks_by_cosine_similarity() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open(dir.path().join("vectors.json"), true).await.unwrap();

        store.upsert(record("a", vec![1.0, 0.0])).await.unwrap();
        store.upsert(record("b", vec![0.0, 1.0])).await.unwrap();

        let results = store.search(&[1.0, 0.0], 1);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.id, "a");
    }

    #[tokio::test]
    async fn disabled_store_never_stores_or_searches() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open(dir.path().join("vectors.json"), false).await.unwrap();

        store.upsert(record("a", vec![1.0, 0.0])).await.unwrap();
        assert!(store.search(&[1.0, 0.0], 10).is_empty());
    }
}
