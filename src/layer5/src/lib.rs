//! Resources tier (L5): KV store, vector store, file store and MCP tool
//! dispatch, fronted by a `Tier` implementation so the orchestration tier
//! can route a resource-fetch request down to L5 the same way it would
//! dispatch to an agent.

pub mod file_store;
pub mod kv_store;
pub mod mcp_manager;
pub mod types;
pub mod vector_store;

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::json;

use aios_common::envelope::{Envelope, Outcome};
use aios_common::error::{CoreError, DataStoreError, MCPServerError, ResourceError};
use aios_common::tier::{Tier, TierHealth};

pub use file_store::FileStore;
pub use kv_store::KvStore;
pub use mcp_manager::{default_server_specs, McpManager, ToolHandler};
pub use vector_store::VectorStore;

/// Where resource-tier state lives on disk, mirroring spec.md §6's
/// persisted state layout.
pub struct ResourcesConfig {
    pub data_path: PathBuf,
    pub vector_store_enabled: bool,
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("./data"),
            vector_store_enabled: false,
        }
    }
}

pub struct ResourcesTier {
    kv: KvStore,
    vectors: VectorStore,
    files: FileStore,
    mcp: McpManager,
}

impl ResourcesTier {
    pub async fn new(config: ResourcesConfig) -> Result<Self, DataStoreError> {
        let kv = KvStore::open(config.data_path.join("kv.json")).await?;
        let vectors = VectorStore::open(config.data_path.join("vectors.json"), config.vector_store_enabled).await?;
        let files = FileStore::new(config.data_path.join("files"));
        // The default fixture roster (`default_server_specs`) only supplies
        // tool-name tables; a real handler for each server is registered by
        // the caller via `mcp().register(..)` once it knows how to reach it.
        let mcp = McpManager::new();
        Ok(Self { kv, vectors, files, mcp })
    }

    pub fn kv(&self) -> &KvStore {
        &self.kv
    }

    pub fn vectors(&self) -> &VectorStore {
        &self.vectors
    }

    pub fn files(&self) -> &FileStore {
        &self.files
    }

    pub fn mcp(&self) -> &McpManager {
        &self.mcp
    }
}

#[async_trait]
impl Tier for ResourcesTier {
    async fn process(&self, request: Envelope) -> Result<Outcome, CoreError> {
        let started = std::time::Instant::now();
        let op = request.context_str("resource_op").unwrap_or("kv_get");

        let result = match op {
            "kv_get" => {
                let key = request.context_str("key").unwrap_or_default();
                Ok(json!({ "value": self.kv.get(key) }))
            }
            "mcp_call" => {
                let server = request.context_str("server").unwrap_or_default().to_string();
                let tool = request.context_str("tool").unwrap_or_default().to_string();
                let args = request.context.get("args").cloned().unwrap_or(json!({}));
                self.mcp
                    .call_tool(&server, &tool, args)
                    .await
                    .map(|r| json!({ "output": r.output }))
                    .map_err(ResourceError::from)
            }
            other => Err(ResourceError::MCPServer(MCPServerError::UnknownTool {
                server: "resources".to_string(),
                tool: other.to_string(),
            })),
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        let trace = request.traced("layer5").layer_trace;

        Ok(match result {
            Ok(value) => Outcome::success(request.request_id, value, trace, duration_ms),
            Err(e) => Outcome::error(
                request.request_id,
                aios_common::envelope::Status::Failed,
                aios_common::envelope::ErrorInfo {
                    code: "RESOURCE_ERROR".to_string(),
                    message: e.to_string(),
                    recoverable: false,
                    details: Default::default(),
                },
                trace,
                duration_ms,
            ),
        })
    }

    fn health_check(&self) -> TierHealth {
        TierHealth::healthy("layer5")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aios_common::envelope::Identity;

    #[tokio::test]
    async fn kv_get_round_trips_through_process() {
        let dir = tempfile::tempdir().unwrap();
        let tier = ResourcesTier::new(ResourcesConfig {
            data_path: dir.path().to_path_buf(),
            vector_store_enabled: false,
        })
        .await
        .unwrap();
        tier.kv().set("greeting", json!("hi")).await.unwrap();

        let request = Envelope::new(Identity::User("alice".into()), "get greeting")
            .with_context_value("resource_op", json!("kv_get"))
            .with_context_value("key", json!("greeting"));

        let outcome = tier.process(request).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.result.unwrap()["value"], json!("hi"));
    }

    #[tokio::test]
    async fn unknown_op_produces_a_failed_outcome_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let tier = ResourcesTier::new(ResourcesConfig {
            data_path: dir.path().to_path_buf(),
            vector_store_enabled: false,
        })
        .await
        .unwrap();

        let request = Envelope::new(Identity::User("alice".into()), "do something unsupported")
            .with_context_value("resource_op", json!("frobnicate"));

        let outcome = tier.process(request).await.unwrap();
        assert!(!outcome.success);
    }
}
