//! Model Context Protocol tool dispatch.
//!
//! Ported from `layer5_resources/mcp_manager.py::call_tool`: servers
//! register a declared tool list, and dispatch checks tool existence
//! against that list before trying to invoke it. The original tolerates
//! both a plain synchronous `getattr(server, tool)` and an async one;
//! `ToolHandler::call` is always `async fn` here; a handler wrapping a
//! synchronous backend just returns immediately from its own `call`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use aios_common::error::MCPServerError;

use crate::types::{McpServerSpec, ToolResult};

/// A tool handler. Implementations may be a thin HTTP client wrapper around
/// a real MCP server process; this crate only owns the dispatch contract.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, tool: &str, args: Value) -> Result<Value, MCPServerError>;
}

struct RegisteredServer {
    spec: McpServerSpec,
    handler: Arc<dyn ToolHandler>,
}

/// Built-in server roster from the original's `_get_server_tools`, used as
/// the default fixture tool-name tables when no external registration
/// overrides them.
pub fn default_server_specs() -> Vec<McpServerSpec> {
    vec![
        McpServerSpec::new("obsidian", ["read_note", "write_note", "search_notes", "list_notes"]),
        McpServerSpec::new("sharepoint", ["list_files", "download_file", "upload_file", "search"]),
        McpServerSpec::new("keeper", ["get_secret", "list_secrets"]),
        McpServerSpec::new("notebooklm", ["query", "summarize", "list_sources"]),
    ]
}

pub struct McpManager {
    servers: RwLock<HashMap<String, RegisteredServer>>,
}

impl McpManager {
    pub fn new() -> Self {
        Self {
            servers: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, spec: McpServerSpec, handler: Arc<dyn ToolHandler>) {
        self.servers
            .write()
            .expect("mcp manager lock poisoned")
            .insert(spec.name.clone(), RegisteredServer { spec, handler });
    }

    pub fn registered_servers(&self) -> Vec<String> {
        self.servers.read().expect("mcp manager lock poisoned").keys().cloned().collect()
    }

    pub fn tools_for(&self, server: &str) -> Option<Vec<String>> {
        self.servers
            .read()
            .expect("mcp manager lock poisoned")
            .get(server)
            .map(|s| s.spec.tools.clone())
    }

    /// Checks the server is registered and the tool is in its declared
    /// tool list before dispatching, exactly as the original does.
    pub async fn call_tool(&self, server: &str, tool: &str, args: Value) -> Result<ToolResult, MCPServerError> {
        {
            let servers = self.servers.read().expect("mcp manager lock poisoned");
            let registered = servers
                .get(server)
                .ok_or_else(|| MCPServerError::UnknownServer(server.to_string()))?;

            if !registered.spec.tools.iter().any(|t| t == tool) {
                return Err(MCPServerError::UnknownTool {
                    server: server.to_string(),
                    tool: tool.to_string(),
                });
            }
        }

        // Clone the Arc out of the lock so a slow tool invocation doesn't
        // hold the manager-wide lock for its duration.
        let handler = {
            let servers = self.servers.read().expect("mcp manager lock poisoned");
            servers
                .get(server)
                .map(|r| r.handler.clone())
                .ok_or_else(|| MCPServerError::UnknownServer(server.to_string()))?
        };
        let output = handler.call(tool, args).await?;

        Ok(ToolResult {
            server: server.to_string(),
            tool: tool.to_string(),
            output,
        })
    }
}

impl Default for McpManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoHandler;

    #[async_trait]
    impl ToolHandler for EchoHandler {
        async fn call(&self, tool: &str, args: Value) -> Result<Value, MCPServerError> {
            Ok(json!({ "tool": tool, "echo": args }))
        }
    }

    #[tokio::test]
    async fn dispatch_checks_tool_existence_before_calling() {
        let manager = McpManager::new();
        manager.register(
            McpServerSpec::new("obsidian", ["read_note"]),
            Arc::new(EchoHandler),
        );

        let err = manager
            .call_tool("obsidian", "delete_vault", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, MCPServerError::UnknownTool { .. }));
    }

    #[tokio::test]
    async fn unknown_server_is_rejected() {
        let manager = McpManager::new();
        let err = manager.call_tool("nope", "anything", json!({})).await.unwrap_err();
        assert!(matches!(err, MCPServerError::UnknownServer(_)));
    }

    #[tokio::test]
    async fn known_tool_dispatches_to_the_handler() {
        let manager = McpManager::new();
        manager.register(
            McpServerSpec::new("obsidian", ["read_note"]),
            Arc::new(EchoHandler),
        );

        let result = manager.call_tool("obsidian", "read_note", json!({"id": 1})).await.unwrap();
        assert_eq!(result.output["tool"], "read_note");
    }
}
