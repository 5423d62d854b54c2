//! Shared value types for the resources tier.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declares the tools a registered MCP server offers, grounded on
/// `layer5_resources/mcp_manager.py::_get_server_tools`'s built-in roster.
#[derive(Debug, Clone)]
pub struct McpServerSpec {
    pub name: String,
    pub tools: Vec<String>,
}

impl McpServerSpec {
    pub fn new(name: impl Into<String>, tools: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            name: name.into(),
            tools: tools.into_iter().map(str::to_string).collect(),
        }
    }
}

/// Result of a tool call, mirroring the original's plain dict return.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub server: String,
    pub tool: String,
    pub output: Value,
}

/// A document stored in the vector store, with an optional embedding.
/// The embedding itself is never computed by this crate — populating it is
/// an external collaborator's concern, matching spec.md §4.5's framing of
/// vector search as an optional capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub text: String,
    pub embedding: Option<Vec<f32>>,
    pub metadata: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub record: VectorRecord,
    pub score: f32,
}
