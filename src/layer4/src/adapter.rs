//! The expert adapter trait and the three archetype implementations.
//!
//! Ported from `layer4_agents/base_agent.py`'s `initialize`/`execute`/
//! `shutdown`/`capabilities`/`strengths`/`health_check` shape.

use async_trait::async_trait;
use serde_json::{json, Value};

use aios_common::error::AgentError;

use crate::types::ExpertHealthState;

#[async_trait]
pub trait ExpertAdapter: Send + Sync {
    async fn initialize(&mut self) -> Result<(), AgentError> {
        Ok(())
    }

    async fn execute(&self, prompt: &str, context: &Value) -> Result<Value, AgentError>;

    async fn shutdown(&mut self) -> Result<(), AgentError> {
        Ok(())
    }

    fn health(&self) -> ExpertHealthState {
        ExpertHealthState::Available
    }
}

/// Text generation expert — `claude_agent.py` / `gemini_agent.py` shape:
/// build a single prompt, call an external HTTP endpoint, parse one reply.
pub struct TextGenerationAdapter {
    endpoint: String,
    client: reqwest::Client,
}

impl TextGenerationAdapter {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ExpertAdapter for TextGenerationAdapter {
    async fn execute(&self, prompt: &str, _context: &Value) -> Result<Value, AgentError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "prompt": prompt }))
            .send()
            .await
            .map_err(|e| AgentError::Execution {
                agent: "text_generation".to_string(),
                message: e.to_string(),
            })?;

        response.json::<Value>().await.map_err(|e| AgentError::Execution {
            agent: "text_generation".to_string(),
            message: e.to_string(),
        })
    }
}

/// Knowledge expert — `secondbrain_agents.py::ObsidianManagerAgent`:
/// keyword-inspects the request to decide which MCP tool to call, then
/// delegates to the resources tier's MCP manager.
pub struct KnowledgeAdapter {
    server: String,
    mcp: std::sync::Arc<aios_layer5::McpManager>,
}

impl KnowledgeAdapter {
    pub fn new(server: impl Into<String>, mcp: std::sync::Arc<aios_layer5::McpManager>) -> Self {
        Self {
            server: server.into(),
            mcp,
        }
    }

    fn tool_for(&self, prompt: &str) -> &'static str {
        let lower = prompt.to_lowercase();
        if lower.contains("search") || lower.contains("find") {
            "search_notes"
        } else if lower.contains("write") || lower.contains("save") || lower.contains("create") {
            "write_note"
        } else {
            "read_note"
        }
    }
}

#[async_trait]
impl ExpertAdapter for KnowledgeAdapter {
    async fn execute(&self, prompt: &str, context: &Value) -> Result<Value, AgentError> {
        let tool = self.tool_for(prompt);
        self.mcp
            .call_tool(&self.server, tool, context.clone())
            .await
            .map(|r| r.output)
            .map_err(|e| AgentError::Execution {
                agent: "knowledge".to_string(),
                message: e.to_string(),
            })
    }
}

/// Analytics expert — `secondbrain_agents.py::BAAgent`: deterministic local
/// computation (here: a quote/utilization estimate from numeric fields in
/// `context`) plus a document-search tool call against the resources tier.
pub struct AnalyticsAdapter {
    server: String,
    mcp: std::sync::Arc<aios_layer5::McpManager>,
}

impl AnalyticsAdapter {
    pub fn new(server: impl Into<String>, mcp: std::sync::Arc<aios_layer5::McpManager>) -> Self {
        Self {
            server: server.into(),
            mcp,
        }
    }

    fn estimate_utilization(context: &Value) -> Option<f64> {
        let hours_used = context.get("hours_used")?.as_f64()?;
        let hours_available = context.get("hours_available")?.as_f64()?;
        if hours_available <= 0.0 {
            return None;
        }
        Some((hours_used / hours_available).clamp(0.0, 1.0))
    }
}

#[async_trait]
impl ExpertAdapter for AnalyticsAdapter {
    async fn execute(&self, prompt: &str, context: &Value) -> Result<Value, AgentError> {
        let utilization = Self::estimate_utilization(context);

        let search = self
            .mcp
            .call_tool(&self.server, "search_notes", json!({ "query": prompt }))
            .await
            .map(|r| r.output)
            .unwrap_or(Value::Null);

        Ok(json!({
            "utilization": utilization,
            "supporting_documents": search,
        }))
    }
}
