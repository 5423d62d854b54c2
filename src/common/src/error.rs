//! Error taxonomy shared by every tier.
//!
//! Mirrors the layered exception hierarchy the platform was designed around:
//! each tier raises its own narrow error type, and anything that should abort
//! a `process()` call rather than be folded into a response envelope bubbles
//! up as a [`CoreError`] variant.

use thiserror::Error;

/// Top-level error returned by `Tier::process` and platform wiring.
///
/// Ordinary, expected failures (rate limiting, validation, an unavailable
/// agent, a timed-out tool call) are represented as a non-success
/// [`crate::envelope::Outcome`] instead of propagating through here — see
/// SPEC_FULL.md §7. `CoreError` is reserved for conditions a tier cannot
/// itself turn into a meaningful response.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Interface(#[from] InterfaceError),

    #[error(transparent)]
    Intelligence(#[from] IntelligenceError),

    #[error(transparent)]
    Orchestration(#[from] OrchestrationError),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error("poisoned lock in {component}")]
    Poisoned { component: &'static str },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Fields every concrete error type exposes, matching `core/exceptions.py`'s
/// `AIError.to_dict()` contract (code, message, recoverable, details).
pub trait AiError: std::error::Error {
    fn code(&self) -> &'static str;
    fn recoverable(&self) -> bool;
}

#[derive(Debug, Error)]
pub enum InterfaceError {
    #[error("validation failed for field '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimit { retry_after_secs: u64 },

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("malformed webhook payload: {0}")]
    WebhookSignature(String),
}

impl AiError for InterfaceError {
    fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "INTERFACE_VALIDATION",
            Self::RateLimit { .. } => "INTERFACE_RATE_LIMIT",
            Self::Authentication(_) => "INTERFACE_AUTH",
            Self::WebhookSignature(_) => "INTERFACE_WEBHOOK_SIGNATURE",
        }
    }

    fn recoverable(&self) -> bool {
        matches!(self, Self::RateLimit { .. })
    }
}

#[derive(Debug, Error)]
pub enum IntelligenceError {
    #[error("routing failed: {0}")]
    Routing(String),

    #[error("classification failed: {0}")]
    Classification(String),

    #[error("session context not found: {0}")]
    ContextNotFound(String),
}

impl AiError for IntelligenceError {
    fn code(&self) -> &'static str {
        match self {
            Self::Routing(_) => "INTELLIGENCE_ROUTING",
            Self::Classification(_) => "INTELLIGENCE_CLASSIFICATION",
            Self::ContextNotFound(_) => "INTELLIGENCE_CONTEXT_NOT_FOUND",
        }
    }

    fn recoverable(&self) -> bool {
        matches!(self, Self::ContextNotFound(_))
    }
}

#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("pipeline execution failed: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("risk validation rejected the operation: {0}")]
    RiskRejected(String),

    #[error("workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("checkpoint not found: {0}")]
    CheckpointNotFound(String),
}

impl AiError for OrchestrationError {
    fn code(&self) -> &'static str {
        match self {
            Self::Pipeline(_) => "ORCHESTRATION_PIPELINE",
            Self::RiskRejected(_) => "ORCHESTRATION_RISK_REJECTED",
            Self::WorkflowNotFound(_) => "ORCHESTRATION_WORKFLOW_NOT_FOUND",
            Self::CheckpointNotFound(_) => "ORCHESTRATION_CHECKPOINT_NOT_FOUND",
        }
    }

    fn recoverable(&self) -> bool {
        matches!(self, Self::WorkflowNotFound(_) | Self::CheckpointNotFound(_))
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("node '{node}' exceeded its retry budget: {reason}")]
    RetriesExhausted { node: String, reason: String },

    #[error("dependency cycle detected among nodes: {0:?}")]
    Cycle(Vec<String>),

    #[error("node '{0}' timed out")]
    Timeout(String),

    #[error("workflow cancelled")]
    Cancelled,
}

impl AiError for PipelineError {
    fn code(&self) -> &'static str {
        match self {
            Self::RetriesExhausted { .. } => "PIPELINE_RETRIES_EXHAUSTED",
            Self::Cycle(_) => "PIPELINE_CYCLE",
            Self::Timeout(_) => "PIPELINE_TIMEOUT",
            Self::Cancelled => "PIPELINE_CANCELLED",
        }
    }

    fn recoverable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Cancelled)
    }
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent '{0}' is unavailable")]
    Unavailable(String),

    #[error("agent '{0}' timed out after {1}s")]
    Timeout(String, u64),

    #[error("agent '{agent}' execution error: {message}")]
    Execution { agent: String, message: String },
}

impl AiError for AgentError {
    fn code(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "AGENT_UNAVAILABLE",
            Self::Timeout(..) => "AGENT_TIMEOUT",
            Self::Execution { .. } => "AGENT_EXECUTION",
        }
    }

    fn recoverable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(..))
    }
}

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("MCP server error: {0}")]
    MCPServer(#[from] MCPServerError),

    #[error("data store error: {0}")]
    DataStore(#[from] DataStoreError),
}

impl AiError for ResourceError {
    fn code(&self) -> &'static str {
        match self {
            Self::MCPServer(_) => "RESOURCE_MCP_SERVER",
            Self::DataStore(_) => "RESOURCE_DATA_STORE",
        }
    }

    fn recoverable(&self) -> bool {
        false
    }
}

#[derive(Debug, Error)]
pub enum MCPServerError {
    #[error("server '{0}' is not registered")]
    UnknownServer(String),

    #[error("tool '{tool}' is not offered by server '{server}'")]
    UnknownTool { server: String, tool: String },

    #[error("tool invocation failed: {0}")]
    InvocationFailed(String),
}

#[derive(Debug, Error)]
pub enum DataStoreError {
    #[error("key '{0}' not found")]
    KeyNotFound(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
