//! The single value type that flows through all five tiers.
//!
//! Grounded on `core/base.py`'s `AIRequest`/`AIResponse` dataclasses: an
//! immutable envelope carrying the user's request plus everything each tier
//! appends, paired with a response envelope that always gets produced, even
//! on failure (SPEC_FULL.md §7).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Priority assigned to a request, ported from `core/base.py::TaskPriority`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Critical,
    High,
    Normal,
    Low,
    Background,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

/// Terminal and intermediate status values a response can carry, ported from
/// `core/base.py::TaskStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Pending,
    Queued,
    Running,
    Success,
    Failed,
    Cancelled,
    Timeout,
    Retrying,
}

/// Who or what is making the request — the key space the rate limiter,
/// router and session context all index by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Identity {
    User(String),
    Source(String),
}

impl Identity {
    pub fn as_str(&self) -> &str {
        match self {
            Identity::User(s) | Identity::Source(s) => s,
        }
    }
}

/// The kind of work a request represents, ported from
/// `core/base.py::AIRequest.request_type`. L1's built-in dispatch switches
/// on this before ever reaching L2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    General,
    Query,
    Command,
    Workflow,
    Webhook,
}

impl Default for RequestKind {
    fn default() -> Self {
        RequestKind::General
    }
}

/// The request envelope threaded from L1 through to L5 and back.
///
/// Each tier appends to `layer_trace` and may set tier-specific fields
/// (`classification`, `routing`, `plan_id`, ...) via the `with_*` builders
/// rather than mutating in place, keeping wiring one-directional. Routing
/// hints that a single upstream layer owns outright (`target_agent`,
/// `target_workflow`, `classification`) live in `context` rather than as
/// first-class fields, matching the convention every tier crate already
/// reads/writes them through (`context_str`, `with_context_value`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub request_id: Uuid,
    pub trace_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub session_id: Uuid,
    pub identity: Identity,
    pub request_type: RequestKind,
    pub source: String,
    pub priority: Priority,
    pub text: String,
    pub context: HashMap<String, Value>,
    pub attachments: Vec<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub layer_trace: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Envelope {
    pub fn new(identity: Identity, text: impl Into<String>) -> Self {
        let source = identity.as_str().to_string();
        Self {
            request_id: Uuid::new_v4(),
            trace_id: Uuid::new_v4(),
            parent_id: None,
            session_id: Uuid::new_v4(),
            identity,
            request_type: RequestKind::default(),
            source,
            priority: Priority::default(),
            text: text.into(),
            context: HashMap::new(),
            attachments: Vec::new(),
            timeout_secs: 300,
            max_retries: 2,
            layer_trace: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_session(mut self, session_id: Uuid) -> Self {
        self.session_id = session_id;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_request_type(mut self, kind: RequestKind) -> Self {
        self.request_type = kind;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_parent(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_context_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    /// Derives a child envelope for a sub-pipeline (e.g. one DAG step's
    /// call down into L4): fresh `request_id`, same `trace_id`, `parent_id`
    /// pointing back at `self`.
    pub fn child(&self, text: impl Into<String>) -> Self {
        Self::new(self.identity.clone(), text)
            .with_session(self.session_id)
            .with_parent(self.request_id)
            .with_source(self.source.clone())
    }

    pub fn traced(mut self, layer: &str) -> Self {
        self.layer_trace.push(layer.to_string());
        self
    }

    pub fn context_str(&self, key: &str) -> Option<&str> {
        self.context.get(key).and_then(Value::as_str)
    }

    /// The identity key the rate limiter, router performance table and
    /// session context all index by: `user_id` if set, else `source`
    /// (spec.md §4.1).
    pub fn rate_limit_key(&self) -> &str {
        self.identity.as_str()
    }
}

/// The response envelope, always produced — successful or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub request_id: Uuid,
    pub success: bool,
    pub status: Status,
    pub result: Option<Value>,
    pub error: Option<ErrorInfo>,
    pub executed_by: Option<String>,
    pub steps_completed: u32,
    pub total_steps: u32,
    pub layer_trace: Vec<String>,
    pub artifacts: HashMap<String, Value>,
    pub metadata: HashMap<String, Value>,
    pub duration_ms: u64,
    pub completed_at: DateTime<Utc>,
}

/// Serializable shadow of an [`crate::error::AiError`] for the response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
    pub recoverable: bool,
    pub details: HashMap<String, Value>,
}

impl Outcome {
    pub fn success(request_id: Uuid, result: Value, layer_trace: Vec<String>, duration_ms: u64) -> Self {
        Self {
            request_id,
            success: true,
            status: Status::Success,
            result: Some(result),
            error: None,
            executed_by: None,
            steps_completed: 0,
            total_steps: 0,
            layer_trace,
            artifacts: HashMap::new(),
            metadata: HashMap::new(),
            duration_ms,
            completed_at: Utc::now(),
        }
    }

    pub fn error(
        request_id: Uuid,
        status: Status,
        error: ErrorInfo,
        layer_trace: Vec<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            request_id,
            success: false,
            status,
            result: None,
            error: Some(error),
            executed_by: None,
            steps_completed: 0,
            total_steps: 0,
            layer_trace,
            artifacts: HashMap::new(),
            metadata: HashMap::new(),
            duration_ms,
            completed_at: Utc::now(),
        }
    }

    pub fn with_executed_by(mut self, label: impl Into<String>) -> Self {
        self.executed_by = Some(label.into());
        self
    }

    pub fn with_steps(mut self, completed: u32, total: u32) -> Self {
        self.steps_completed = completed;
        self.total_steps = total;
        self
    }

    pub fn with_artifact(mut self, key: impl Into<String>, value: Value) -> Self {
        self.artifacts.insert(key.into(), value);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_are_additive() {
        let envelope = Envelope::new(Identity::User("alice".into()), "do a thing")
            .with_priority(Priority::High)
            .traced("l1")
            .traced("l2");

        assert_eq!(envelope.priority, Priority::High);
        assert_eq!(envelope.layer_trace, vec!["l1", "l2"]);
    }

    #[test]
    fn identity_as_str_unwraps_either_variant() {
        assert_eq!(Identity::User("bob".into()).as_str(), "bob");
        assert_eq!(Identity::Source("webhook".into()).as_str(), "webhook");
    }
}
