//! DAG workflow types, grounded on spec.md §4.3.3 (the redesigned DAG
//! executor) rather than the original's linear `pipeline.py::Pipeline`.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeStatus {
    Pending,
    Ready,
    Running,
    Completed,
    Failed,
    Skipped,
    Cancelled,
}

impl Default for NodeStatus {
    fn default() -> Self {
        NodeStatus::Pending
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BranchCondition {
    Always,
    OnSuccess,
    OnFailure,
    /// The predicate itself is registered out-of-band (see
    /// `workflow::Engine::register_predicate`) rather than carried inline,
    /// so the node stays serializable across checkpoints.
    OnCondition,
}

impl Default for BranchCondition {
    fn default() -> Self {
        BranchCondition::Always
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowNode {
    pub id: String,
    pub name: String,
    pub expert_hint: Option<String>,
    pub prompt_template: Option<String>,
    pub depends_on: Vec<String>,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub continue_on_error: bool,
    pub branch: BranchCondition,

    #[serde(skip)]
    pub status: NodeStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl WorkflowNode {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            expert_hint: None,
            prompt_template: None,
            depends_on: Vec::new(),
            timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
            continue_on_error: false,
            branch: BranchCondition::Always,
            status: NodeStatus::Pending,
            attempts: 0,
            last_error: None,
        }
    }

    pub fn depends_on(mut self, ids: impl IntoIterator<Item = &'static str>) -> Self {
        self.depends_on = ids.into_iter().map(str::to_string).collect();
        self
    }

    pub fn with_expert(mut self, expert: impl Into<String>) -> Self {
        self.expert_hint = Some(expert.into());
        self
    }

    pub fn with_prompt(mut self, template: impl Into<String>) -> Self {
        self.prompt_template = Some(template.into());
        self
    }

    pub fn with_branch(mut self, branch: BranchCondition) -> Self {
        self.branch = branch;
        self
    }

    pub fn continue_on_error(mut self) -> Self {
        self.continue_on_error = true;
        self
    }
}

/// The "first/primary step" spec.md §4.3.3 refers to when deciding overall
/// workflow success — by convention, the first node added.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    pub nodes: Vec<WorkflowNode>,
    pub parallelism: usize,
    pub checkpoint_every_transition: bool,
}

impl Workflow {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            nodes: Vec::new(),
            parallelism: 5,
            checkpoint_every_transition: false,
        }
    }

    pub fn primary_node_id(&self) -> Option<&str> {
        self.nodes.first().map(|n| n.id.as_str())
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut WorkflowNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn node(&self, id: &str) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// Construction sugar for the common linear case — each `step` call adds a
/// node depending on the previously-added one.
pub struct PipelineBuilder {
    workflow: Workflow,
    last_id: Option<String>,
}

impl PipelineBuilder {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            workflow: Workflow::new(id, name),
            last_id: None,
        }
    }

    pub fn step(mut self, mut node: WorkflowNode) -> Self {
        if let Some(prev) = &self.last_id {
            if node.depends_on.is_empty() {
                node.depends_on.push(prev.clone());
            }
        }
        self.last_id = Some(node.id.clone());
        self.workflow.nodes.push(node);
        self
    }

    pub fn build(self) -> Workflow {
        self.workflow
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecutionResult {
    pub workflow_id: String,
    pub success: bool,
    pub steps_completed: usize,
    pub results: HashMap<String, Value>,
    pub final_node_statuses: HashMap<String, NodeStatus>,
}

/// One node's contribution to a [`WorkflowCheckpoint`] — self-describing
/// enough to inspect or resume from without the live `Workflow` around.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeCheckpoint {
    pub status: NodeStatus,
    pub attempts: u32,
    pub error: Option<String>,
    pub expert_hint: Option<String>,
    pub prompt_template: Option<String>,
    pub depends_on: Vec<String>,
}

impl From<&WorkflowNode> for NodeCheckpoint {
    fn from(node: &WorkflowNode) -> Self {
        Self {
            status: node.status,
            attempts: node.attempts,
            error: node.last_error.clone(),
            expert_hint: node.expert_hint.clone(),
            prompt_template: node.prompt_template.clone(),
            depends_on: node.depends_on.clone(),
        }
    }
}

/// Snapshot used by `checkpoint`/`restore`, per spec.md §4.3.3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowCheckpoint {
    pub id: String,
    pub workflow_id: String,
    pub nodes: HashMap<String, NodeCheckpoint>,
    pub results: HashMap<String, Value>,
}
