//! The DAG workflow engine (REDESIGN FLAG — spec.md §4.3.3 generalizes the
//! original's linear `pipeline.py::Pipeline` into dependency-graph
//! execution with READY-wave scheduling, branch conditions, retry/backoff,
//! cancellation and checkpoint/restore).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use aios_common::error::PipelineError;

use crate::types::{
    BranchCondition, NodeCheckpoint, NodeStatus, Workflow, WorkflowCheckpoint, WorkflowExecutionResult, WorkflowNode,
};

/// Executes a single node, given the accumulated results map. Implemented
/// by the orchestration tier's dispatch-to-L4 adapter; kept as a trait so
/// the engine itself has no dependency on the agents tier.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    async fn execute(&self, node: &WorkflowNode, results: &HashMap<String, Value>) -> Result<Value, PipelineError>;
}

pub type Predicate = Arc<dyn Fn(&HashMap<String, Value>) -> bool + Send + Sync>;

pub struct Engine {
    checkpoint_dir: PathBuf,
    sequence: AtomicU64,
    predicates: std::sync::Mutex<HashMap<String, Predicate>>,
}

impl Engine {
    pub fn new(checkpoint_dir: impl Into<PathBuf>) -> Self {
        Self {
            checkpoint_dir: checkpoint_dir.into(),
            sequence: AtomicU64::new(0),
            predicates: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Registers the predicate an `OnCondition` node evaluates. Not part of
    /// the checkpointed state — re-register after a restore.
    pub fn register_predicate(&self, node_id: impl Into<String>, predicate: Predicate) {
        self.predicates.lock().expect("engine mutex poisoned").insert(node_id.into(), predicate);
    }

    /// Runs `workflow` to completion (or deadlock/cancellation), mutating
    /// node statuses in place.
    pub async fn run(
        &self,
        workflow: &mut Workflow,
        executor: Arc<dyn NodeExecutor>,
        cancel: &CancellationToken,
    ) -> Result<WorkflowExecutionResult, PipelineError> {
        let mut results: HashMap<String, Value> = HashMap::new();
        let semaphore = Arc::new(Semaphore::new(workflow.parallelism.max(1)));

        if workflow.checkpoint_every_transition {
            self.checkpoint(workflow, &results).await.ok();
        }

        loop {
            if cancel.is_cancelled() {
                for node in workflow.nodes.iter_mut() {
                    if matches!(node.status, NodeStatus::Pending | NodeStatus::Ready) {
                        node.status = NodeStatus::Cancelled;
                    }
                }
                break;
            }

            let dep_statuses: HashMap<String, NodeStatus> =
                workflow.nodes.iter().map(|n| (n.id.clone(), n.status)).collect();

            let mut ready_ids = Vec::new();
            for node in workflow.nodes.iter_mut() {
                if node.status != NodeStatus::Pending {
                    continue;
                }
                let deps_terminal = node.depends_on.iter().all(|d| {
                    matches!(
                        dep_statuses.get(d),
                        Some(NodeStatus::Completed) | Some(NodeStatus::Failed) | Some(NodeStatus::Skipped) | Some(NodeStatus::Cancelled)
                    )
                });
                if !deps_terminal {
                    continue;
                }

                let proceed = match node.branch {
                    BranchCondition::Always => true,
                    BranchCondition::OnSuccess => node
                        .depends_on
                        .iter()
                        .all(|d| dep_statuses.get(d) == Some(&NodeStatus::Completed)),
                    BranchCondition::OnFailure => node
                        .depends_on
                        .iter()
                        .any(|d| dep_statuses.get(d) == Some(&NodeStatus::Failed)),
                    BranchCondition::OnCondition => {
                        let predicates = self.predicates.lock().expect("engine mutex poisoned");
                        predicates.get(&node.id).map(|p| p(&results)).unwrap_or(false)
                    }
                };

                if proceed {
                    node.status = NodeStatus::Ready;
                    ready_ids.push(node.id.clone());
                } else {
                    node.status = NodeStatus::Skipped;
                }
            }

            let any_running = workflow.nodes.iter().any(|n| n.status == NodeStatus::Running);
            if ready_ids.is_empty() && !any_running {
                let unresolved: Vec<&str> = workflow
                    .nodes
                    .iter()
                    .filter(|n| matches!(n.status, NodeStatus::Pending))
                    .map(|n| n.id.as_str())
                    .collect();
                if !unresolved.is_empty() {
                    return Err(PipelineError::Cycle(unresolved.into_iter().map(String::from).collect()));
                }
                break;
            }

            let mut handles = Vec::new();
            for id in &ready_ids {
                if let Some(node) = workflow.node_mut(id) {
                    node.status = NodeStatus::Running;
                }
            }
            for id in ready_ids {
                let node = workflow.node(&id).expect("just marked running").clone();
                let permit = semaphore.clone().acquire_owned().await.expect("semaphore closed");
                let results_snapshot = results.clone();
                let cancel = cancel.clone();
                let executor = executor.clone();
                handles.push(tokio::spawn(run_node_with_retry(node, results_snapshot, permit, cancel, executor)));
            }

            for handle in handles {
                let (id, outcome, attempts) = handle.await.map_err(|e| PipelineError::RetriesExhausted {
                    node: "unknown".to_string(),
                    reason: e.to_string(),
                })?;
                if let Some(node) = workflow.node_mut(&id) {
                    node.attempts = attempts;
                }
                match outcome {
                    Ok(value) => {
                        if let Some(node) = workflow.node_mut(&id) {
                            node.status = NodeStatus::Completed;
                            node.last_error = None;
                        }
                        results.insert(id, value);
                    }
                    Err(e) => {
                        if let Some(node) = workflow.node_mut(&id) {
                            node.status = NodeStatus::Failed;
                            node.last_error = Some(e.to_string());
                        }
                    }
                }
            }

            if workflow.checkpoint_every_transition {
                self.checkpoint(workflow, &results).await.ok();
            }
        }

        self.checkpoint(workflow, &results).await.ok();

        let steps_completed = workflow.nodes.iter().filter(|n| n.status == NodeStatus::Completed).count();
        let success = workflow
            .primary_node_id()
            .and_then(|id| workflow.node(id))
            .map(|n| n.status == NodeStatus::Completed)
            .unwrap_or(false);

        Ok(WorkflowExecutionResult {
            workflow_id: workflow.id.clone(),
            success,
            steps_completed,
            results,
            final_node_statuses: workflow.nodes.iter().map(|n| (n.id.clone(), n.status)).collect(),
        })
    }

    pub async fn checkpoint(
        &self,
        workflow: &Workflow,
        results: &HashMap<String, Value>,
    ) -> Result<String, PipelineError> {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let checkpoint_id = format!(
            "cp_{}_{}_{}",
            workflow.id,
            sequence,
            Utc::now().format("%H%M%S")
        );
        let checkpoint = WorkflowCheckpoint {
            id: checkpoint_id.clone(),
            workflow_id: workflow.id.clone(),
            nodes: workflow
                .nodes
                .iter()
                .map(|n| (n.id.clone(), NodeCheckpoint::from(n)))
                .collect(),
            results: results.clone(),
        };

        tokio::fs::create_dir_all(&self.checkpoint_dir)
            .await
            .map_err(|e| PipelineError::RetriesExhausted {
                node: "checkpoint".to_string(),
                reason: e.to_string(),
            })?;
        let path = self.checkpoint_dir.join(format!("{checkpoint_id}.json"));
        let content = serde_json::to_string_pretty(&checkpoint).map_err(|e| PipelineError::RetriesExhausted {
            node: "checkpoint".to_string(),
            reason: e.to_string(),
        })?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| PipelineError::RetriesExhausted {
                node: "checkpoint".to_string(),
                reason: e.to_string(),
            })?;

        Ok(checkpoint_id)
    }

    /// Reconstructs node statuses and the results map from a checkpoint.
    /// Pending/Running nodes at snapshot time come back as `Pending` so
    /// they re-execute, per spec.md §4.3.3's restore semantics.
    pub async fn restore(
        &self,
        checkpoint_id: &str,
        workflow: &mut Workflow,
    ) -> Result<HashMap<String, Value>, PipelineError> {
        let path = self.checkpoint_dir.join(format!("{checkpoint_id}.json"));
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|_| PipelineError::RetriesExhausted {
                node: checkpoint_id.to_string(),
                reason: "checkpoint not found".to_string(),
            })?;
        let checkpoint: WorkflowCheckpoint =
            serde_json::from_str(&content).map_err(|e| PipelineError::RetriesExhausted {
                node: checkpoint_id.to_string(),
                reason: e.to_string(),
            })?;

        for node in workflow.nodes.iter_mut() {
            match checkpoint.nodes.get(&node.id) {
                Some(saved) => {
                    node.status = match saved.status {
                        NodeStatus::Running | NodeStatus::Ready => NodeStatus::Pending,
                        status => status,
                    };
                    node.attempts = saved.attempts;
                    node.last_error = saved.error.clone();
                }
                None => node.status = NodeStatus::Pending,
            }
        }

        Ok(checkpoint.results)
    }
}

async fn run_node_with_retry(
    mut node: WorkflowNode,
    results: HashMap<String, Value>,
    _permit: tokio::sync::OwnedSemaphorePermit,
    cancel: CancellationToken,
    executor: Arc<dyn NodeExecutor>,
) -> (String, Result<Value, PipelineError>, u32) {
    let id = node.id.clone();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                return (id, Err(PipelineError::Cancelled), node.attempts);
            }
            outcome = tokio::time::timeout(node.timeout, executor.execute(&node, &results)) => {
                match outcome {
                    Ok(Ok(value)) => return (id, Ok(value), node.attempts),
                    Ok(Err(_)) | Err(_) => {
                        if node.attempts >= node.retry.max_retries {
                            return (id, Err(PipelineError::RetriesExhausted {
                                node: id.clone(),
                                reason: "exhausted retry budget".to_string(),
                            }), node.attempts);
                        }
                        let delay = node.retry.base_delay * 2u32.pow(node.attempts);
                        node.attempts += 1;
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RetryPolicy;

    /// Fails every node named `primary`, succeeds everything else.
    struct FailPrimary;

    #[async_trait]
    impl NodeExecutor for FailPrimary {
        async fn execute(&self, node: &WorkflowNode, _results: &HashMap<String, Value>) -> Result<Value, PipelineError> {
            if node.id == "primary" {
                Err(PipelineError::RetriesExhausted {
                    node: node.id.clone(),
                    reason: "boom".to_string(),
                })
            } else {
                Ok(Value::String(node.id.clone()))
            }
        }
    }

    fn no_retry(mut node: WorkflowNode) -> WorkflowNode {
        node.retry = RetryPolicy { max_retries: 0, base_delay: std::time::Duration::from_millis(1) };
        node
    }

    #[tokio::test]
    async fn on_failure_branch_off_the_primary_still_runs_when_primary_fails() {
        let mut workflow = Workflow::new("wf", "test");
        workflow.nodes = vec![
            no_retry(WorkflowNode::new("primary")),
            no_retry(WorkflowNode::new("on_success").depends_on(["primary"]).with_branch(BranchCondition::OnSuccess)),
            no_retry(WorkflowNode::new("on_failure").depends_on(["primary"]).with_branch(BranchCondition::OnFailure)),
        ];

        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::new(dir.path());
        let cancel = CancellationToken::new();
        let result = engine.run(&mut workflow, Arc::new(FailPrimary), &cancel).await.unwrap();

        assert!(!result.success, "primary failed, so the whole run is not a success");
        assert_eq!(result.final_node_statuses["primary"], NodeStatus::Failed);
        assert_eq!(
            result.final_node_statuses["on_success"],
            NodeStatus::Skipped,
            "ON_SUCCESS branch must not run off a failed primary"
        );
        assert_eq!(
            result.final_node_statuses["on_failure"],
            NodeStatus::Completed,
            "ON_FAILURE recovery branch must still execute"
        );
        assert!(workflow.node("primary").unwrap().last_error.is_some());
    }
}
