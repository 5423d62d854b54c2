//! Orchestration tier (L3): strategy selection, risk validation, the DAG
//! workflow engine and the scheduler, fronted by a `Tier` implementation.

pub mod risk;
pub mod scheduler;
pub mod types;
pub mod workflow;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use aios_common::envelope::{Envelope, ErrorInfo, Outcome, Status};
use aios_common::error::{AiError, CoreError, OrchestrationError};
use aios_common::tier::{Tier, TierHealth};
use aios_layer4::AgentsTier;

pub use risk::{ActionRequest, CheckResult, Checker, CompositeChecker, RiskLevel};
pub use scheduler::{next_run_after, parse_schedule, Schedule, ScheduledTask, Scheduler, WorkflowInvoker};
pub use types::{
    BranchCondition, NodeCheckpoint, NodeStatus, PipelineBuilder, RetryPolicy, Workflow, WorkflowExecutionResult,
    WorkflowNode,
};
pub use workflow::{Engine, NodeExecutor};

/// Which of the three strategies spec.md §4.3.1 names was selected for a
/// given request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Workflow,
    Pipeline,
    Single,
}

fn select_strategy(request: &Envelope) -> Strategy {
    if request.context.contains_key("target_workflow") {
        return Strategy::Workflow;
    }
    let complex = request.context_str("complexity") == Some("complex");
    let multi_agent = request
        .context
        .get("requires_multi_agent")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if complex || multi_agent {
        Strategy::Pipeline
    } else {
        Strategy::Single
    }
}

/// Synthesizes a workflow on the fly: one primary step, one secondary step
/// per configured secondary expert, and a final synthesis step.
fn synthesize_pipeline(request: &Envelope) -> Workflow {
    let secondary_experts: Vec<String> = request
        .context
        .get("secondary_experts")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).map(String::from).collect())
        .unwrap_or_default();

    let mut builder = PipelineBuilder::new(format!("pipeline-{}", request.request_id), "synthesized pipeline");
    let primary = WorkflowNode::new("primary").with_prompt(request.text.clone());
    let primary = match request.context_str("target_agent") {
        Some(agent) => primary.with_expert(agent),
        None => primary,
    };
    builder = builder.step(primary);

    for (i, expert) in secondary_experts.iter().enumerate() {
        let node = WorkflowNode::new(format!("secondary_{i}"))
            .depends_on(["primary"])
            .with_expert(expert.clone())
            .with_prompt(request.text.clone())
            .continue_on_error();
        builder = builder.step(node);
    }

    // `step()` auto-chains each new node to the previously-added one, so
    // the synthesis step already depends on the last secondary (or on
    // primary directly, when there are no secondaries).
    let synthesis = WorkflowNode::new("synthesize").with_prompt("{prev_step}");
    builder.step(synthesis).build()
}

/// Calls an expert through the agents tier's registry — the `NodeExecutor`
/// every workflow run uses. Resolves `{prev_step}` substitutions from the
/// node's own dependencies before dispatch.
struct DispatchExecutor {
    agents: Arc<AgentsTier>,
}

#[async_trait]
impl NodeExecutor for DispatchExecutor {
    async fn execute(
        &self,
        node: &WorkflowNode,
        results: &HashMap<String, Value>,
    ) -> Result<Value, aios_common::error::PipelineError> {
        let prompt = resolve_prompt(node, results);
        let context = json!({});
        self.agents
            .registry()
            .dispatch(node.expert_hint.as_deref().unwrap_or("default"), &prompt, &context, node.timeout)
            .await
            .map_err(|e| match e {
                aios_common::error::AgentError::Timeout(..) => aios_common::error::PipelineError::Timeout(node.id.clone()),
                other => aios_common::error::PipelineError::RetriesExhausted {
                    node: node.id.clone(),
                    reason: other.to_string(),
                },
            })
            .map(|(value, _label)| value)
    }
}

fn resolve_prompt(node: &WorkflowNode, results: &HashMap<String, Value>) -> String {
    let template = node.prompt_template.clone().unwrap_or_default();
    if !template.contains("{prev_step}") {
        return template;
    }
    let substitution = node
        .depends_on
        .first()
        .and_then(|dep| results.get(dep))
        .map(|v| v.to_string())
        .unwrap_or_default();
    template.replace("{prev_step}", &substitution)
}

fn action_request_from(request: &Envelope) -> ActionRequest {
    ActionRequest {
        action_name: request.context_str("action_name").unwrap_or(&request.text).to_string(),
        target_sites: request
            .context
            .get("target_sites")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(Value::as_str).map(String::from).collect())
            .unwrap_or_default(),
        target_devices: request
            .context
            .get("target_devices")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(Value::as_str).map(String::from).collect())
            .unwrap_or_default(),
        plan: request.context.get("plan").cloned().unwrap_or(json!({})),
        user: request.identity.as_str().to_string(),
        metadata: request.context.get("metadata").cloned().unwrap_or(json!({})),
    }
}

pub struct OrchestrationConfig {
    pub checkpoint_dir: std::path::PathBuf,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir: std::path::PathBuf::from("./data/checkpoints"),
        }
    }
}

pub struct OrchestrationTier {
    agents: Arc<AgentsTier>,
    engine: Engine,
    checker: CompositeChecker,
    workflows: RwLock<HashMap<String, Workflow>>,
    pub scheduler: Scheduler,
}

impl OrchestrationTier {
    pub fn new(agents: AgentsTier, config: OrchestrationConfig) -> Self {
        Self {
            agents: Arc::new(agents),
            engine: Engine::new(config.checkpoint_dir),
            checker: CompositeChecker::with_builtin_checks(),
            workflows: RwLock::new(HashMap::new()),
            scheduler: Scheduler::new(),
        }
    }

    pub fn register_workflow(&self, workflow: Workflow) {
        self.workflows.write().insert(workflow.id.clone(), workflow);
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Exposes the underlying agents tier so L2's router can read expert
    /// descriptors (capabilities, strengths, performance) for MoE scoring
    /// without L2 holding its own separate registry handle.
    pub fn agents(&self) -> &Arc<AgentsTier> {
        &self.agents
    }

    /// Ids of every workflow registered via `register_workflow` — backs the
    /// `GET /workflows` surface (spec.md §6).
    pub fn workflow_ids(&self) -> Vec<String> {
        self.workflows.read().keys().cloned().collect()
    }

    async fn run_workflow(&self, mut workflow: Workflow) -> Result<Outcome, OrchestrationError> {
        let executor: Arc<dyn NodeExecutor> = Arc::new(DispatchExecutor { agents: self.agents.clone() });
        let cancel = CancellationToken::new();
        let result = self.engine.run(&mut workflow, executor, &cancel).await?;
        Ok(workflow_result_to_outcome(result))
    }
}

fn workflow_result_to_outcome(result: WorkflowExecutionResult) -> Outcome {
    let status = if result.success { Status::Success } else { Status::Failed };
    let payload = json!({
        "workflow_id": result.workflow_id,
        "steps_completed": result.steps_completed,
        "results": result.results,
        "node_statuses": result.final_node_statuses,
    });
    let total_steps = result.final_node_statuses.len() as u32;
    Outcome {
        request_id: uuid::Uuid::new_v4(),
        success: result.success,
        status,
        result: Some(payload),
        error: None,
        executed_by: Some(result.workflow_id.clone()),
        steps_completed: result.steps_completed as u32,
        total_steps,
        layer_trace: vec!["layer3".to_string()],
        artifacts: Default::default(),
        metadata: Default::default(),
        duration_ms: 0,
        completed_at: chrono::Utc::now(),
    }
}

#[async_trait]
impl Tier for OrchestrationTier {
    async fn process(&self, request: Envelope) -> Result<Outcome, CoreError> {
        let started = Instant::now();
        let request_id = request.request_id;

        let verdict = self.checker.evaluate(&action_request_from(&request));
        if matches!(verdict.level, RiskLevel::Escalate | RiskLevel::Rejected) {
            let duration_ms = started.elapsed().as_millis() as u64;
            let trace = request.traced("layer3").layer_trace;
            return Ok(Outcome::error(
                request_id,
                Status::Failed,
                ErrorInfo {
                    code: "ORCHESTRATION_RISK_REJECTED".to_string(),
                    message: verdict.issues.join("; "),
                    recoverable: false,
                    details: HashMap::from([
                        ("risk_flags".to_string(), json!(verdict.risk_flags)),
                        ("suggestions".to_string(), json!(verdict.suggestions)),
                    ]),
                },
                trace,
                duration_ms,
            ));
        }

        let strategy = select_strategy(&request);
        let mut outcome = match strategy {
            Strategy::Workflow => {
                let workflow_id = request.context_str("target_workflow").unwrap_or_default().to_string();
                let workflow = self.workflows.read().get(&workflow_id).cloned();
                match workflow {
                    Some(workflow) => self.run_workflow(workflow).await?,
                    None => {
                        return Err(CoreError::Orchestration(OrchestrationError::WorkflowNotFound(workflow_id)));
                    }
                }
            }
            Strategy::Pipeline => {
                let workflow = synthesize_pipeline(&request);
                self.run_workflow(workflow).await?
            }
            Strategy::Single => self.agents.process(request.clone()).await?,
        };

        outcome.duration_ms = started.elapsed().as_millis() as u64;
        if !outcome.layer_trace.contains(&"layer3".to_string()) {
            outcome.layer_trace.insert(0, "layer3".to_string());
        }
        Ok(outcome)
    }

    fn health_check(&self) -> TierHealth {
        self.agents.health_check()
    }
}

fn _assert_ai_error_impls_exist() {
    fn requires<T: AiError>() {}
    requires::<aios_common::error::PipelineError>();
}

#[cfg(test)]
mod tests {
    use super::*;
    use aios_common::envelope::Identity;
    use aios_layer4::{AgentRegistry, ExpertArchetype, ExpertDescriptor};
    use async_trait::async_trait as at;

    struct Echo;
    #[at]
    impl aios_layer4::ExpertAdapter for Echo {
        async fn execute(&self, prompt: &str, _context: &Value) -> Result<Value, aios_common::error::AgentError> {
            Ok(json!({ "echo": prompt }))
        }
    }

    async fn tier_with_default_expert() -> OrchestrationTier {
        let registry = AgentRegistry::new();
        registry
            .register(ExpertDescriptor::new("writer", ExpertArchetype::TextGeneration), Box::new(Echo))
            .await;
        registry.set_default("writer");
        let agents = AgentsTier::new(registry);
        let dir = tempfile::tempdir().unwrap();
        OrchestrationTier::new(agents, OrchestrationConfig { checkpoint_dir: dir.path().to_path_buf() })
    }

    #[tokio::test]
    async fn single_strategy_passes_through_to_agents() {
        let tier = tier_with_default_expert().await;
        let request = Envelope::new(Identity::User("alice".into()), "draft something");
        let outcome = tier.process(request).await.unwrap();
        assert!(outcome.success);
    }

    #[tokio::test]
    async fn pipeline_strategy_runs_a_synthesized_workflow() {
        let tier = tier_with_default_expert().await;
        let request = Envelope::new(Identity::User("alice".into()), "draft something")
            .with_context_value("requires_multi_agent", json!(true))
            .with_context_value("secondary_experts", json!(["writer"]));
        let outcome = tier.process(request).await.unwrap();
        assert!(outcome.success);
        let steps_completed = outcome.result.unwrap()["steps_completed"].as_u64().unwrap();
        assert_eq!(steps_completed, 3);
    }

    #[tokio::test]
    async fn unknown_named_workflow_fails_fast() {
        let tier = tier_with_default_expert().await;
        let request = Envelope::new(Identity::User("alice".into()), "run it")
            .with_context_value("target_workflow", json!("ghost"));
        let err = tier.process(request).await.unwrap_err();
        assert!(matches!(err, CoreError::Orchestration(OrchestrationError::WorkflowNotFound(_))));
    }

    #[tokio::test]
    async fn bulk_operation_without_confirmation_short_circuits() {
        let tier = tier_with_default_expert().await;
        let sites: Vec<String> = (0..15).map(|i| format!("site-{i}")).collect();
        let request = Envelope::new(Identity::User("alice".into()), "reboot everything")
            .with_context_value("target_sites", json!(sites));
        let outcome = tier.process(request).await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.error.unwrap().code, "ORCHESTRATION_RISK_REJECTED");
    }
}
