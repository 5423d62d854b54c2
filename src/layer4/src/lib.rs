//! Agents tier (L4): the expert pool and dispatch contract, fronted by a
//! `Tier` implementation.

pub mod adapter;
pub mod registry;
pub mod types;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::json;

use aios_common::envelope::{Envelope, ErrorInfo, Outcome, Status};
use aios_common::error::{AgentError, CoreError};
use aios_common::tier::{Tier, TierHealth};

pub use adapter::{AnalyticsAdapter, ExpertAdapter, KnowledgeAdapter, TextGenerationAdapter};
pub use registry::AgentRegistry;
pub use types::{ExpertArchetype, ExpertDescriptor, ExpertHealthState, ExpertPerformance};

pub struct AgentsTier {
    registry: AgentRegistry,
}

impl AgentsTier {
    pub fn new(registry: AgentRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }
}

#[async_trait]
impl Tier for AgentsTier {
    async fn process(&self, request: Envelope) -> Result<Outcome, CoreError> {
        let started = Instant::now();
        let target_agent = request.context_str("target_agent").unwrap_or("default").to_string();
        let context = request.context.get("agent_context").cloned().unwrap_or(json!({}));
        let timeout = Duration::from_secs(request.timeout_secs.max(1));

        let dispatch_result = self
            .registry
            .dispatch(&target_agent, &request.text, &context, timeout)
            .await;

        let duration_ms = started.elapsed().as_millis() as u64;

        Ok(match dispatch_result {
            Ok((value, label)) => {
                let trace = request.traced(&label).layer_trace;
                Outcome::success(request.request_id, value, trace, duration_ms)
            }
            Err(e) => {
                let trace = request.traced("layer4").layer_trace;
                let status = match &e {
                    AgentError::Timeout(..) => Status::Timeout,
                    _ => Status::Failed,
                };
                Outcome::error(request.request_id, status, error_info(&e), trace, duration_ms)
            }
        })
    }

    fn health_check(&self) -> TierHealth {
        let unavailable: Vec<String> = self
            .registry
            .descriptors()
            .into_iter()
            .filter(|d| d.performance.attempts > 0 && d.performance.success_rate() == 0.0)
            .map(|d| d.id)
            .collect();

        if unavailable.is_empty() {
            TierHealth::healthy("layer4")
        } else {
            TierHealth::degraded("layer4", unavailable)
        }
    }
}

fn error_info(e: &AgentError) -> ErrorInfo {
    use aios_common::error::AiError;
    ErrorInfo {
        code: e.code().to_string(),
        message: e.to_string(),
        recoverable: e.recoverable(),
        details: Default::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aios_common::envelope::Identity;
    use async_trait::async_trait;
    use serde_json::Value;

    struct Echo;
    #[async_trait]
    impl ExpertAdapter for Echo {
        async fn execute(&self, prompt: &str, _context: &Value) -> Result<Value, AgentError> {
            Ok(json!({ "echo": prompt }))
        }
    }

    #[tokio::test]
    async fn process_dispatches_and_prepends_the_expert_label() {
        let registry = AgentRegistry::new();
        registry
            .register(ExpertDescriptor::new("writer", ExpertArchetype::TextGeneration), Box::new(Echo))
            .await;
        let tier = AgentsTier::new(registry);

        let request = Envelope::new(Identity::User("alice".into()), "draft something")
            .with_context_value("target_agent", json!("writer"));

        let outcome = tier.process(request).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.layer_trace.last().unwrap(), "writer");
    }

    #[tokio::test]
    async fn process_reports_unavailable_target_as_a_failed_outcome() {
        let tier = AgentsTier::new(AgentRegistry::new());
        let request = Envelope::new(Identity::User("alice".into()), "draft something")
            .with_context_value("target_agent", json!("ghost"));

        let outcome = tier.process(request).await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.error.unwrap().code, "AGENT_UNAVAILABLE");
    }
}
